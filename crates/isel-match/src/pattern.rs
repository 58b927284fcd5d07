//! Pattern trees.
//!
//! A parsed pattern is an arena of [`PatternNodeData`] addressed by
//! [`PatRef`]. Each node constrains one graph node's kind and may bind it to
//! a [`NodeName`]; its arguments are either nested nodes or bare names.
//!
//! A leaf node-spec (`Const`, `Const=c`) constrains only the kind. A
//! parenthesized match-rule (`(Add a b)`) additionally fixes the operand
//! count to the number of arguments.

use std::fmt;

use cranelift_entity::{PrimaryMap, entity_impl};
use derive_more::Display;
use isel_ir::{NodeKind, Symbol};
use smallvec::SmallVec;

/// Reference to a node inside one [`Pattern`]'s arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatRef(u32);
entity_impl!(PatRef, "p");

/// Pattern-local name binding a matched graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("{_0}")]
pub struct NodeName(Symbol);

impl NodeName {
    pub fn new(text: &'static str) -> Self {
        debug_assert!(Self::is_valid_token(text), "invalid node name `{text}`");
        NodeName(Symbol::new(text))
    }

    pub fn from_dynamic(text: &str) -> Self {
        NodeName(Symbol::from_dynamic(text))
    }

    pub fn symbol(self) -> Symbol {
        self.0
    }

    /// Whether `text` is a well-formed name token: `[a-z][a-zA-Z0-9]*`.
    pub fn is_valid_token(text: &str) -> bool {
        let mut chars = text.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
            && chars.all(|c| c.is_ascii_alphanumeric())
    }
}

/// One argument position of a pattern node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternArg {
    /// A nested node-spec or match-rule.
    Node(PatRef),
    /// A bare name: any node, bound on first sight and compared by identity after.
    Name(NodeName),
}

#[derive(Clone, Debug)]
pub struct PatternNodeData {
    pub kind: NodeKind,
    pub name: Option<NodeName>,
    pub args: SmallVec<[PatternArg; 2]>,
    /// Byte offset of the node's kind token in the source text.
    pub offset: usize,
}

impl PatternNodeData {
    /// Whether this node was written as a parenthesized match-rule.
    pub fn is_rule(&self) -> bool {
        !self.args.is_empty()
    }
}

/// A parsed pattern tree.
///
/// Equality is structural: two patterns are equal when their trees have the
/// same kinds, names and argument shapes, regardless of arena numbering and
/// source offsets.
#[derive(Clone, Debug)]
pub struct Pattern {
    nodes: PrimaryMap<PatRef, PatternNodeData>,
    root: PatternArg,
}

impl Pattern {
    pub fn root(&self) -> PatternArg {
        self.root
    }

    /// The root node, or `None` when the pattern is a bare name.
    pub fn root_node(&self) -> Option<PatRef> {
        match self.root {
            PatternArg::Node(p) => Some(p),
            PatternArg::Name(_) => None,
        }
    }

    pub fn node(&self, pat: PatRef) -> &PatternNodeData {
        &self.nodes[pat]
    }

    /// Number of node-specs in the tree. Bare names do not count.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes in pre-order.
    pub fn preorder(&self) -> Vec<PatRef> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<PatRef> = self.root_node().into_iter().collect();
        while let Some(p) = stack.pop() {
            out.push(p);
            for arg in self.nodes[p].args.iter().rev() {
                if let PatternArg::Node(child) = arg {
                    stack.push(*child);
                }
            }
        }
        out
    }

    /// Every name occurring in the pattern, in first-occurrence order.
    pub fn names(&self) -> Vec<NodeName> {
        let mut names = Vec::new();
        let mut note = |name: NodeName| {
            if !names.contains(&name) {
                names.push(name);
            }
        };
        match self.root {
            PatternArg::Name(n) => note(n),
            PatternArg::Node(_) => {
                for p in self.preorder() {
                    let data = &self.nodes[p];
                    if let Some(n) = data.name {
                        note(n);
                    }
                    for arg in &data.args {
                        if let PatternArg::Name(n) = arg {
                            note(*n);
                        }
                    }
                }
            }
        }
        names
    }

    /// Names that occur as bare arguments (or as a bare root).
    pub fn bare_names(&self) -> Vec<NodeName> {
        let mut names = Vec::new();
        if let PatternArg::Name(n) = self.root {
            names.push(n);
        }
        for p in self.preorder() {
            for arg in &self.nodes[p].args {
                if let PatternArg::Name(n) = arg
                    && !names.contains(n)
                {
                    names.push(*n);
                }
            }
        }
        names
    }

    fn same_arg(&self, a: PatternArg, other: &Pattern, b: PatternArg) -> bool {
        match (a, b) {
            (PatternArg::Name(x), PatternArg::Name(y)) => x == y,
            (PatternArg::Node(x), PatternArg::Node(y)) => {
                let (dx, dy) = (&self.nodes[x], &other.nodes[y]);
                dx.kind == dy.kind
                    && dx.name == dy.name
                    && dx.args.len() == dy.args.len()
                    && dx
                        .args
                        .iter()
                        .zip(dy.args.iter())
                        .all(|(&ax, &ay)| self.same_arg(ax, other, ay))
            }
            _ => false,
        }
    }

    fn fmt_arg(&self, arg: PatternArg, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match arg {
            PatternArg::Name(n) => write!(f, "{n}"),
            PatternArg::Node(p) => {
                let data = &self.nodes[p];
                if data.is_rule() {
                    f.write_str("(")?;
                }
                write!(f, "{}", data.kind)?;
                if let Some(name) = data.name {
                    write!(f, "={name}")?;
                }
                for &child in &data.args {
                    f.write_str(" ")?;
                    self.fmt_arg(child, f)?;
                }
                if data.is_rule() {
                    f.write_str(")")?;
                }
                Ok(())
            }
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.same_arg(self.root, other, other.root)
    }
}

impl Eq for Pattern {}

/// Canonical s-expression form: single spaces, no redundant whitespace.
impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_arg(self.root, f)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Incremental construction of a [`Pattern`] arena.
#[derive(Default)]
pub struct PatternBuilder {
    nodes: PrimaryMap<PatRef, PatternNodeData>,
}

impl PatternBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&mut self, kind: NodeKind, name: Option<NodeName>, offset: usize) -> PatRef {
        self.nodes.push(PatternNodeData {
            kind,
            name,
            args: SmallVec::new(),
            offset,
        })
    }

    pub fn push_arg(&mut self, parent: PatRef, arg: PatternArg) {
        self.nodes[parent].args.push(arg);
    }

    pub fn finish(self, root: PatternArg) -> Pattern {
        Pattern {
            nodes: self.nodes,
            root,
        }
    }
}
