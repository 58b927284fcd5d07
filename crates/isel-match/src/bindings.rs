//! Name bindings and their consistency check.

use std::fmt;

use derive_more::{Display, Error};
use isel_ir::NodeRef;
use smallvec::SmallVec;

use crate::compile::CompiledRule;
use crate::matcher::MatchResult;
use crate::pattern::NodeName;

/// Name → node table accumulated during one match attempt.
///
/// Entries keep the order in which names were first bound.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bindings {
    entries: SmallVec<[(NodeName, NodeRef); 4]>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: NodeName) -> Option<NodeRef> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, node)| node)
    }

    /// Bind `name` to `node`, or check that it already denotes `node`.
    ///
    /// Returns `false` when `name` is bound to a different node.
    pub fn bind(&mut self, name: NodeName, node: NodeRef) -> bool {
        match self.get(name) {
            Some(bound) => bound == node,
            None => {
                self.entries.push((name, node));
                true
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeName, NodeRef)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }
}

impl fmt::Display for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, node)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {node}")?;
        }
        f.write_str("}")
    }
}

/// A binding table that does not fit the pattern it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Error)]
pub enum BindingViolation {
    #[display("`{_0}` is bound but does not occur in the pattern")]
    UnknownName(#[error(not(source))] NodeName),

    #[display("`{_0}` is bound more than once")]
    Duplicate(#[error(not(source))] NodeName),

    #[display("`{_0}` occurs in the pattern but is unbound")]
    Unbound(#[error(not(source))] NodeName),
}

/// Check that `result.bindings` is a total, single-valued mapping over
/// exactly the names of `rule`'s pattern.
pub fn check_bindings(rule: &CompiledRule, result: &MatchResult) -> Result<(), BindingViolation> {
    let names = rule.pattern.names();

    let mut seen: SmallVec<[NodeName; 4]> = SmallVec::new();
    for (name, _) in result.bindings.iter() {
        if !names.contains(&name) {
            return Err(BindingViolation::UnknownName(name));
        }
        if seen.contains(&name) {
            return Err(BindingViolation::Duplicate(name));
        }
        seen.push(name);
    }

    match names.into_iter().find(|n| !seen.contains(n)) {
        Some(missing) => Err(BindingViolation::Unbound(missing)),
        None => Ok(()),
    }
}
