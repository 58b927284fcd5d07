//! Graph matcher.
//!
//! Given a candidate root, the matcher walks the ranked rules compiled for
//! the root's kind and tries each against the graph in lock-step with the
//! pattern tree. The first rule that fits wins. A failed attempt leaves no
//! trace: partial bindings and consumed nodes are rewound before the next
//! rule is tried.
//!
//! Every node consumed below the root must
//! - have exactly the pattern node's kind,
//! - have exactly one consumer, unless its kind is free,
//! - sit in the root's block, unless its kind is free.
//!
//! Operands of a commutative binary kind may match in either order. The
//! swapped order is retried whenever anything later in the walk fails, not
//! only the node's own subtree, so the outcome does not depend on how the
//! graph happens to order those operands.

use derive_more::Display;
use isel_ir::{BlockRef, GraphView, KindRegistry, NodeRef};
use smallvec::{SmallVec, smallvec};

use crate::bindings::{Bindings, check_bindings};
use crate::compile::{ActionId, CompiledRule, RuleSet};
use crate::pattern::{NodeName, PatRef, Pattern, PatternArg};

/// A successful match of one rule at one root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    pub root: NodeRef,
    /// Nodes fused into the root's instruction, in pattern pre-order,
    /// without duplicates and without the root itself.
    pub consumed: SmallVec<[NodeRef; 4]>,
    pub bindings: Bindings,
    pub action: ActionId,
    /// Position of the winning rule among the candidates for the root kind.
    pub rank: usize,
    pub specificity: usize,
}

/// Why a rule failed at some graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
enum Reject {
    #[display("kind mismatch at {_0}")]
    Kind(NodeRef),
    #[display("operand count mismatch at {_0}")]
    Arity(NodeRef),
    #[display("{_0} has more than one consumer")]
    Shared(NodeRef),
    #[display("{_0} lives in another block")]
    CrossBlock(NodeRef),
    #[display("`{_0}` already denotes another node than {_1}")]
    Binding(NodeName, NodeRef),
}

/// Matches ranked rules against graph nodes.
#[derive(Clone, Copy)]
pub struct Matcher<'r> {
    rules: &'r RuleSet,
}

impl<'r> Matcher<'r> {
    pub fn new(rules: &'r RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &'r RuleSet {
        self.rules
    }

    /// Best match for `root`, or `None`.
    pub fn attempt_match<G: GraphView + ?Sized>(
        &self,
        graph: &G,
        root: NodeRef,
    ) -> Option<MatchResult> {
        self.attempt_match_from(graph, root, 0)
    }

    /// Best match for `root` among the rules ranked `start_rank` or lower.
    ///
    /// Used to fall back to the next candidate after a consumption conflict.
    pub fn attempt_match_from<G: GraphView + ?Sized>(
        &self,
        graph: &G,
        root: NodeRef,
        start_rank: usize,
    ) -> Option<MatchResult> {
        let candidates = self.rules.rules_for(graph.kind_of(root));
        candidates
            .iter()
            .enumerate()
            .skip(start_rank)
            .find_map(|(rank, rule)| self.try_rule(graph, rule, rank, root))
    }

    fn try_rule<G: GraphView + ?Sized>(
        &self,
        graph: &G,
        rule: &CompiledRule,
        rank: usize,
        root: NodeRef,
    ) -> Option<MatchResult> {
        let pat_root = rule.pattern.root_node()?;
        let mut attempt = Attempt {
            graph,
            registry: self.rules.registry(),
            pattern: &rule.pattern,
            root,
            block: graph.block_of(root),
            bindings: Bindings::new(),
            consumed: SmallVec::new(),
        };

        if let Err(reject) = attempt.solve(smallvec![(PatternArg::Node(pat_root), root)]) {
            tracing::trace!(
                root = %root,
                action = %rule.action,
                pattern = %rule.pattern,
                %reject,
                "rule rejected"
            );
            return None;
        }

        let result = MatchResult {
            root,
            consumed: attempt.consumed,
            bindings: attempt.bindings,
            action: rule.action,
            rank,
            specificity: rule.specificity,
        };
        debug_assert!(
            check_bindings(rule, &result).is_ok(),
            "inconsistent bindings for {}: {}",
            rule.pattern,
            result.bindings
        );
        tracing::trace!(
            root = %root,
            action = %rule.action,
            bindings = %result.bindings,
            "rule matched"
        );
        Some(result)
    }
}

// ============================================================================
// One attempt
// ============================================================================

/// Pending (pattern argument, graph node) pairs; the last one is matched next.
type Goals = SmallVec<[(PatternArg, NodeRef); 8]>;

struct Attempt<'a, G: GraphView + ?Sized> {
    graph: &'a G,
    registry: &'a KindRegistry,
    pattern: &'a Pattern,
    root: NodeRef,
    block: BlockRef,
    bindings: Bindings,
    consumed: SmallVec<[NodeRef; 4]>,
}

#[derive(Clone, Copy)]
struct Mark {
    bindings: usize,
    consumed: usize,
}

impl<G: GraphView + ?Sized> Attempt<'_, G> {
    fn mark(&self) -> Mark {
        Mark {
            bindings: self.bindings.len(),
            consumed: self.consumed.len(),
        }
    }

    fn rewind(&mut self, mark: Mark) {
        self.bindings.truncate(mark.bindings);
        self.consumed.truncate(mark.consumed);
    }

    fn bind(&mut self, name: NodeName, node: NodeRef) -> Result<(), Reject> {
        if self.bindings.bind(name, node) {
            Ok(())
        } else {
            Err(Reject::Binding(name, node))
        }
    }

    /// Match every pending (pattern argument, graph node) pair.
    ///
    /// Pairs are popped in pattern pre-order. A commutative binary node is
    /// a choice point: the rest of the walk is first run with its operands
    /// in order, and only if that fails, from the same state with them
    /// swapped.
    fn solve(&mut self, mut goals: Goals) -> Result<(), Reject> {
        let graph = self.graph;
        let pattern = self.pattern;

        while let Some((arg, node)) = goals.pop() {
            let pat = match arg {
                PatternArg::Node(pat) => pat,
                PatternArg::Name(name) => {
                    self.bind(name, node)?;
                    continue;
                }
            };
            self.visit(pat, node)?;

            let data = pattern.node(pat);
            if !data.is_rule() {
                continue;
            }
            let operands = graph.operands_of(node);
            if operands.len() != data.args.len() {
                return Err(Reject::Arity(node));
            }

            if data.args.len() == 2 && self.registry.is_commutative(data.kind) {
                let (a0, a1) = (data.args[0], data.args[1]);
                let (o0, o1) = (operands[0], operands[1]);
                let mark = self.mark();
                let mut in_order = goals.clone();
                in_order.push((a1, o1));
                in_order.push((a0, o0));
                if self.solve(in_order).is_ok() {
                    return Ok(());
                }
                self.rewind(mark);
                goals.push((a1, o0));
                goals.push((a0, o1));
                continue;
            }

            for (&arg, &operand) in data.args.iter().zip(operands).rev() {
                goals.push((arg, operand));
            }
        }
        Ok(())
    }

    /// Checks on one graph node against one pattern node, operands aside.
    fn visit(&mut self, pat: PatRef, node: NodeRef) -> Result<(), Reject> {
        let graph = self.graph;
        let pattern = self.pattern;
        let data = pattern.node(pat);

        let kind = graph.kind_of(node);
        if kind != data.kind {
            return Err(Reject::Kind(node));
        }

        if node != self.root {
            if !self.registry.is_free(kind) {
                if graph.use_count_of(node) != 1 {
                    return Err(Reject::Shared(node));
                }
                if graph.block_of(node) != self.block {
                    return Err(Reject::CrossBlock(node));
                }
            }
            if !self.consumed.contains(&node) {
                self.consumed.push(node);
            }
        }

        match data.name {
            Some(name) => self.bind(name, node),
            None => Ok(()),
        }
    }
}
