//! Match selector: finalization and the per-pass claimed-node set.
//!
//! A match is finalized only if none of the nodes it would fuse are already
//! held by an earlier selection of the same pass, fused or standalone. The
//! check and the claim happen in one step, so the claimed set never
//! contains nodes of a match that was refused.
//!
//! Free nodes are never claimed. The selector instead records which claimed
//! consumers read them as fused operands, so that a free node with no other
//! reader can be left out of the output.

use std::collections::HashMap;

use isel_ir::{GraphView, KindRegistry, NodeRef};
use smallvec::SmallVec;

use crate::errors::ConsumptionConflict;
use crate::matcher::MatchResult;

pub struct MatchSelector<'k> {
    registry: &'k KindRegistry,
    /// Claimed node → root of the selection holding it.
    claimed: HashMap<NodeRef, NodeRef>,
    /// Free node → distinct claimed consumers that fused it as an operand.
    absorbed_by: HashMap<NodeRef, SmallVec<[NodeRef; 2]>>,
    finalized: Vec<NodeRef>,
}

impl<'k> MatchSelector<'k> {
    pub fn new(registry: &'k KindRegistry) -> Self {
        Self {
            registry,
            claimed: HashMap::new(),
            absorbed_by: HashMap::new(),
            finalized: Vec::new(),
        }
    }

    /// Finalize `result`, claiming its root and every consumed node whose
    /// kind is not free.
    pub fn finalize_and_consume<G: GraphView + ?Sized>(
        &mut self,
        graph: &G,
        result: &MatchResult,
    ) -> Result<(), ConsumptionConflict> {
        let mut claims: SmallVec<[NodeRef; 4]> = SmallVec::new();
        claims.push(result.root);
        claims.extend(
            result
                .consumed
                .iter()
                .copied()
                .filter(|&n| !self.registry.is_free(graph.kind_of(n))),
        );

        if let Some((node, holder)) = claims
            .iter()
            .find_map(|n| self.claimed.get(n).map(|&holder| (*n, holder)))
        {
            let conflict = ConsumptionConflict {
                root: result.root,
                node,
                holder,
            };
            tracing::debug!(%conflict, action = %result.action, "match refused");
            return Err(conflict);
        }

        for &node in &claims {
            self.claimed.insert(node, result.root);
            for &operand in graph.operands_of(node) {
                if result.consumed.contains(&operand)
                    && self.registry.is_free(graph.kind_of(operand))
                {
                    let users = self.absorbed_by.entry(operand).or_default();
                    if !users.contains(&node) {
                        users.push(node);
                    }
                }
            }
        }
        self.finalized.push(result.root);
        Ok(())
    }

    /// Record that `node` is emitted on its own; later matches may not
    /// fuse it.
    pub fn claim_standalone(&mut self, node: NodeRef) {
        self.claimed.entry(node).or_insert(node);
    }

    pub fn is_claimed(&self, node: NodeRef) -> bool {
        self.claimed.contains_key(&node)
    }

    /// Whether `node` is a free node whose every consumer fused it, so it
    /// needs no instruction of its own.
    pub fn is_absorbed<G: GraphView + ?Sized>(&self, graph: &G, node: NodeRef) -> bool {
        if !self.registry.is_free(graph.kind_of(node)) {
            return false;
        }
        self.absorbed_by
            .get(&node)
            .is_some_and(|users| users.len() == graph.use_count_of(node))
    }

    /// Roots of finalized matches, in finalization order.
    pub fn finalized(&self) -> &[NodeRef] {
        &self.finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{ActionId, RuleCompiler, RuleSet};
    use crate::matcher::Matcher;
    use isel_ir::{KindInfo, parse_test_graph};

    fn rules() -> RuleSet {
        let registry = KindRegistry::new()
            .with("Param", KindInfo::default())
            .with("Const", KindInfo::free())
            .with("Neg", KindInfo::default().with_arity(1))
            .with("Sub", KindInfo::default().with_arity(2));
        RuleCompiler::new(registry)
            .rule(ActionId::new("SUBNEG"), ["(Sub (Neg a) Const)"])
            .rule(ActionId::new("NEGNEG"), ["(Neg (Neg a))"])
            .compile()
            .unwrap()
    }

    #[test]
    fn overlapping_match_is_refused() {
        let set = rules();
        let g = parse_test_graph(
            r#"
^b0:
  %x = Param
  %n = Neg %x
  %m = Neg %n
  %c = Const #1
  %s = Sub %m, %c
"#,
        );
        let matcher = Matcher::new(&set);
        let mut selector = MatchSelector::new(set.registry());

        // Claim %m as a root first, then try to fuse it into %s.
        let inner = matcher.attempt_match(&g.graph, g.node("m")).unwrap();
        selector.finalize_and_consume(&g.graph, &inner).unwrap();
        assert!(selector.is_claimed(g.node("n")));

        let outer = matcher.attempt_match(&g.graph, g.node("s")).unwrap();
        let conflict = selector
            .finalize_and_consume(&g.graph, &outer)
            .unwrap_err();
        assert_eq!(
            conflict,
            ConsumptionConflict {
                root: g.node("s"),
                node: g.node("m"),
                holder: g.node("m"),
            }
        );
        // Refused matches claim nothing.
        assert!(!selector.is_claimed(g.node("s")));
        assert_eq!(selector.finalized(), &[g.node("m")]);
    }

    #[test]
    fn free_nodes_are_never_claimed() {
        let set = rules();
        let g = parse_test_graph(
            r#"
^b0:
  %x = Param
  %y = Param
  %c = Const #1
  %n = Neg %x
  %s = Sub %n, %c
  %o = Neg %y
  %t = Sub %o, %c
"#,
        );
        let matcher = Matcher::new(&set);
        let mut selector = MatchSelector::new(set.registry());

        for root in [g.node("t"), g.node("s")] {
            let m = matcher.attempt_match(&g.graph, root).unwrap();
            selector.finalize_and_consume(&g.graph, &m).unwrap();
        }
        assert!(!selector.is_claimed(g.node("c")));
        assert!(selector.is_claimed(g.node("n")));
        assert!(selector.is_claimed(g.node("o")));
        assert!(selector.is_absorbed(&g.graph, g.node("c")));
    }

    #[test]
    fn free_node_with_an_unfused_reader_is_not_absorbed() {
        let set = rules();
        let g = parse_test_graph(
            r#"
^b0:
  %x = Param
  %c = Const #1
  %n = Neg %x
  %s = Sub %n, %c
  %t = Sub %c, %x
"#,
        );
        let matcher = Matcher::new(&set);
        let mut selector = MatchSelector::new(set.registry());

        let m = matcher.attempt_match(&g.graph, g.node("s")).unwrap();
        selector.finalize_and_consume(&g.graph, &m).unwrap();
        // %t reads %c but has no rule and is emitted on its own.
        assert_eq!(matcher.attempt_match(&g.graph, g.node("t")), None);
        selector.claim_standalone(g.node("t"));
        assert!(!selector.is_absorbed(&g.graph, g.node("c")));
        assert!(!selector.is_absorbed(&g.graph, g.node("x")));
    }

    #[test]
    fn refused_match_absorbs_nothing() {
        let set = rules();
        let g = parse_test_graph(
            r#"
^b0:
  %x = Param
  %n = Neg %x
  %m = Neg %n
  %c = Const #1
  %s = Sub %m, %c
"#,
        );
        let matcher = Matcher::new(&set);
        let mut selector = MatchSelector::new(set.registry());

        let inner = matcher.attempt_match(&g.graph, g.node("m")).unwrap();
        selector.finalize_and_consume(&g.graph, &inner).unwrap();
        let outer = matcher.attempt_match(&g.graph, g.node("s")).unwrap();
        assert!(selector.finalize_and_consume(&g.graph, &outer).is_err());
        assert!(!selector.is_absorbed(&g.graph, g.node("c")));
    }
}
