//! Instruction-selection pass over scheduled blocks.
//!
//! Each block is walked bottom-up (reverse schedule order) so that a node's
//! consumers in the block are visited before the node itself and get the
//! first chance to fuse it. Nodes already claimed by a finalized match are
//! skipped, and so are free nodes that every consumer fused. Every other
//! node becomes either a fused selection or a standalone one.

use isel_ir::{BlockRef, Graph, GraphView, NodeRef};

use crate::compile::RuleSet;
use crate::matcher::{MatchResult, Matcher};
use crate::selector::MatchSelector;

/// Knobs for [`SelectionPass`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassOptions {
    /// On a consumption conflict, try the next-ranked rule instead of
    /// emitting the root standalone right away.
    pub retry_on_conflict: bool,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            retry_on_conflict: true,
        }
    }
}

/// What the pass decided for one root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    Fused(MatchResult),
    Standalone(NodeRef),
}

impl Selection {
    pub fn root(&self) -> NodeRef {
        match self {
            Selection::Fused(m) => m.root,
            Selection::Standalone(n) => *n,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Calls into the matcher, retries included.
    pub attempts: usize,
    pub fused: usize,
    /// Free nodes left out because all their consumers fused them.
    pub absorbed: usize,
    pub conflicts: usize,
    pub standalone: usize,
}

impl std::ops::AddAssign for PassStats {
    fn add_assign(&mut self, other: Self) {
        self.attempts += other.attempts;
        self.fused += other.fused;
        self.absorbed += other.absorbed;
        self.conflicts += other.conflicts;
        self.standalone += other.standalone;
    }
}

/// Selections of one block, in schedule order.
#[derive(Clone, Debug)]
pub struct BlockSelection {
    pub block: BlockRef,
    pub selections: Vec<Selection>,
    pub stats: PassStats,
}

pub struct SelectionPass<'r> {
    matcher: Matcher<'r>,
    options: PassOptions,
}

impl<'r> SelectionPass<'r> {
    pub fn new(rules: &'r RuleSet) -> Self {
        Self {
            matcher: Matcher::new(rules),
            options: PassOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PassOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> PassOptions {
        self.options
    }

    /// Select instructions for `nodes`, given in schedule order.
    pub fn run_block<G: GraphView + ?Sized>(
        &self,
        graph: &G,
        block: BlockRef,
        nodes: &[NodeRef],
    ) -> BlockSelection {
        let mut selector = MatchSelector::new(self.matcher.rules().registry());
        let mut selections = Vec::with_capacity(nodes.len());
        let mut stats = PassStats::default();

        for &node in nodes.iter().rev() {
            if selector.is_claimed(node) {
                continue;
            }
            if selector.is_absorbed(graph, node) {
                stats.absorbed += 1;
                continue;
            }
            let selection = self.select_root(graph, &mut selector, &mut stats, node);
            match selection {
                Selection::Fused(_) => stats.fused += 1,
                Selection::Standalone(_) => stats.standalone += 1,
            }
            selections.push(selection);
        }
        selections.reverse();

        tracing::debug!(
            block = %block,
            attempts = stats.attempts,
            fused = stats.fused,
            absorbed = stats.absorbed,
            conflicts = stats.conflicts,
            standalone = stats.standalone,
            "block selected"
        );
        BlockSelection {
            block,
            selections,
            stats,
        }
    }

    fn select_root<G: GraphView + ?Sized>(
        &self,
        graph: &G,
        selector: &mut MatchSelector<'_>,
        stats: &mut PassStats,
        root: NodeRef,
    ) -> Selection {
        let mut start_rank = 0;
        loop {
            stats.attempts += 1;
            let Some(result) = self.matcher.attempt_match_from(graph, root, start_rank) else {
                selector.claim_standalone(root);
                return Selection::Standalone(root);
            };
            match selector.finalize_and_consume(graph, &result) {
                Ok(()) => return Selection::Fused(result),
                Err(_) => {
                    stats.conflicts += 1;
                    if !self.options.retry_on_conflict {
                        selector.claim_standalone(root);
                        return Selection::Standalone(root);
                    }
                    start_rank = result.rank + 1;
                }
            }
        }
    }

    /// Run the pass over every block of `graph`, each with its own
    /// claimed-node set.
    pub fn run_graph(&self, graph: &Graph) -> Vec<BlockSelection> {
        let selections: Vec<BlockSelection> = graph
            .blocks()
            .map(|block| self.run_block(graph, block, graph.block_nodes(block)))
            .collect();

        let mut total = PassStats::default();
        for b in &selections {
            total += b.stats;
        }
        tracing::info!(
            blocks = selections.len(),
            fused = total.fused,
            absorbed = total.absorbed,
            conflicts = total.conflicts,
            standalone = total.standalone,
            "instruction selection finished"
        );
        selections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{ActionId, RuleCompiler};
    use isel_ir::{KindInfo, KindRegistry, parse_test_graph};

    fn rules() -> RuleSet {
        let registry = KindRegistry::new()
            .with("Param", KindInfo::default())
            .with("Const", KindInfo::free())
            .with("Neg", KindInfo::default().with_arity(1))
            .with("Sub", KindInfo::default().with_arity(2));
        RuleCompiler::new(registry)
            .rule(ActionId::new("SUBNEG"), ["(Sub a (Neg b))"])
            .rule(ActionId::new("SUB"), ["(Sub a b)"])
            .rule(ActionId::new("NEGNEG"), ["(Neg (Neg a))"])
            .compile()
            .unwrap()
    }

    fn describe(graph: &Graph, selections: &[Selection]) -> Vec<String> {
        selections
            .iter()
            .map(|s| match s {
                Selection::Fused(m) => {
                    format!("{} {}", isel_ir::node_name(graph, m.root), m.action)
                }
                Selection::Standalone(n) => format!("{} -", isel_ir::node_name(graph, *n)),
            })
            .collect()
    }

    const GRAPH: &str = r#"
^b0:
  %x = Param
  %y = Param
  %n = Neg %y
  %m = Neg %n
  %s = Sub %x, %m
"#;

    #[test]
    fn consumers_fuse_first() {
        let set = rules();
        let g = parse_test_graph(GRAPH);
        let out = SelectionPass::new(&set).run_graph(&g.graph);
        assert_eq!(out.len(), 1);
        assert_eq!(
            describe(&g.graph, &out[0].selections),
            ["%x -", "%y -", "%n -", "%s SUBNEG"]
        );
        assert_eq!(
            out[0].stats,
            PassStats {
                attempts: 4,
                fused: 1,
                absorbed: 0,
                conflicts: 0,
                standalone: 3,
            }
        );
    }

    #[test]
    fn conflict_falls_back_to_next_rule() {
        let set = rules();
        let g = parse_test_graph(GRAPH);
        let block = g.graph.blocks().next().unwrap();
        // %m is visited before %s and fuses %n; %s then finds %m taken.
        let order = ["x", "y", "s", "n", "m"].map(|v| g.node(v));

        let pass = SelectionPass::new(&set);
        let out = pass.run_block(&g.graph, block, &order);
        assert_eq!(
            describe(&g.graph, &out.selections),
            ["%x -", "%y -", "%s SUB", "%m NEGNEG"]
        );
        assert_eq!(out.stats.conflicts, 1);
        assert_eq!(out.stats.attempts, 5);

        let strict = SelectionPass::new(&set).with_options(PassOptions {
            retry_on_conflict: false,
        });
        let out = strict.run_block(&g.graph, block, &order);
        assert_eq!(
            describe(&g.graph, &out.selections),
            ["%x -", "%y -", "%s -", "%m NEGNEG"]
        );
        assert_eq!(out.stats.standalone, 3);
    }

    #[test]
    fn standalone_nodes_are_not_fused_later() {
        let set = rules();
        let g = parse_test_graph(GRAPH);
        let block = g.graph.blocks().next().unwrap();
        // Operands before consumers: %n is emitted on its own first.
        let mut order = g.graph.block_nodes(block).to_vec();
        order.reverse();

        let out = SelectionPass::new(&set).run_block(&g.graph, block, &order);
        assert_eq!(
            describe(&g.graph, &out.selections),
            ["%s SUB", "%m -", "%n -", "%y -", "%x -"]
        );
        assert_eq!(out.stats.conflicts, 2);
    }

    #[test]
    fn free_operands_fused_everywhere_are_dropped() {
        let registry = KindRegistry::new()
            .with("Param", KindInfo::default())
            .with("Const", KindInfo::free())
            .with("Sub", KindInfo::default().with_arity(2));
        let set = RuleCompiler::new(registry)
            .rule(ActionId::new("SUBI"), ["(Sub a Const=k)"])
            .compile()
            .unwrap();
        // %d is only read as an immediate; %c is also a plain operand of %t.
        let g = parse_test_graph(
            r#"
^b0:
  %x = Param
  %c = Const #1
  %d = Const #2
  %s = Sub %x, %c
  %t = Sub %c, %d
"#,
        );
        let out = SelectionPass::new(&set).run_graph(&g.graph);
        assert_eq!(
            describe(&g.graph, &out[0].selections),
            ["%x -", "%c -", "%s SUBI", "%t SUBI"]
        );
        assert_eq!(
            out[0].stats,
            PassStats {
                attempts: 4,
                fused: 2,
                absorbed: 1,
                conflicts: 0,
                standalone: 2,
            }
        );
    }

    #[test]
    fn free_operands_read_from_another_block_are_kept() {
        let registry = KindRegistry::new()
            .with("Param", KindInfo::default())
            .with("Const", KindInfo::free())
            .with("Sub", KindInfo::default().with_arity(2));
        let set = RuleCompiler::new(registry)
            .rule(ActionId::new("SUBI"), ["(Sub a Const=k)"])
            .compile()
            .unwrap();
        let g = parse_test_graph(
            r#"
^entry:
  %c = Const #1
^b1:
  %x = Param
  %s = Sub %x, %c
"#,
        );
        let out = SelectionPass::new(&set).run_graph(&g.graph);
        assert_eq!(describe(&g.graph, &out[0].selections), ["%c -"]);
        assert_eq!(
            describe(&g.graph, &out[1].selections),
            ["%x -", "%s SUBI"]
        );
    }
}
