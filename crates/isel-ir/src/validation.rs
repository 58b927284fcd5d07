//! Structural checks for a [`Graph`].
//!
//! Verifies that use-chains mirror operand lists and that every node is
//! scheduled exactly once, in the block it claims to belong to.

use std::collections::HashMap;

use derive_more::Display;

use crate::graph::{Graph, GraphView};
use crate::refs::{BlockRef, NodeRef, Use};

#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum ValidationError {
    #[display("{user} operand #{index} reads {operand} but {operand} has no matching use entry")]
    MissingUse {
        user: NodeRef,
        index: u32,
        operand: NodeRef,
    },

    #[display("use entry of {node} points at {user} operand #{index}, which reads something else")]
    StaleUse {
        node: NodeRef,
        user: NodeRef,
        index: u32,
    },

    #[display("{node} is scheduled {count} times")]
    ScheduledTwice { node: NodeRef, count: usize },

    #[display("{node} is not scheduled in any block")]
    Unscheduled { node: NodeRef },

    #[display("{node} is scheduled in {scheduled} but belongs to {block}")]
    WrongBlock {
        node: NodeRef,
        block: BlockRef,
        scheduled: BlockRef,
    },
}

/// Check all graph invariants, collecting every violation found.
pub fn validate(graph: &Graph) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for node in graph.nodes() {
        for (idx, &operand) in graph.operands_of(node).iter().enumerate() {
            let expected = Use {
                user: node,
                operand_index: idx as u32,
            };
            if !graph.uses(operand).contains(&expected) {
                errors.push(ValidationError::MissingUse {
                    user: node,
                    index: idx as u32,
                    operand,
                });
            }
        }
        for u in graph.uses(node) {
            let reads = graph.operands_of(u.user).get(u.operand_index as usize);
            if reads != Some(&node) {
                errors.push(ValidationError::StaleUse {
                    node,
                    user: u.user,
                    index: u.operand_index,
                });
            }
        }
    }

    let mut scheduled: HashMap<NodeRef, (BlockRef, usize)> = HashMap::new();
    for block in graph.blocks() {
        for &node in graph.block_nodes(block) {
            scheduled.entry(node).or_insert((block, 0)).1 += 1;
        }
    }
    for node in graph.nodes() {
        match scheduled.get(&node) {
            None => errors.push(ValidationError::Unscheduled { node }),
            Some(&(_, count)) if count > 1 => {
                errors.push(ValidationError::ScheduledTwice { node, count })
            }
            Some(&(block, _)) if block != graph.block_of(node) => {
                errors.push(ValidationError::WrongBlock {
                    node,
                    block: graph.block_of(node),
                    scheduled: block,
                })
            }
            Some(_) => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
