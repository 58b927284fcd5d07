//! Graph: arena-based data-flow storage.
//!
//! Nodes and blocks are stored in `PrimaryMap`s owned by [`Graph`]. Operand
//! lists use `EntityList + ListPool` for compact 4-byte per-field storage,
//! and a use-chain is kept alongside so consumer counts are cheap.

use cranelift_entity::{EntityList, ListPool, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::kind::NodeKind;
use crate::refs::{BlockRef, NodeRef, Use};
use crate::Symbol;

// ============================================================================
// Read-only view
// ============================================================================

/// The read-only surface the matcher needs from a data-flow graph.
///
/// Implementations must be stable for the duration of a matching pass:
/// nothing observed through this trait may change between a match attempt
/// and the finalization of its result.
pub trait GraphView {
    /// Operation category of `node`.
    fn kind_of(&self, node: NodeRef) -> NodeKind;

    /// Ordered operand edges of `node`.
    fn operands_of(&self, node: NodeRef) -> &[NodeRef];

    /// Number of distinct nodes consuming `node`.
    fn use_count_of(&self, node: NodeRef) -> usize;

    /// Scheduling block `node` belongs to.
    fn block_of(&self, node: NodeRef) -> BlockRef;
}

// ============================================================================
// Entity data types
// ============================================================================

/// Data for a single node in the arena.
pub struct NodeData {
    pub kind: NodeKind,
    pub operands: EntityList<NodeRef>,
    pub block: BlockRef,
    /// Integer immediate carried by literal kinds.
    pub imm: Option<i64>,
    /// Name the node was given in textual form, if any.
    pub label: Option<Symbol>,
}

/// Data for a scheduling block.
pub struct BlockData {
    pub label: Symbol,
    /// Nodes in schedule order.
    pub nodes: Vec<NodeRef>,
}

// ============================================================================
// Graph
// ============================================================================

/// Arena-based data-flow graph.
///
/// Owns all nodes and blocks and keeps use-chains in sync with operand
/// lists.
pub struct Graph {
    nodes: PrimaryMap<NodeRef, NodeData>,
    blocks: PrimaryMap<BlockRef, BlockData>,

    /// Use-chain: for each node, the list of (user, operand index) edges.
    uses: SecondaryMap<NodeRef, SmallVec<[Use; 2]>>,

    /// Backing pool for operand lists.
    node_pool: ListPool<NodeRef>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            uses: SecondaryMap::new(),
            node_pool: ListPool::new(),
        }
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    pub fn create_block(&mut self, label: Symbol) -> BlockRef {
        self.blocks.push(BlockData {
            label,
            nodes: Vec::new(),
        })
    }

    pub fn block(&self, block: BlockRef) -> &BlockData {
        &self.blocks[block]
    }

    /// Nodes of `block` in schedule order.
    pub fn block_nodes(&self, block: BlockRef) -> &[NodeRef] {
        &self.blocks[block].nodes
    }

    pub fn blocks(&self) -> impl Iterator<Item = BlockRef> + '_ {
        self.blocks.keys()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Create a node at the end of `block` and register its operand uses.
    pub fn create_node(
        &mut self,
        block: BlockRef,
        kind: NodeKind,
        operands: &[NodeRef],
        imm: Option<i64>,
    ) -> NodeRef {
        let operand_list = EntityList::from_slice(operands, &mut self.node_pool);
        let node = self.nodes.push(NodeData {
            kind,
            operands: operand_list,
            block,
            imm,
            label: None,
        });
        for (idx, &operand) in operands.iter().enumerate() {
            self.uses[operand].push(Use {
                user: node,
                operand_index: idx as u32,
            });
        }
        self.blocks[block].nodes.push(node);
        node
    }

    pub fn node(&self, node: NodeRef) -> &NodeData {
        &self.nodes[node]
    }

    pub fn set_label(&mut self, node: NodeRef, label: Symbol) {
        self.nodes[node].label = Some(label);
    }

    pub fn label(&self, node: NodeRef) -> Option<Symbol> {
        self.nodes[node].label
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.nodes.keys()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// All (user, operand index) edges reading `node`.
    pub fn uses(&self, node: NodeRef) -> &[Use] {
        &self.uses[node]
    }

    /// Distinct consumers of `node`, in first-use order.
    pub fn users(&self, node: NodeRef) -> SmallVec<[NodeRef; 2]> {
        let mut users: SmallVec<[NodeRef; 2]> = SmallVec::new();
        for u in self.uses[node].iter() {
            if !users.contains(&u.user) {
                users.push(u.user);
            }
        }
        users
    }

    /// Replace every use of `old` with `new`, keeping use-chains consistent.
    pub fn replace_all_uses(&mut self, old: NodeRef, new: NodeRef) {
        if old == new {
            return;
        }
        let moved = std::mem::take(&mut self.uses[old]);
        for u in &moved {
            let operands = self.nodes[u.user]
                .operands
                .as_mut_slice(&mut self.node_pool);
            operands[u.operand_index as usize] = new;
        }
        self.uses[new].extend(moved);
    }
}

impl GraphView for Graph {
    fn kind_of(&self, node: NodeRef) -> NodeKind {
        self.nodes[node].kind
    }

    fn operands_of(&self, node: NodeRef) -> &[NodeRef] {
        self.nodes[node].operands.as_slice(&self.node_pool)
    }

    fn use_count_of(&self, node: NodeRef) -> usize {
        let uses = &self.uses[node];
        uses.iter()
            .enumerate()
            .filter(|(i, u)| !uses[..*i].iter().any(|prev| prev.user == u.user))
            .count()
    }

    fn block_of(&self, node: NodeRef) -> BlockRef {
        self.nodes[node].block
    }
}
