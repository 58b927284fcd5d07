//! Data-flow graph consumed by the isel pattern matcher.
//!
//! The graph is a plain arena: nodes carry a [`NodeKind`], ordered operand
//! edges and the scheduling block they belong to, and a use-chain is kept
//! so consumer counts are cheap. The matcher only ever reads it through
//! [`GraphView`].

pub mod graph;
pub mod kind;
pub mod parser;
pub mod printer;
pub mod refs;
pub mod symbol;
pub mod validation;

pub use graph::{BlockData, Graph, GraphView, NodeData};
pub use kind::{KindInfo, KindRegistry, NodeKind, RegistryError};
pub use parser::{ParseError, ParsedGraph, parse_graph, parse_test_graph};
pub use printer::{node_name, print_graph, print_node};
pub use refs::{BlockRef, NodeRef, Use};
pub use symbol::Symbol;
pub use validation::{ValidationError, validate};
