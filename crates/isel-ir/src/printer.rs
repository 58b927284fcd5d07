//! Text format printer for graphs.
//!
//! Emits the format read by [`crate::parser`]. Nodes keep their textual
//! label when they have one and are otherwise named after their ref
//! (`%n3`).

use std::fmt::Write;

use crate::graph::{Graph, GraphView};
use crate::refs::NodeRef;

/// Textual name of `node`, including the `%` sigil.
pub fn node_name(graph: &Graph, node: NodeRef) -> String {
    match graph.label(node) {
        Some(label) => format!("%{label}"),
        None => format!("%{node}"),
    }
}

/// One-line rendering of a node definition: `%0 = Add %x, %y`.
pub fn print_node(graph: &Graph, node: NodeRef) -> String {
    let mut out = String::new();
    write_node(&mut out, graph, node);
    out
}

fn write_node(out: &mut String, graph: &Graph, node: NodeRef) {
    let data = graph.node(node);
    let _ = write!(out, "{} = {}", node_name(graph, node), data.kind);
    for (i, &operand) in graph.operands_of(node).iter().enumerate() {
        out.push_str(if i == 0 { " " } else { ", " });
        out.push_str(&node_name(graph, operand));
    }
    if let Some(imm) = data.imm {
        let _ = write!(out, " #{imm}");
    }
}

/// Print the whole graph, one block after another in creation order.
pub fn print_graph(graph: &Graph) -> String {
    let mut out = String::new();
    for block in graph.blocks() {
        let _ = writeln!(out, "^{}:", graph.block(block).label);
        for &node in graph.block_nodes(block) {
            out.push_str("  ");
            write_node(&mut out, graph, node);
            out.push('\n');
        }
    }
    out
}
