//! Text format parser for graphs.
//!
//! ```text
//! ^b0:
//!   %x = Param
//!   %c = Const #2
//!   %0 = Add %x, %c
//! ```
//!
//! # Two-stage parsing
//!
//! 1. **Raw parse**: winnow combinators parse text into `Raw*` structures.
//! 2. **Graph build**: `GraphBuilder` resolves value names and creates
//!    blocks and nodes in a fresh [`Graph`].
//!
//! Operands must name values defined earlier in the text, in any block.
//! `//` starts a comment that runs to the end of the line.

use std::collections::HashMap;

use derive_more::{Display, Error};
use winnow::ascii;
use winnow::combinator::{opt, preceded, repeat, separated};
use winnow::prelude::*;
use winnow::token::{one_of, take_till, take_while};

use crate::graph::Graph;
use crate::kind::NodeKind;
use crate::refs::NodeRef;
use crate::Symbol;

// ============================================================================
// Error type
// ============================================================================

/// Parse error for the graph text format.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("parse error at offset {offset}: {message}")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

// ============================================================================
// Raw (unresolved) structures
// ============================================================================

#[derive(Debug, Clone)]
struct RawNode<'a> {
    name: &'a str,
    kind: &'a str,
    operands: Vec<&'a str>,
    imm: Option<i64>,
    /// Remaining input length where this node started.
    rest_len: usize,
}

#[derive(Debug, Clone)]
struct RawBlock<'a> {
    label: &'a str,
    nodes: Vec<RawNode<'a>>,
}

// ============================================================================
// Winnow parsers
// ============================================================================

/// Skip whitespace and `//` comments.
fn ws(input: &mut &str) -> ModalResult<()> {
    loop {
        take_while(0.., |c: char| c.is_ascii_whitespace())
            .void()
            .parse_next(input)?;
        if input.starts_with("//") {
            take_till(0.., '\n').void().parse_next(input)?;
        } else {
            return Ok(());
        }
    }
}

/// Skip spaces and tabs without crossing a line break.
fn space0(input: &mut &str) -> ModalResult<()> {
    take_while(0.., [' ', '\t']).void().parse_next(input)
}

fn word<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

/// Parse a value reference: %name
fn value_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded('%', word).parse_next(input)
}

/// Parse a kind token: [A-Z][a-zA-Z0-9]*
fn kind_token<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_uppercase()),
        take_while(0.., |c: char| c.is_ascii_alphanumeric()),
    )
        .take()
        .parse_next(input)
}

/// Parse `%name = Kind %a, %b #imm` on a single line.
fn raw_node<'a>(input: &mut &'a str) -> ModalResult<RawNode<'a>> {
    let rest_len = input.len();
    let name = value_name.parse_next(input)?;
    (space0, '=', space0).parse_next(input)?;
    let kind = kind_token.parse_next(input)?;
    let operands: Vec<&str> = opt(preceded(
        space0,
        separated(1.., value_name, (space0, ',', space0)),
    ))
    .parse_next(input)?
    .unwrap_or_default();
    let imm = opt(preceded((space0, '#'), ascii::dec_int::<_, i64, _>)).parse_next(input)?;
    space0.parse_next(input)?;
    Ok(RawNode {
        name,
        kind,
        operands,
        imm,
        rest_len,
    })
}

/// Parse `^label:` followed by its nodes.
fn raw_block<'a>(input: &mut &'a str) -> ModalResult<RawBlock<'a>> {
    let label = preceded('^', word).parse_next(input)?;
    ':'.parse_next(input)?;
    let nodes = repeat(0.., preceded(ws, raw_node)).parse_next(input)?;
    Ok(RawBlock { label, nodes })
}

// ============================================================================
// GraphBuilder (Raw -> Graph)
// ============================================================================

struct GraphBuilder<'s> {
    source: &'s str,
    graph: Graph,
    values: HashMap<String, NodeRef>,
}

impl<'s> GraphBuilder<'s> {
    fn error_at(&self, rest_len: usize, message: String) -> ParseError {
        ParseError {
            message,
            offset: self.source.len() - rest_len,
        }
    }

    fn build_block(&mut self, raw: &RawBlock<'_>) -> Result<(), ParseError> {
        let block = self.graph.create_block(Symbol::from_dynamic(raw.label));
        for node in &raw.nodes {
            let mut operands = Vec::with_capacity(node.operands.len());
            for name in &node.operands {
                let value = self.values.get(*name).copied().ok_or_else(|| {
                    self.error_at(node.rest_len, format!("undefined value %{name}"))
                })?;
                operands.push(value);
            }
            if self.values.contains_key(node.name) {
                return Err(self.error_at(
                    node.rest_len,
                    format!("value %{} is defined twice", node.name),
                ));
            }
            let created = self.graph.create_node(
                block,
                NodeKind::from_dynamic(node.kind),
                &operands,
                node.imm,
            );
            self.graph
                .set_label(created, Symbol::from_dynamic(node.name));
            self.values.insert(node.name.to_owned(), created);
        }
        Ok(())
    }
}

// ============================================================================
// Public API
// ============================================================================

/// A graph parsed from text, with its value-name table.
pub struct ParsedGraph {
    pub graph: Graph,
    pub values: HashMap<String, NodeRef>,
}

impl ParsedGraph {
    /// Look up a node by its textual name (without `%`).
    pub fn value(&self, name: &str) -> Option<NodeRef> {
        self.values.get(name).copied()
    }

    /// Like [`value`](Self::value), but panics on unknown names. For tests.
    pub fn node(&self, name: &str) -> NodeRef {
        self.value(name)
            .unwrap_or_else(|| panic!("no value named `%{name}` in parsed graph"))
    }
}

/// Parse the graph text format.
pub fn parse_graph(input: &str) -> Result<ParsedGraph, ParseError> {
    let mut remaining = input;
    let lex_error = |remaining: &str, e: winnow::error::ErrMode<_>| ParseError {
        message: format!("parse error: {}", e),
        offset: input.len() - remaining.len(),
    };

    ws.parse_next(&mut remaining)
        .map_err(|e| lex_error(remaining, e))?;
    let blocks: Vec<RawBlock<'_>> = repeat(0.., (raw_block, ws).map(|(b, _)| b))
        .parse_next(&mut remaining)
        .map_err(|e| lex_error(remaining, e))?;

    if !remaining.is_empty() {
        let expected = if blocks.is_empty() {
            "expected block label `^name:`"
        } else {
            "expected node definition `%name = Kind ...` or block label"
        };
        return Err(ParseError {
            message: expected.to_string(),
            offset: input.len() - remaining.len(),
        });
    }

    let mut builder = GraphBuilder {
        source: input,
        graph: Graph::new(),
        values: HashMap::new(),
    };
    for block in &blocks {
        builder.build_block(block)?;
    }
    Ok(ParsedGraph {
        graph: builder.graph,
        values: builder.values,
    })
}

/// Parse a graph, panicking on failure.
///
/// Convenience wrapper around [`parse_graph`] for tests.
pub fn parse_test_graph(input: &str) -> ParsedGraph {
    parse_graph(input).unwrap_or_else(|e| {
        panic!(
            "Failed to parse test graph at offset {}:\n  {}\n\nInput:\n{}",
            e.offset, e.message, input
        );
    })
}
