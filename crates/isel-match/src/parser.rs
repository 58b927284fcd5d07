//! Pattern grammar.
//!
//! ```text
//! node-name    := [a-z][a-zA-Z0-9]*
//! node-type    := [A-Z][a-zA-Z0-9]*
//! node-spec    := node-type [ '=' node-name ]
//! node-or-name := node-spec | node-name
//! argument     := node-or-name | match-rule
//! match-rule   := '(' node-spec argument+ ')'
//! ```
//!
//! A whole pattern is a single `argument`; whitespace between tokens is
//! ignored and the text must be consumed entirely. Whether a bare name may
//! stand at the root is decided by the rule compiler, not here.
//!
//! Tokens are recognized with winnow combinators. The grammar itself is
//! driven by hand so every failure can name the offending token and the
//! token class that was expected at that position.

use isel_ir::NodeKind;
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use crate::errors::PatternError;
use crate::pattern::{NodeName, PatRef, Pattern, PatternArg, PatternBuilder};

const EXPECT_ARGUMENT: &str = "'(', node-type or node-name";
const EXPECT_NODE_TYPE: &str = "node-type";
const EXPECT_NODE_NAME: &str = "node-name";
const EXPECT_CLOSE: &str = "')' or argument";
const EXPECT_END: &str = "end of pattern";

// ============================================================================
// Tokens
// ============================================================================

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_ascii_whitespace())
        .void()
        .parse_next(input)
}

/// Parse a node type: [A-Z][a-zA-Z0-9]*
fn node_type<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_uppercase()),
        take_while(0.., |c: char| c.is_ascii_alphanumeric()),
    )
        .take()
        .parse_next(input)
}

/// Parse a node name: [a-z][a-zA-Z0-9]*
fn node_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_lowercase()),
        take_while(0.., |c: char| c.is_ascii_alphanumeric()),
    )
        .take()
        .parse_next(input)
}

/// The token starting at the head of `rest`, for error messages.
fn offending_token(rest: &str) -> &str {
    match rest.chars().next() {
        None => "",
        Some(c @ ('(' | ')' | '=')) => &rest[..c.len_utf8()],
        Some(_) => {
            let end = rest
                .find(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '='))
                .unwrap_or(rest.len());
            &rest[..end]
        }
    }
}

// ============================================================================
// Grammar
// ============================================================================

struct PatternParser<'s> {
    source: &'s str,
    rest: &'s str,
    builder: PatternBuilder,
}

impl<'s> PatternParser<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            rest: source,
            builder: PatternBuilder::new(),
        }
    }

    fn offset(&self) -> usize {
        self.source.len() - self.rest.len()
    }

    fn error(&self, expected: &'static str) -> PatternError {
        PatternError {
            offset: self.offset(),
            found: offending_token(self.rest).to_string(),
            expected,
        }
    }

    fn skip_ws(&mut self) {
        // `ws` accepts the empty string, so it cannot fail.
        let _ = ws.parse_next(&mut self.rest);
    }

    fn eat(&mut self, c: char) -> bool {
        if self.rest.starts_with(c) {
            self.rest = &self.rest[c.len_utf8()..];
            true
        } else {
            false
        }
    }

    /// argument := node-or-name | match-rule
    fn argument(&mut self) -> Result<PatternArg, PatternError> {
        self.skip_ws();
        if self.eat('(') {
            return self.match_rule().map(PatternArg::Node);
        }
        if let Ok(name) = node_name.parse_next(&mut self.rest) {
            return Ok(PatternArg::Name(NodeName::from_dynamic(name)));
        }
        if self.rest.starts_with(|c: char| c.is_ascii_uppercase()) {
            return self.node_spec().map(PatternArg::Node);
        }
        Err(self.error(EXPECT_ARGUMENT))
    }

    /// node-spec := node-type [ '=' node-name ]
    fn node_spec(&mut self) -> Result<PatRef, PatternError> {
        self.skip_ws();
        let offset = self.offset();
        let kind = node_type
            .parse_next(&mut self.rest)
            .map_err(|_| self.error(EXPECT_NODE_TYPE))?;

        let before_eq = self.rest;
        self.skip_ws();
        let name = if self.eat('=') {
            self.skip_ws();
            let name = node_name
                .parse_next(&mut self.rest)
                .map_err(|_| self.error(EXPECT_NODE_NAME))?;
            Some(NodeName::from_dynamic(name))
        } else {
            self.rest = before_eq;
            None
        };

        Ok(self
            .builder
            .node(NodeKind::from_dynamic(kind), name, offset))
    }

    /// match-rule := '(' node-spec argument+ ')'
    ///
    /// The opening parenthesis has already been consumed.
    fn match_rule(&mut self) -> Result<PatRef, PatternError> {
        let head = self.node_spec()?;
        let mut count = 0usize;
        loop {
            self.skip_ws();
            if self.rest.starts_with(')') {
                if count == 0 {
                    return Err(self.error(EXPECT_ARGUMENT));
                }
                self.eat(')');
                return Ok(head);
            }
            if self.rest.is_empty() {
                return Err(self.error(EXPECT_CLOSE));
            }
            let arg = self.argument()?;
            self.builder.push_arg(head, arg);
            count += 1;
        }
    }

    fn finish(mut self) -> Result<Pattern, PatternError> {
        let root = self.argument()?;
        self.skip_ws();
        if !self.rest.is_empty() {
            return Err(self.error(EXPECT_END));
        }
        Ok(self.builder.finish(root))
    }
}

/// Parse a pattern string into a [`Pattern`] tree.
pub fn parse_pattern(source: &str) -> Result<Pattern, PatternError> {
    PatternParser::new(source).finish()
}
