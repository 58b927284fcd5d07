//! Error types for pattern parsing, rule compilation and match selection.

use derive_more::{Display, Error};
use isel_ir::{NodeKind, NodeRef, RegistryError};

use crate::compile::ActionId;
use crate::pattern::NodeName;

// ============================================================================
// Grammar
// ============================================================================

/// Malformed pattern text.
#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
#[display("expected {expected} at offset {offset}, found {}", found_display(found))]
pub struct PatternError {
    /// Byte offset of the offending token.
    pub offset: usize,
    /// Offending token text; empty at end of input.
    pub found: String,
    /// Token class the grammar required here.
    pub expected: &'static str,
}

fn found_display(found: &str) -> String {
    if found.is_empty() {
        "end of input".to_string()
    } else {
        format!("`{found}`")
    }
}

// ============================================================================
// Rule compilation
// ============================================================================

pub type CompileResult<T> = Result<T, CompileError>;

/// Build-time failure while turning declared rules into a [`RuleSet`](crate::RuleSet).
#[derive(Clone, Debug, PartialEq, Display)]
#[display("{kind}")]
pub struct CompileError {
    kind: Box<CompileErrorKind>,
}

impl<E> From<E> for CompileError
where
    CompileErrorKind: From<E>,
{
    fn from(error: E) -> Self {
        CompileError {
            kind: Box::new(CompileErrorKind::from(error)),
        }
    }
}

impl CompileError {
    pub fn kind(&self) -> &CompileErrorKind {
        &self.kind
    }

    pub(crate) fn grammar(action: ActionId, pattern: &str, error: PatternError) -> Self {
        CompileErrorKind::Grammar {
            action,
            pattern: pattern.to_string(),
            error,
        }
        .into()
    }
}

#[derive(Clone, Debug, PartialEq, Display)]
pub enum CompileErrorKind {
    #[display("rule {action}: pattern `{pattern}`: {error}")]
    Grammar {
        action: ActionId,
        pattern: String,
        error: PatternError,
    },

    #[display(
        "rule {action}: pattern `{pattern}`: node name `{name}` is constrained to both {first} and {second}"
    )]
    AmbiguousBinding {
        action: ActionId,
        pattern: String,
        name: NodeName,
        first: NodeKind,
        second: NodeKind,
    },

    #[display("rule {action}: pattern `{pattern}`: root must be a node-spec, found bare name `{name}`")]
    BareRoot {
        action: ActionId,
        pattern: String,
        name: NodeName,
    },

    #[display("rule {action}: pattern `{pattern}`: unknown node kind {kind}")]
    UnknownKind {
        action: ActionId,
        pattern: String,
        kind: NodeKind,
    },

    #[display(
        "rule {action}: pattern `{pattern}`: {kind} takes {declared} operands but the pattern gives {found}"
    )]
    ArityMismatch {
        action: ActionId,
        pattern: String,
        kind: NodeKind,
        declared: usize,
        found: usize,
    },

    #[display("rule {action} declares no patterns")]
    EmptyRule { action: ActionId },

    #[display("rule {action} is declared more than once")]
    DuplicateAction { action: ActionId },

    #[display("{_0}")]
    Registry(RegistryError),
}

impl From<RegistryError> for CompileErrorKind {
    fn from(error: RegistryError) -> Self {
        CompileErrorKind::Registry(error)
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &*self.kind {
            CompileErrorKind::Grammar { error, .. } => Some(error),
            CompileErrorKind::Registry(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

/// A finalized match already claimed a node this match wants to consume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Error)]
#[display("match rooted at {root} needs {node}, already consumed by the match rooted at {holder}")]
pub struct ConsumptionConflict {
    pub root: NodeRef,
    pub node: NodeRef,
    pub holder: NodeRef,
}

// ============================================================================
// Rule tables
// ============================================================================

#[derive(Debug, Display)]
pub enum TableError {
    #[display("cannot read rule table {}: {source}", path.display())]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[display("malformed rule table: {_0}")]
    Json(serde_json::Error),

    #[display("{_0}")]
    Compile(CompileError),
}

impl From<serde_json::Error> for TableError {
    fn from(error: serde_json::Error) -> Self {
        TableError::Json(error)
    }
}

impl From<CompileError> for TableError {
    fn from(error: CompileError) -> Self {
        TableError::Compile(error)
    }
}

impl From<RegistryError> for TableError {
    fn from(error: RegistryError) -> Self {
        TableError::Compile(error.into())
    }
}

impl std::error::Error for TableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TableError::Io { source, .. } => Some(source),
            TableError::Json(e) => Some(e),
            TableError::Compile(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_error_names_offending_token() {
        let err = PatternError {
            offset: 5,
            found: "_x".to_string(),
            expected: "node-name",
        };
        assert_eq!(err.to_string(), "expected node-name at offset 5, found `_x`");

        let eof = PatternError {
            offset: 4,
            found: String::new(),
            expected: "')'",
        };
        assert_eq!(eof.to_string(), "expected ')' at offset 4, found end of input");
    }

    #[test]
    fn grammar_error_is_the_source() {
        use std::error::Error as _;
        let inner = PatternError {
            offset: 0,
            found: "(".to_string(),
            expected: "node-type",
        };
        let err = CompileError::grammar(ActionId::new("LEA"), "((", inner.clone());
        assert!(err.source().is_some());
        assert_eq!(
            err.to_string(),
            format!("rule LEA: pattern `((`: {inner}")
        );
    }
}
