//! # Compiler Errors
//!
//! Typed failures for every compilation phase. Each error carries the node id
//! or script line it refers to so hosts can point authors at the problem.

use crate::validator::ValidationError;
use thiserror::Error;

/// Malformed top-level script structure (node delimiters, headers, preamble)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("script parse error at line {line}: {reason}")]
pub struct ScriptParseError {
    /// 1-based line number in the imported text
    pub line: usize,
    pub reason: String,
}

impl ScriptParseError {
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// A node block whose body cannot be turned back into a node payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to import node '{node_id}' (line {line}): {reason}")]
pub struct NodeImportError {
    pub node_id: String,
    /// 1-based line number of the offending line, or of the node title
    pub line: usize,
    pub reason: String,
}

impl NodeImportError {
    pub fn new(node_id: impl Into<String>, line: usize, reason: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            line,
            reason: reason.into(),
        }
    }
}

/// A condition clause rejected by the strict condition parser
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse condition clause '{clause}': {reason}")]
pub struct ConditionParseError {
    pub clause: String,
    pub reason: String,
}

/// Unified error type for export and import
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    ScriptParse(#[from] ScriptParseError),

    #[error(transparent)]
    NodeImport(#[from] NodeImportError),

    #[error(transparent)]
    ConditionParse(#[from] ConditionParseError),

    /// Node payload tagged with a kind no handler exists for
    #[error("node '{node_id}' has unknown kind '{kind}'")]
    UnknownNodeKind { node_id: String, kind: String },

    /// An id or speaker that cannot be written into the dialect
    #[error("invalid {what}: '{value}'")]
    InvalidIdentifier { what: &'static str, value: String },

    /// Structural validation errors that would produce an unparseable script
    #[error("graph is not exportable: {}", format_errors(.errors))]
    InvalidGraph { errors: Vec<ValidationError> },

    #[error("graph document JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompileError {
    pub fn invalid_identifier(what: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            what,
            value: value.into(),
        }
    }

    /// Node id the failure is attributed to, when there is one
    pub fn node_id(&self) -> Option<&str> {
        match self {
            CompileError::NodeImport(e) => Some(&e.node_id),
            CompileError::UnknownNodeKind { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_import_error_names_the_node() {
        let err: CompileError = NodeImportError::new("greet", 12, "choice has no text").into();
        assert_eq!(err.node_id(), Some("greet"));
        assert_eq!(
            err.to_string(),
            "failed to import node 'greet' (line 12): choice has no text"
        );
    }

    #[test]
    fn invalid_graph_lists_every_error() {
        let err = CompileError::InvalidGraph {
            errors: vec![
                ValidationError::MissingStartNode {
                    node_id: "start".to_string(),
                },
                ValidationError::Structural {
                    node_id: "menu".to_string(),
                    reason: "player node has no choices".to_string(),
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("start node 'start' does not exist"));
        assert!(text.contains("player node has no choices"));
    }
}
