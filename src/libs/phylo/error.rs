use super::node::NodeId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    /// Error during parsing (e.g., syntax error)
    #[error("Parse error at line {line}, column {column}:\n{message}\nSnippet: \"{snippet}\"")]
    ParseError {
        /// A human-readable message explaining the error
        message: String,
        /// The line number (1-based)
        line: usize,
        /// The column number (1-based)
        column: usize,
        /// The snippet of input where the error occurred
        snippet: String,
    },

    /// A branch length or numeric parameter that is not a finite number
    #[error("Bad number: {0}")]
    BadNumber(String),

    /// A structural mutator got something that is not a live node of this tree
    #[error("Link type error: {0}")]
    LinkTypeError(String),

    /// The operation is not allowed in the current topology
    #[error("Structural precondition failed: {0}")]
    StructuralPrecondition(String),

    /// The two nodes do not share a root
    #[error("Nodes {a} and {b} are disconnected (no common ancestor)")]
    Disconnected { a: NodeId, b: NodeId },
}

impl TreeError {
    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        TreeError::StructuralPrecondition(msg.into())
    }
}
