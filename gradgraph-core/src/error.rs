use thiserror::Error;

/// Custom error type for the gradgraph engine.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum GradGraphError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
        operation: String,
    },

    #[error("Index out of bounds: index {index} for bound {bound} during operation {operation}")]
    IndexOutOfBounds {
        index: usize,
        bound: usize,
        operation: String,
    },

    #[error("Matrix creation error: data length {data_len} does not match shape {shape:?}")]
    MatrixCreationError {
        data_len: usize,
        shape: (usize, usize),
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Node {node} is not a leaf; operation '{operation}' requires a constant or variable")]
    NotALeaf { node: usize, operation: String },

    #[error("Node {0} does not belong to this graph")]
    UnknownNode(usize),

    #[error("Node {node} has no cached value; call forward() first")]
    Uncached { node: usize },

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl GradGraphError {
    /// Shorthand for the most common failure, a shape contract violation.
    pub(crate) fn shape(
        expected: (usize, usize),
        actual: (usize, usize),
        operation: &str,
    ) -> Self {
        GradGraphError::ShapeMismatch {
            expected,
            actual,
            operation: operation.to_string(),
        }
    }
}
