use gradgraph_core::GradGraphError;
use thiserror::Error;

/// Errors raised while encoding or decoding matrix streams.
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed stream: {0}")]
    Malformed(String),

    #[error("Count mismatch: expected {expected} matrices, stream holds {found}")]
    CountMismatch { expected: usize, found: usize },

    #[error(transparent)]
    Graph(#[from] GradGraphError),
}
