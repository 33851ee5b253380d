//! # gradgraph-io
//!
//! Binary serialization of [`Matrix`](gradgraph_core::Matrix) values for the
//! variables of a [`Graph`](gradgraph_core::Graph).
//!
//! Every stream is a little-endian `u32` matrix count followed by the matrices,
//! each encoded as `u32 rows`, `u32 cols` and `rows * cols` row-major `f64` values.
//! The same layout carries full checkpoints (absolute values) and weight deltas
//! (`current - previous`) exchanged between training processes.

pub mod checkpoint;
pub mod error;
pub mod exchange;
pub mod wire;

// Re-export main components
pub use checkpoint::{load_checkpoint, save_checkpoint};
pub use error::SerializationError;
pub use exchange::WeightExchange;
pub use wire::{read_matrices, read_matrix, write_matrices, write_matrix};
