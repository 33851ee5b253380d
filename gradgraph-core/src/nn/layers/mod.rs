//! Layers with trainable parameters.

pub mod conv2d;
pub mod embedding;
pub mod gru;
pub mod linear;
pub mod norm;

pub use conv2d::{Conv2d, Conv2dConfig};
pub use embedding::Embedding;
pub use gru::Gru;
pub use linear::Linear;
pub use norm::Norm;
