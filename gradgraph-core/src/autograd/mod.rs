//! Graph arena, node protocol and the reverse-mode machinery.

pub mod grad_check;
pub mod graph;
pub mod node;
pub(crate) mod operation;

pub use grad_check::{check_gradients, GradCheckConfig, GradCheckError};
pub use graph::Graph;
pub use node::NodeId;
