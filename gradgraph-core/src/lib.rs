//! # gradgraph-core
//!
//! Reverse-mode automatic differentiation over matrix-valued computation graphs.
//!
//! A [`Graph`] owns every node. Factories such as [`Graph::new_variable`],
//! [`Graph::new_product`] or [`Graph::new_gru`] append nodes and return [`NodeId`]
//! handles; [`Graph::forward`] evaluates with memoization, [`Graph::backward`]
//! accumulates gradients, and the optimizers in [`optim`] update the variables.
//!
//! ```
//! use gradgraph_core::{Graph, Matrix};
//!
//! # fn main() -> Result<(), gradgraph_core::GradGraphError> {
//! let mut g = Graph::with_seed(7);
//! let x = g.new_constant_with(Matrix::row_vector(vec![1.0, 2.0]))?;
//! let w = g.new_variable_with(Matrix::column_vector(vec![0.5, -1.0]))?;
//! let y = g.new_product(x, w)?;
//! assert_eq!(g.forward(y)?.get(0, 0), -1.5);
//!
//! g.backward(y, &Matrix::scalar(1.0))?;
//! assert_eq!(g.gradient(w)?, Matrix::column_vector(vec![1.0, 2.0]));
//! # Ok(())
//! # }
//! ```

pub mod autograd;
pub mod error;
pub mod matrix;
pub mod nn;
pub mod ops;
pub mod optim;
pub mod rng;
pub mod utils;

pub use autograd::{check_gradients, GradCheckConfig, GradCheckError, Graph, NodeId};
pub use error::GradGraphError;
pub use matrix::{Matrix, Scalar};
pub use rng::Rng;

// Re-export traits required by public functions/structs
pub use approx;
pub use num_traits;
