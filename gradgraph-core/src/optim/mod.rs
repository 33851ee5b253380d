//! Optimizers for training graph variables.
//!
//! An optimizer holds the list of variables it updates plus any per-variable state.
//! It only reads the gradients accumulated by [`Graph::backward`](crate::Graph::backward);
//! the caller sequences `backward -> update -> zero_grad`.

pub mod adam;
pub mod optimizer_trait;
pub mod sgd;

pub use adam::{Adam, AdamConfig};
pub use optimizer_trait::Optimizer;
pub use sgd::Sgd;

use crate::error::GradGraphError;
use crate::matrix::Scalar;

pub(crate) fn check_learning_rate(learning_rate: Scalar) -> Result<(), GradGraphError> {
    if !learning_rate.is_finite() || learning_rate <= 0.0 {
        return Err(GradGraphError::ConfigurationError(format!(
            "learning rate must be positive and finite, got {}",
            learning_rate
        )));
    }
    Ok(())
}
