use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::Scalar;
use crate::optim::{check_learning_rate, Optimizer};
use log::{debug, trace};

/// Plain stochastic gradient descent: `v -= learning_rate * grad(v)`.
#[derive(Debug, Clone)]
pub struct Sgd {
    variables: Vec<NodeId>,
    learning_rate: Scalar,
}

impl Sgd {
    /// # Errors
    /// `ConfigurationError` when the learning rate is not positive and finite.
    pub fn new(variables: Vec<NodeId>, learning_rate: Scalar) -> Result<Self, GradGraphError> {
        check_learning_rate(learning_rate)?;
        Ok(Sgd {
            variables,
            learning_rate,
        })
    }
}

impl Optimizer for Sgd {
    fn update(&mut self, graph: &mut Graph) -> Result<(), GradGraphError> {
        for &id in &self.variables {
            if let (value, Some(grad)) = graph.parameter(id)? {
                value.ensure_same_shape(grad, "sgd")?;
            }
        }

        let mut updated = 0usize;
        for &id in &self.variables {
            let (value, grad) = graph.parameter_mut(id)?;
            let grad = match grad {
                Some(grad) => grad,
                None => {
                    trace!("sgd: {} has no gradient, skipped", id);
                    continue;
                }
            };
            for (v, &g) in value.as_mut_slice().iter_mut().zip(grad.as_slice()) {
                *v -= self.learning_rate * g;
            }
            updated += 1;
        }
        debug!(
            "sgd: updated {} of {} variables (lr {})",
            updated,
            self.variables.len(),
            self.learning_rate
        );
        Ok(())
    }

    fn variables(&self) -> &[NodeId] {
        &self.variables
    }

    fn learning_rate(&self) -> Scalar {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: Scalar) -> Result<(), GradGraphError> {
        check_learning_rate(learning_rate)?;
        self.learning_rate = learning_rate;
        Ok(())
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
#[path = "sgd_test.rs"]
mod tests;
