use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::{Matrix, Scalar};

/// Zeroes each entry with probability `rate`. Kept entries are not rescaled.
#[derive(Debug)]
struct Dropout {
    rate: Scalar,
}

impl Operation for Dropout {
    fn name(&self) -> &'static str {
        "dropout"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        let x = ctx.inputs[0];
        let mask = match ctx.reusable(0, x.shape()) {
            Some(mask) => mask,
            None => {
                let keep = 1.0 - self.rate;
                let rng = &mut *ctx.rng;
                Matrix::from_fn(x.rows(), x.cols(), |_, _| {
                    if rng.bernoulli(keep) {
                        1.0
                    } else {
                        0.0
                    }
                })
            }
        };
        let value = x.hadamard(&mask)?;
        Ok(Evaluation::with_saved(value, vec![mask]))
    }

    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let mask = ctx.saved(0, "dropout")?;
        Ok(vec![Some(ctx.grad.hadamard(mask)?)])
    }
}

impl Graph {
    /// Random dropout with a fresh Bernoulli mask each epoch.
    ///
    /// # Errors
    /// `InvalidArgument` unless `0 <= rate < 1`.
    pub fn new_dropout(&mut self, x: NodeId, rate: Scalar) -> Result<NodeId, GradGraphError> {
        if !(0.0..1.0).contains(&rate) {
            return Err(GradGraphError::InvalidArgument(format!(
                "dropout rate must be in [0, 1), got {}",
                rate
            )));
        }
        self.push_function(Dropout { rate }, &[x])
    }
}

#[cfg(test)]
#[path = "dropout_test.rs"]
mod tests;
