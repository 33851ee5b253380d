//! Gaussian density, log-density and the reparameterized sampler.

use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::{Matrix, Scalar};
use std::f64::consts::PI;

// --- Density ---

/// Elementwise normal density (or its logarithm) of `x` under `N(mean, std^2)`.
#[derive(Debug)]
struct Density {
    log: bool,
}

impl Density {
    fn evaluate(&self, x: Scalar, mean: Scalar, std: Scalar) -> Scalar {
        let z = (x - mean) / std;
        let log_p = -0.5 * z * z - std.ln() - 0.5 * (2.0 * PI).ln();
        if self.log {
            log_p
        } else {
            log_p.exp()
        }
    }
}

impl Operation for Density {
    fn name(&self) -> &'static str {
        if self.log {
            "log_gaussian"
        } else {
            "gaussian"
        }
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        let (x, mean, std) = (ctx.inputs[0], ctx.inputs[1], ctx.inputs[2]);
        x.ensure_same_shape(mean, self.name())?;
        x.ensure_same_shape(std, self.name())?;
        let data = (0..x.len())
            .map(|i| self.evaluate(x.as_slice()[i], mean.as_slice()[i], std.as_slice()[i]))
            .collect();
        Ok(Evaluation::value(Matrix::new(x.rows(), x.cols(), data)?))
    }

    /// With `d = x - mean`: `dlogp/dx = -d/s^2`, `dlogp/dmean = d/s^2`,
    /// `dlogp/ds = d^2/s^3 - 1/s`. The density multiplies each by `p`.
    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let (x, mean, std) = (ctx.inputs[0], ctx.inputs[1], ctx.inputs[2]);
        let mut dx = Matrix::zeros_like(x);
        let mut dmean = Matrix::zeros_like(x);
        let mut dstd = Matrix::zeros_like(x);
        for i in 0..x.len() {
            let (d, s) = (x.as_slice()[i] - mean.as_slice()[i], std.as_slice()[i]);
            let scale = if self.log {
                ctx.grad.as_slice()[i]
            } else {
                ctx.grad.as_slice()[i] * ctx.output.as_slice()[i]
            };
            let dz = d / (s * s);
            dx.as_mut_slice()[i] = -scale * dz;
            dmean.as_mut_slice()[i] = scale * dz;
            dstd.as_mut_slice()[i] = scale * (d * dz / s - 1.0 / s);
        }
        Ok(vec![Some(dx), Some(dmean), Some(dstd)])
    }
}

// --- Sampler ---

/// Reparameterized draw `mean + std * eps`, `eps ~ N(0, 1)` redrawn every epoch.
#[derive(Debug)]
struct Sampler;

impl Operation for Sampler {
    fn name(&self) -> &'static str {
        "sampler"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        let (mean, std) = (ctx.inputs[0], ctx.inputs[1]);
        mean.ensure_same_shape(std, "sampler")?;
        let (rows, cols) = mean.shape();
        let eps = match ctx.reusable(0, (rows, cols)) {
            Some(eps) => eps,
            None => ctx.rng.normal_matrix(rows, cols, 0.0, 1.0),
        };
        let value = mean.add(&std.hadamard(&eps)?)?;
        Ok(Evaluation::with_saved(value, vec![eps]))
    }

    /// The gradient reaches `mean` unchanged and `std` scaled by the drawn noise.
    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let eps = ctx.saved(0, "sampler")?;
        Ok(vec![Some(ctx.grad.clone()), Some(ctx.grad.hadamard(eps)?)])
    }
}

impl Graph {
    /// Normal density of `x` given `mean` and `std`, all of the same shape.
    pub fn new_gaussian(&mut self, x: NodeId, mean: NodeId, std: NodeId) -> Result<NodeId, GradGraphError> {
        self.push_function(Density { log: false }, &[x, mean, std])
    }

    /// Log of the normal density.
    pub fn new_log_gaussian(&mut self, x: NodeId, mean: NodeId, std: NodeId) -> Result<NodeId, GradGraphError> {
        self.push_function(Density { log: true }, &[x, mean, std])
    }

    /// Draws from `N(mean, std^2)` with the reparameterization trick.
    pub fn new_sampler(&mut self, mean: NodeId, std: NodeId) -> Result<NodeId, GradGraphError> {
        self.push_function(Sampler, &[mean, std])
    }
}

#[cfg(test)]
#[path = "prob_test.rs"]
mod tests;
