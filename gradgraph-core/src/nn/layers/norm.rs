use crate::autograd::graph::check_dims;
use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::{Matrix, Scalar};

const EPSILON: Scalar = 1e-5;

/// Handle of a normalization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Norm {
    pub output: NodeId,
    /// Learnable scale `A`, initialised to ones.
    pub gain: NodeId,
    /// Learnable shift `B`, initialised to zeros.
    pub bias: NodeId,
}

/// Standardizes every `rows x cols` block of `x` over all of its elements, then
/// applies `A ∘ xhat + B`.
///
/// The input is tiled vertically: `x` must be `k*rows x cols`. Blocks are contiguous
/// in the row-major buffer, which keeps the loops flat.
#[derive(Debug)]
struct BlockNorm {
    rows: usize,
    cols: usize,
}

impl BlockNorm {
    fn block_len(&self) -> usize {
        self.rows * self.cols
    }
}

impl Operation for BlockNorm {
    fn name(&self) -> &'static str {
        "norm"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        let (x, gain, bias) = (ctx.inputs[0], ctx.inputs[1], ctx.inputs[2]);
        if x.cols() != self.cols || x.rows() % self.rows != 0 {
            return Err(GradGraphError::shape((self.rows, self.cols), x.shape(), "norm"));
        }
        gain.ensure_same_shape(bias, "norm")?;
        if gain.shape() != (self.rows, self.cols) {
            return Err(GradGraphError::shape((self.rows, self.cols), gain.shape(), "norm"));
        }

        let n = self.block_len();
        let blocks = x.rows() / self.rows;
        let mut xhat = Matrix::zeros_like(x);
        let mut inv_std = Matrix::zeros(blocks, 1);
        let mut y = Matrix::zeros_like(x);

        for k in 0..blocks {
            let span = k * n..(k + 1) * n;
            let block = &x.as_slice()[span.clone()];
            let mean = block.iter().sum::<Scalar>() / n as Scalar;
            let var = block.iter().map(|v| (v - mean).powi(2)).sum::<Scalar>() / n as Scalar;
            let inv = 1.0 / (var + EPSILON).sqrt();
            inv_std.set(k, 0, inv);

            let out = &mut xhat.as_mut_slice()[span.clone()];
            for (h, &v) in out.iter_mut().zip(block) {
                *h = (v - mean) * inv;
            }
            let normalized = &xhat.as_slice()[span.clone()];
            for (i, yi) in y.as_mut_slice()[span].iter_mut().enumerate() {
                *yi = gain.as_slice()[i] * normalized[i] + bias.as_slice()[i];
            }
        }
        Ok(Evaluation::with_saved(y, vec![xhat, inv_std]))
    }

    /// With `dxhat = g ∘ A` per block:
    /// `dx = inv_std (dxhat - mean(dxhat) - xhat mean(dxhat ∘ xhat))`.
    /// `A` and `B` sum their contributions over all blocks.
    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let (x, gain, g) = (ctx.inputs[0], ctx.inputs[1], ctx.grad);
        let xhat = ctx.saved(0, "norm")?;
        let inv_std = ctx.saved(1, "norm")?;

        let n = self.block_len();
        let mut dx = Matrix::zeros_like(x);
        let mut dgain = Matrix::zeros_like(gain);
        let mut dbias = Matrix::zeros_like(gain);

        for k in 0..inv_std.rows() {
            let offset = k * n;
            let mut mean_dxhat = 0.0;
            let mut mean_dxhat_xhat = 0.0;
            for i in 0..n {
                let (gi, hi) = (g.as_slice()[offset + i], xhat.as_slice()[offset + i]);
                let dxhat = gi * gain.as_slice()[i];
                mean_dxhat += dxhat;
                mean_dxhat_xhat += dxhat * hi;
                dgain.as_mut_slice()[i] += gi * hi;
                dbias.as_mut_slice()[i] += gi;
            }
            mean_dxhat /= n as Scalar;
            mean_dxhat_xhat /= n as Scalar;

            let inv = inv_std.get(k, 0);
            for i in 0..n {
                let dxhat = g.as_slice()[offset + i] * gain.as_slice()[i];
                let hi = xhat.as_slice()[offset + i];
                dx.as_mut_slice()[offset + i] = inv * (dxhat - mean_dxhat - hi * mean_dxhat_xhat);
            }
        }
        Ok(vec![Some(dx), Some(dgain), Some(dbias)])
    }
}

impl Graph {
    /// Block normalization of `x` with learnable gain and bias, both `rows x cols`.
    ///
    /// `rows = 1` gives per-row layer normalization; `rows = x.rows` normalizes the
    /// whole matrix at once.
    pub fn new_norm(&mut self, x: NodeId, rows: usize, cols: usize) -> Result<Norm, GradGraphError> {
        check_dims(rows, cols, "new_norm")?;
        let gain = self.new_variable_with(Matrix::ones(rows, cols))?;
        let bias = self.new_variable_with(Matrix::zeros(rows, cols))?;
        let output = self.push_function(BlockNorm { rows, cols }, &[x, gain, bias])?;
        Ok(Norm { output, gain, bias })
    }
}

#[cfg(test)]
#[path = "norm_test.rs"]
mod tests;
