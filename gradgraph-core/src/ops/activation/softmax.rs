use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::{Matrix, Scalar};

/// Row-wise softmax with max subtraction. Rows that are entirely `-inf` give NaN.
pub(crate) fn softmax_rows(x: &Matrix) -> Matrix {
    let mut out = x.clone();
    for r in 0..out.rows() {
        let row = out.row_mut(r);
        let max = row.iter().copied().fold(Scalar::NEG_INFINITY, Scalar::max);
        let mut total = 0.0;
        for v in row.iter_mut() {
            *v = (*v - max).exp();
            total += *v;
        }
        for v in row.iter_mut() {
            *v /= total;
        }
    }
    out
}

// --- Softmax ---

#[derive(Debug)]
struct Softmax;

impl Operation for Softmax {
    fn name(&self) -> &'static str {
        "softmax"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        Ok(Evaluation::value(softmax_rows(ctx.inputs[0])))
    }

    /// `dx = s ∘ (g - <g, s>)` per row, i.e. `(diag(s) - s sᵀ) g`.
    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let (s, g) = (ctx.output, ctx.grad);
        let mut dx = Matrix::zeros_like(s);
        for r in 0..s.rows() {
            let dot: Scalar = s.row(r).iter().zip(g.row(r)).map(|(a, b)| a * b).sum();
            for ((d, &si), &gi) in dx.row_mut(r).iter_mut().zip(s.row(r)).zip(g.row(r)) {
                *d = si * (gi - dot);
            }
        }
        Ok(vec![Some(dx)])
    }
}

// --- LogSoftmax ---

#[derive(Debug)]
struct LogSoftmax;

impl Operation for LogSoftmax {
    fn name(&self) -> &'static str {
        "log_softmax"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        let mut out = ctx.inputs[0].clone();
        for r in 0..out.rows() {
            let row = out.row_mut(r);
            let max = row.iter().copied().fold(Scalar::NEG_INFINITY, Scalar::max);
            let log_total = row.iter().map(|v| (v - max).exp()).sum::<Scalar>().ln() + max;
            row.iter_mut().for_each(|v| *v -= log_total);
        }
        Ok(Evaluation::value(out))
    }

    /// `dx = g - softmax(x) * sum(g)` per row.
    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let (y, g) = (ctx.output, ctx.grad);
        let mut dx = g.clone();
        for r in 0..y.rows() {
            let total: Scalar = g.row(r).iter().sum();
            for (d, &yi) in dx.row_mut(r).iter_mut().zip(y.row(r)) {
                *d -= yi.exp() * total;
            }
        }
        Ok(vec![Some(dx)])
    }
}

impl Graph {
    /// Softmax over each row.
    pub fn new_softmax(&mut self, x: NodeId) -> Result<NodeId, GradGraphError> {
        self.push_function(Softmax, &[x])
    }

    /// Log-softmax over each row.
    pub fn new_log_softmax(&mut self, x: NodeId) -> Result<NodeId, GradGraphError> {
        self.push_function(LogSoftmax, &[x])
    }
}

#[cfg(test)]
#[path = "softmax_test.rs"]
mod tests;
