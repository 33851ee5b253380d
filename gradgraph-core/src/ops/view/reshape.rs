use crate::autograd::graph::check_dims;
use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::Matrix;

#[derive(Debug)]
struct Reshape {
    rows: usize,
    cols: usize,
}

impl Operation for Reshape {
    fn name(&self) -> &'static str {
        "reshape"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        Ok(Evaluation::value(ctx.inputs[0].reshape(self.rows, self.cols)?))
    }

    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let (rows, cols) = ctx.inputs[0].shape();
        Ok(vec![Some(ctx.grad.reshape(rows, cols)?)])
    }
}

#[derive(Debug)]
struct Transpose;

impl Operation for Transpose {
    fn name(&self) -> &'static str {
        "transpose"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        Ok(Evaluation::value(ctx.inputs[0].transpose()))
    }

    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        Ok(vec![Some(ctx.grad.transpose())])
    }
}

impl Graph {
    /// Reinterprets the row-major elements of `x` as a `rows x cols` matrix.
    pub fn new_reshape(&mut self, x: NodeId, rows: usize, cols: usize) -> Result<NodeId, GradGraphError> {
        check_dims(rows, cols, "new_reshape")?;
        self.push_function(Reshape { rows, cols }, &[x])
    }

    pub fn new_transpose(&mut self, x: NodeId) -> Result<NodeId, GradGraphError> {
        self.push_function(Transpose, &[x])
    }
}

#[cfg(test)]
#[path = "reshape_test.rs"]
mod tests;
