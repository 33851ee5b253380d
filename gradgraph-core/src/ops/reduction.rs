//! Full reductions to a `1x1` value.

use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::{Matrix, Scalar};

#[derive(Debug)]
struct Sum;

impl Operation for Sum {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        Ok(Evaluation::value(Matrix::scalar(ctx.inputs[0].sum())))
    }

    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let (rows, cols) = ctx.inputs[0].shape();
        Ok(vec![Some(Matrix::filled(rows, cols, ctx.grad.get(0, 0)))])
    }
}

#[derive(Debug)]
struct Mean;

impl Operation for Mean {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        Ok(Evaluation::value(Matrix::scalar(ctx.inputs[0].mean())))
    }

    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let x = ctx.inputs[0];
        let share = ctx.grad.get(0, 0) / x.len() as Scalar;
        Ok(vec![Some(Matrix::filled(x.rows(), x.cols(), share))])
    }
}

impl Graph {
    /// Sum of all elements, as a `1x1` matrix.
    pub fn new_sum(&mut self, x: NodeId) -> Result<NodeId, GradGraphError> {
        self.push_function(Sum, &[x])
    }

    /// Mean of all elements, as a `1x1` matrix.
    pub fn new_mean(&mut self, x: NodeId) -> Result<NodeId, GradGraphError> {
        self.push_function(Mean, &[x])
    }
}
