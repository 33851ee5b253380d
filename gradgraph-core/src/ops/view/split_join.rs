use crate::autograd::graph::check_dims;
use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::Matrix;

// --- Split ---

/// Extracts the `rows x cols` block of `x` starting at `(row, col)`.
#[derive(Debug)]
struct Split {
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
}

impl Operation for Split {
    fn name(&self) -> &'static str {
        "split"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        let block = ctx.inputs[0].block(self.row, self.col, self.rows, self.cols)?;
        Ok(Evaluation::value(block))
    }

    /// Scatters the gradient back into a zero matrix at the same offset.
    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let mut dx = Matrix::zeros_like(ctx.inputs[0]);
        dx.set_block(self.row, self.col, ctx.grad)?;
        Ok(vec![Some(dx)])
    }
}

// --- Join ---

/// Concatenates the row-major buffers of `a` and `b` and views them as `rows x cols`.
#[derive(Debug)]
struct Join {
    rows: usize,
    cols: usize,
}

impl Operation for Join {
    fn name(&self) -> &'static str {
        "join"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        let (a, b) = (ctx.inputs[0], ctx.inputs[1]);
        if a.len() + b.len() != self.rows * self.cols {
            return Err(GradGraphError::ShapeMismatch {
                expected: (self.rows, self.cols),
                actual: (1, a.len() + b.len()),
                operation: "join".to_string(),
            });
        }
        let mut data = Vec::with_capacity(self.rows * self.cols);
        data.extend_from_slice(a.as_slice());
        data.extend_from_slice(b.as_slice());
        Ok(Evaluation::value(Matrix::new(self.rows, self.cols, data)?))
    }

    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let (a, b) = (ctx.inputs[0], ctx.inputs[1]);
        let (head, tail) = ctx.grad.as_slice().split_at(a.len());
        Ok(vec![
            Some(Matrix::new(a.rows(), a.cols(), head.to_vec())?),
            Some(Matrix::new(b.rows(), b.cols(), tail.to_vec())?),
        ])
    }
}

impl Graph {
    /// Sub-block view of `x`. Bounds are checked when the node is evaluated.
    pub fn new_split(
        &mut self,
        x: NodeId,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<NodeId, GradGraphError> {
        check_dims(rows, cols, "new_split")?;
        self.push_function(Split { row, col, rows, cols }, &[x])
    }

    /// Row-major concatenation of `a` and `b`, shaped `rows x cols`.
    pub fn new_join(
        &mut self,
        a: NodeId,
        b: NodeId,
        rows: usize,
        cols: usize,
    ) -> Result<NodeId, GradGraphError> {
        check_dims(rows, cols, "new_join")?;
        self.push_function(Join { rows, cols }, &[a, b])
    }
}

#[cfg(test)]
#[path = "split_join_test.rs"]
mod tests;
