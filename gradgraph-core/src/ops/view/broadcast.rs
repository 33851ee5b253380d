use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::Matrix;

/// How a source shape is replicated onto a target shape.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Replication {
    Same,
    Scalar,
    Rows,
    Columns,
}

fn replication(source: (usize, usize), target: (usize, usize)) -> Result<Replication, GradGraphError> {
    if source == target {
        Ok(Replication::Same)
    } else if source == (1, 1) {
        Ok(Replication::Scalar)
    } else if source.0 == 1 && source.1 == target.1 {
        Ok(Replication::Rows)
    } else if source.1 == 1 && source.0 == target.0 {
        Ok(Replication::Columns)
    } else {
        Err(GradGraphError::shape(target, source, "broadcast"))
    }
}

/// Replicates `a` (scalar, row vector or column vector) to the shape of `like`.
#[derive(Debug)]
struct Broadcast;

impl Operation for Broadcast {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        let (a, like) = (ctx.inputs[0], ctx.inputs[1]);
        let (rows, cols) = like.shape();
        let value = match replication(a.shape(), like.shape())? {
            Replication::Same => a.clone(),
            Replication::Scalar => Matrix::filled(rows, cols, a.get(0, 0)),
            Replication::Rows => Matrix::from_fn(rows, cols, |_, c| a.get(0, c)),
            Replication::Columns => Matrix::from_fn(rows, cols, |r, _| a.get(r, 0)),
        };
        Ok(Evaluation::value(value))
    }

    /// Sums the incoming gradient along the replicated axis.
    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let (a, g) = (ctx.inputs[0], ctx.grad);
        let grad = match replication(a.shape(), g.shape())? {
            Replication::Same => g.clone(),
            Replication::Scalar => Matrix::scalar(g.sum()),
            Replication::Rows => g.column_sums(),
            Replication::Columns => g.row_sums(),
        };
        Ok(vec![Some(grad), None])
    }
}

impl Graph {
    /// Replicates `a` to the shape of `like`. `like` only provides the shape and
    /// receives no gradient.
    pub fn new_broadcast(&mut self, a: NodeId, like: NodeId) -> Result<NodeId, GradGraphError> {
        self.push_function(Broadcast, &[a, like])
    }
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;
