use crate::autograd::graph::check_dims;
use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::{Matrix, Scalar};

/// Handle of an embedding lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Embedding {
    pub output: NodeId,
    /// `vocab x dim` table; row `i` is the embedding of token `i`.
    pub table: NodeId,
}

/// Gathers one table row per entry of the index matrix. Inputs: `indices, table`.
#[derive(Debug)]
struct Lookup;

fn token(value: Scalar, vocab: usize) -> Result<usize, GradGraphError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(GradGraphError::InvalidArgument(format!(
            "embedding: {} is not a token index",
            value
        )));
    }
    let index = value as usize;
    if index >= vocab {
        return Err(GradGraphError::IndexOutOfBounds {
            index,
            bound: vocab,
            operation: "embedding".to_string(),
        });
    }
    Ok(index)
}

impl Operation for Lookup {
    fn name(&self) -> &'static str {
        "embedding"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        let (indices, table) = (ctx.inputs[0], ctx.inputs[1]);
        let dim = table.cols();
        let mut y = Matrix::zeros(indices.len(), dim);
        for (r, &value) in indices.as_slice().iter().enumerate() {
            let t = token(value, table.rows())?;
            y.row_mut(r).copy_from_slice(table.row(t));
        }
        Ok(Evaluation::value(y))
    }

    /// Scatter-adds every output row back into the table row it came from.
    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let (indices, table, g) = (ctx.inputs[0], ctx.inputs[1], ctx.grad);
        let mut dtable = Matrix::zeros_like(table);
        for (r, &value) in indices.as_slice().iter().enumerate() {
            let t = token(value, table.rows())?;
            for (acc, &gi) in dtable.row_mut(t).iter_mut().zip(g.row(r)) {
                *acc += gi;
            }
        }
        Ok(vec![None, Some(dtable)])
    }
}

impl Graph {
    /// Embedding lookup: every entry of `indices` (any shape, read row-major) selects
    /// a row of a `vocab x dim` table, giving a `indices.len() x dim` output.
    pub fn new_embedding(&mut self, indices: NodeId, vocab: usize, dim: usize) -> Result<Embedding, GradGraphError> {
        check_dims(vocab, dim, "new_embedding")?;
        let table = self.new_variable(vocab, dim)?;
        let output = self.push_function(Lookup, &[indices, table])?;
        Ok(Embedding { output, table })
    }
}

#[cfg(test)]
#[path = "embedding_test.rs"]
mod tests;
