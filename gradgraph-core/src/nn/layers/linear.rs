use crate::autograd::graph::check_dims;
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::Matrix;

/// Handle of a fully connected layer `y = x Wᵀ + b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Linear {
    pub output: NodeId,
    /// `out x in` weight matrix.
    pub weight: NodeId,
    /// `1 x out` bias, broadcast over the rows of `x`.
    pub bias: Option<NodeId>,
}

impl Graph {
    /// Fully connected layer over the rows of `x` (`n x in_features`).
    ///
    /// The weight is drawn from `N(0, 1/in_features)`; the bias starts at zero.
    pub fn new_linear(
        &mut self,
        x: NodeId,
        in_features: usize,
        out_features: usize,
        bias: bool,
    ) -> Result<Linear, GradGraphError> {
        check_dims(in_features, out_features, "new_linear")?;
        let weight = self.new_variable(out_features, in_features)?;
        let bias = if bias {
            Some(self.new_variable_with(Matrix::zeros(1, out_features))?)
        } else {
            None
        };
        let y = self.new_affine(x, weight, bias)?;
        let output = self.new_composite(y)?;
        Ok(Linear {
            output,
            weight,
            bias,
        })
    }

    /// `x Wᵀ (+ b)` over existing parameter nodes, shared by the attention projections.
    pub(crate) fn new_affine(
        &mut self,
        x: NodeId,
        weight: NodeId,
        bias: Option<NodeId>,
    ) -> Result<NodeId, GradGraphError> {
        let wt = self.new_transpose(weight)?;
        let y = self.new_product(x, wt)?;
        match bias {
            Some(b) => {
                let rows = self.new_broadcast(b, y)?;
                self.new_add(y, rows)
            }
            None => Ok(y),
        }
    }
}

#[cfg(test)]
#[path = "linear_test.rs"]
mod tests;
