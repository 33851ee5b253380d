//! Matrix product.

use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::Matrix;

/// `y = a b`.
#[derive(Debug)]
struct Product;

impl Operation for Product {
    fn name(&self) -> &'static str {
        "product"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        Ok(Evaluation::value(ctx.inputs[0].matmul(ctx.inputs[1])?))
    }

    /// `da = g bᵀ`, `db = aᵀ g`.
    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let (a, b, g) = (ctx.inputs[0], ctx.inputs[1], ctx.grad);
        let grad_a = g.matmul(&b.transpose())?;
        let grad_b = a.transpose().matmul(g)?;
        Ok(vec![Some(grad_a), Some(grad_b)])
    }
}

impl Graph {
    /// Matrix product of `a` (`n x k`) and `b` (`k x m`).
    pub fn new_product(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, GradGraphError> {
        self.push_function(Product, &[a, b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{check_gradients, GradCheckConfig, GradCheckError};

    #[test]
    fn test_product_forward() -> Result<(), GradGraphError> {
        let mut g = Graph::with_seed(1);
        let a = g.new_constant_with(Matrix::from_rows(&[
            [1.0, 2.0, 3.0],
            [4.0, 5.0, 6.0],
            [7.0, 8.0, 9.0],
            [10.0, 11.0, 12.0],
        ])?)?;
        let b = g.new_constant_with(Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]])?)?;
        let y = g.new_product(a, b)?;
        let expected =
            Matrix::from_rows(&[[22.0, 28.0], [49.0, 64.0], [76.0, 100.0], [103.0, 136.0]])?;
        assert_eq!(g.forward(y)?, &expected);

        let bad = g.new_product(b, b)?;
        assert!(matches!(
            g.forward(bad),
            Err(GradGraphError::ShapeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_product_backward() -> Result<(), GradCheckError> {
        let mut g = Graph::with_seed(2);
        let a = g.new_variable(4, 3)?;
        let b = g.new_variable(3, 5)?;
        let y = g.new_product(a, b)?;
        let seed = g.random().uniform_matrix(4, 5, -1.0, 1.0);
        check_gradients(&mut g, y, &[a, b], Some(&seed), &GradCheckConfig::elementwise())
    }
}
