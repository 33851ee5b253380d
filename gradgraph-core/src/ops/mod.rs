//! # Operator Catalogue (`ops`)
//!
//! Every primitive node kind of the engine. Each operator is a small struct implementing
//! the crate-private `Operation` trait, paired with a `Graph::new_xxx` factory that
//! validates its arguments and wires the node into the arena.
//!
//! ## Key Submodules:
//!
//! - [`arithmetic`]: elementwise add, sub, mul, neg, abs, power, min, max.
//! - [`activation`]: log, tanh, sigmoid, relu, gelu, erf, softplus, softmax, log-softmax, dropout.
//! - [`linalg`]: matrix product.
//! - [`reduction`]: sum and mean.
//! - [`view`]: broadcast, split, join, reshape, transpose.
//! - [`prob`]: Gaussian density, log-density and the reparameterized sampler.
//!
//! Parameterised layers built on top of these (linear, norm, GRU, convolution,
//! embedding, attention) live in [`crate::nn`].

use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::error::GradGraphError;
use crate::matrix::{Matrix, Scalar};
use std::fmt;

pub mod activation;
pub mod arithmetic;
pub mod linalg;
pub mod prob;
pub mod reduction;
pub mod view;

/// Elementwise unary map `y = f(x)` with derivative `df(x, y)`.
pub(crate) struct Pointwise {
    pub name: &'static str,
    pub f: fn(Scalar) -> Scalar,
    pub df: fn(Scalar, Scalar) -> Scalar,
}

impl fmt::Debug for Pointwise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointwise({})", self.name)
    }
}

impl Operation for Pointwise {
    fn name(&self) -> &'static str {
        self.name
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        Ok(Evaluation::value(ctx.inputs[0].map(self.f)))
    }

    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let local = ctx.inputs[0].zip_map(ctx.output, self.name, self.df)?;
        Ok(vec![Some(local.hadamard(ctx.grad)?)])
    }
}

/// Elementwise binary map `y = f(a, b)` over same-shaped inputs, with partial
/// derivatives `da(a, b, y)` and `db(a, b, y)`.
pub(crate) struct Binary {
    pub name: &'static str,
    pub f: fn(Scalar, Scalar) -> Scalar,
    pub da: fn(Scalar, Scalar, Scalar) -> Scalar,
    pub db: fn(Scalar, Scalar, Scalar) -> Scalar,
}

impl fmt::Debug for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Binary({})", self.name)
    }
}

impl Operation for Binary {
    fn name(&self) -> &'static str {
        self.name
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        let value = ctx.inputs[0].zip_map(ctx.inputs[1], self.name, self.f)?;
        Ok(Evaluation::value(value))
    }

    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let (a, b, y, g) = (ctx.inputs[0], ctx.inputs[1], ctx.output, ctx.grad);
        let n = g.len();
        let mut grad_a = Vec::with_capacity(n);
        let mut grad_b = Vec::with_capacity(n);
        for i in 0..n {
            let (ai, bi, yi, gi) = (a.as_slice()[i], b.as_slice()[i], y.as_slice()[i], g.as_slice()[i]);
            grad_a.push(gi * (self.da)(ai, bi, yi));
            grad_b.push(gi * (self.db)(ai, bi, yi));
        }
        Ok(vec![
            Some(Matrix::new(a.rows(), a.cols(), grad_a)?),
            Some(Matrix::new(b.rows(), b.cols(), grad_b)?),
        ])
    }
}
