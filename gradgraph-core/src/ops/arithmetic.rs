//! Elementwise arithmetic. Both operands of a binary operator must have the same
//! shape; use [`Graph::new_broadcast`] first to combine a vector with a matrix.

use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::Scalar;
use crate::ops::{Binary, Pointwise};

fn one(_: Scalar, _: Scalar, _: Scalar) -> Scalar {
    1.0
}

fn sign(x: Scalar) -> Scalar {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl Graph {
    /// `a + b`.
    pub fn new_add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Binary {
            name: "add",
            f: |a, b| a + b,
            da: one,
            db: one,
        };
        self.push_function(op, &[a, b])
    }

    /// `a - b`.
    pub fn new_sub(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Binary {
            name: "sub",
            f: |a, b| a - b,
            da: one,
            db: |_, _, _| -1.0,
        };
        self.push_function(op, &[a, b])
    }

    /// Elementwise (Hadamard) product `a ∘ b`.
    pub fn new_mul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Binary {
            name: "mul",
            f: |a, b| a * b,
            da: |_, b, _| b,
            db: |a, _, _| a,
        };
        self.push_function(op, &[a, b])
    }

    /// Elementwise `a ^ b`. The derivative with respect to `b` is `a^b ln(a)`, which is
    /// NaN for non-positive bases.
    pub fn new_power(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Binary {
            name: "power",
            f: Scalar::powf,
            da: |a, b, _| b * a.powf(b - 1.0),
            db: |a, _, y| y * a.ln(),
        };
        self.push_function(op, &[a, b])
    }

    /// Elementwise minimum. On ties the gradient goes to `a`.
    pub fn new_min(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Binary {
            name: "min",
            f: |a, b| if a <= b { a } else { b },
            da: |a, b, _| if a <= b { 1.0 } else { 0.0 },
            db: |a, b, _| if a <= b { 0.0 } else { 1.0 },
        };
        self.push_function(op, &[a, b])
    }

    /// Elementwise maximum. On ties the gradient goes to `a`.
    pub fn new_max(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Binary {
            name: "max",
            f: |a, b| if a >= b { a } else { b },
            da: |a, b, _| if a >= b { 1.0 } else { 0.0 },
            db: |a, b, _| if a >= b { 0.0 } else { 1.0 },
        };
        self.push_function(op, &[a, b])
    }

    pub fn new_neg(&mut self, x: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Pointwise {
            name: "neg",
            f: |x| -x,
            df: |_, _| -1.0,
        };
        self.push_function(op, &[x])
    }

    /// Elementwise `|x|`; the derivative at zero is taken as zero.
    pub fn new_abs(&mut self, x: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Pointwise {
            name: "abs",
            f: Scalar::abs,
            df: |x, _| sign(x),
        };
        self.push_function(op, &[x])
    }
}

#[cfg(test)]
#[path = "arithmetic_test.rs"]
mod tests;
