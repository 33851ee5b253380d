use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::Scalar;
use crate::ops::Pointwise;
use std::f64::consts::{FRAC_2_SQRT_PI, FRAC_1_SQRT_2, PI};

/// The Gauss error function.
pub fn erf(x: Scalar) -> Scalar {
    libm::erf(x)
}

pub(crate) fn sigmoid(x: Scalar) -> Scalar {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

fn softplus(x: Scalar) -> Scalar {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

fn gelu(x: Scalar) -> Scalar {
    0.5 * x * (1.0 + erf(x * FRAC_1_SQRT_2))
}

fn gelu_derivative(x: Scalar) -> Scalar {
    let cdf = 0.5 * (1.0 + erf(x * FRAC_1_SQRT_2));
    let pdf = (-0.5 * x * x).exp() / (2.0 * PI).sqrt();
    cdf + x * pdf
}

impl Graph {
    /// Natural logarithm; `log(0) = -inf` propagates.
    pub fn new_log(&mut self, x: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Pointwise {
            name: "log",
            f: Scalar::ln,
            df: |x, _| 1.0 / x,
        };
        self.push_function(op, &[x])
    }

    pub fn new_tanh(&mut self, x: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Pointwise {
            name: "tanh",
            f: Scalar::tanh,
            df: |_, y| 1.0 - y * y,
        };
        self.push_function(op, &[x])
    }

    pub fn new_sigmoid(&mut self, x: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Pointwise {
            name: "sigmoid",
            f: sigmoid,
            df: |_, y| y * (1.0 - y),
        };
        self.push_function(op, &[x])
    }

    pub fn new_relu(&mut self, x: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Pointwise {
            name: "relu",
            f: |x| if x > 0.0 { x } else { 0.0 },
            df: |x, _| if x > 0.0 { 1.0 } else { 0.0 },
        };
        self.push_function(op, &[x])
    }

    /// Exact (erf-based) GELU: `x * Phi(x)`.
    pub fn new_gelu(&mut self, x: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Pointwise {
            name: "gelu",
            f: gelu,
            df: |x, _| gelu_derivative(x),
        };
        self.push_function(op, &[x])
    }

    pub fn new_erf(&mut self, x: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Pointwise {
            name: "erf",
            f: erf,
            df: |x, _| FRAC_2_SQRT_PI * (-x * x).exp(),
        };
        self.push_function(op, &[x])
    }

    /// `ln(1 + e^x)`, computed without overflow for large `|x|`.
    pub fn new_softplus(&mut self, x: NodeId) -> Result<NodeId, GradGraphError> {
        let op = Pointwise {
            name: "softplus",
            f: softplus,
            df: |x, _| sigmoid(x),
        };
        self.push_function(op, &[x])
    }
}

#[cfg(test)]
#[path = "elementwise_test.rs"]
mod tests;
