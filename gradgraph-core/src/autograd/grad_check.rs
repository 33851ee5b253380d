//! # Numerical Gradient Oracle
//!
//! Central-difference derivatives used to cross-check every analytic backward rule.
//! Each difference costs two forward evaluations of the whole terminal, so these helpers
//! belong in tests, never inside a training loop.

use crate::autograd::graph::Graph;
use crate::autograd::node::NodeId;
use crate::error::GradGraphError;
use crate::matrix::{Matrix, Scalar};
use log::debug;
use thiserror::Error;

/// Perturbation used by [`Graph::dfdx`] and friends.
pub const DEFAULT_STEP: Scalar = 1e-6;

/// Error type specifically for gradient checking failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error("Gradient check failed for input {input_index}, element {element_index}: analytical {analytical:?} != numerical {numerical:?} (difference {difference:?})")]
    GradientMismatch {
        input_index: usize,
        element_index: usize,
        analytical: Scalar,
        numerical: Scalar,
        difference: Scalar,
    },

    #[error("Backward pass execution failed during gradient check: {0}")]
    BackwardPassError(GradGraphError),

    #[error("Graph error during gradient check: {0}")]
    GraphError(GradGraphError),
}

impl From<GradGraphError> for GradCheckError {
    fn from(err: GradGraphError) -> Self {
        GradCheckError::GraphError(err)
    }
}

/// Tolerances for [`check_gradients`].
///
/// An analytic value `a` matches a numerical value `n` when
/// `|a - n| <= atol + rtol * max(|a|, |n|)`. Identical infinities always match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradCheckConfig {
    pub step: Scalar,
    pub rtol: Scalar,
    pub atol: Scalar,
}

impl Default for GradCheckConfig {
    /// Tolerance for layers and composite sub-graphs.
    fn default() -> Self {
        GradCheckConfig {
            step: DEFAULT_STEP,
            rtol: 1e-2,
            atol: 1e-6,
        }
    }
}

impl GradCheckConfig {
    /// # Errors
    /// `ConfigurationError` unless all three values are positive and finite.
    pub fn new(step: Scalar, rtol: Scalar, atol: Scalar) -> Result<Self, GradGraphError> {
        let config = GradCheckConfig { step, rtol, atol };
        config.validate()?;
        Ok(config)
    }

    /// Tighter tolerance for smooth elementwise operators.
    pub fn elementwise() -> Self {
        GradCheckConfig {
            rtol: 1e-3,
            ..Self::default()
        }
    }

    pub fn with_rtol(mut self, rtol: Scalar) -> Self {
        self.rtol = rtol;
        self
    }

    pub fn with_atol(mut self, atol: Scalar) -> Self {
        self.atol = atol;
        self
    }

    pub fn validate(&self) -> Result<(), GradGraphError> {
        for (name, value) in [("step", self.step), ("rtol", self.rtol), ("atol", self.atol)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(GradGraphError::ConfigurationError(format!(
                    "gradient check {} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub fn accepts(&self, analytical: Scalar, numerical: Scalar) -> bool {
        if analytical == numerical || (analytical.is_nan() && numerical.is_nan()) {
            return true;
        }
        let difference = (analytical - numerical).abs();
        difference <= self.atol + self.rtol * analytical.abs().max(numerical.abs())
    }
}

impl Graph {
    /// Numerical gradient of `sum(F)` with respect to the leaf `x`, where `F` is the
    /// value of `terminal`. Same shape as `x`.
    pub fn dfdx(&mut self, terminal: NodeId, x: NodeId) -> Result<Matrix, GradGraphError> {
        let (rows, cols) = self.forward(terminal)?.shape();
        self.dfdx_seeded(terminal, x, &Matrix::ones(rows, cols))
    }

    /// Numerical gradient of `sum(seed ∘ F)` with respect to the leaf `x`.
    pub fn dfdx_seeded(
        &mut self,
        terminal: NodeId,
        x: NodeId,
        seed: &Matrix,
    ) -> Result<Matrix, GradGraphError> {
        self.dfdx_with_step(terminal, x, seed, DEFAULT_STEP)
    }

    /// A single Jacobian entry: `dF[f_row, f_col] / dx[x_row, x_col]`.
    pub fn dfdx_entry(
        &mut self,
        terminal: NodeId,
        x: NodeId,
        f_row: usize,
        f_col: usize,
        x_row: usize,
        x_col: usize,
    ) -> Result<Scalar, GradGraphError> {
        let (rows, cols) = self.forward(terminal)?.shape();
        ensure_index(f_row, rows, "dfdx_entry")?;
        ensure_index(f_col, cols, "dfdx_entry")?;
        let (x_rows, x_cols) = self.value(x)?.shape();
        ensure_index(x_row, x_rows, "dfdx_entry")?;
        ensure_index(x_col, x_cols, "dfdx_entry")?;

        let mut seed = Matrix::zeros(rows, cols);
        seed.set(f_row, f_col, 1.0);
        self.with_frozen_noise(terminal, x, |g| {
            g.central_difference(terminal, x, x_row, x_col, &seed, DEFAULT_STEP)
        })
    }

    pub(crate) fn dfdx_with_step(
        &mut self,
        terminal: NodeId,
        x: NodeId,
        seed: &Matrix,
        step: Scalar,
    ) -> Result<Matrix, GradGraphError> {
        let shape = self.forward(terminal)?.shape();
        if seed.shape() != shape {
            return Err(GradGraphError::shape(shape, seed.shape(), "dfdx"));
        }
        let (rows, cols) = self.value(x)?.shape();
        self.with_frozen_noise(terminal, x, |g| {
            let mut grad = Matrix::zeros(rows, cols);
            for r in 0..rows {
                for c in 0..cols {
                    grad.set(r, c, g.central_difference(terminal, x, r, c, seed, step)?);
                }
            }
            Ok(grad)
        })
    }

    /// Runs `run` with stochastic nodes pinned to their current noise, then puts
    /// `x` back and re-evaluates `terminal` so the cache matches the original state.
    fn with_frozen_noise<T, F>(&mut self, terminal: NodeId, x: NodeId, run: F) -> Result<T, GradGraphError>
    where
        F: FnOnce(&mut Graph) -> Result<T, GradGraphError>,
    {
        let original = self.value(x)?.clone();
        self.hold_noise(true);
        let result = run(self);
        let restored = self.restore(terminal, x, original);
        self.hold_noise(false);
        let value = result?;
        restored?;
        Ok(value)
    }

    fn restore(&mut self, terminal: NodeId, x: NodeId, original: Matrix) -> Result<(), GradGraphError> {
        *self.value_mut(x)? = original;
        self.recache();
        self.forward(terminal)?;
        Ok(())
    }

    fn central_difference(
        &mut self,
        terminal: NodeId,
        x: NodeId,
        row: usize,
        col: usize,
        seed: &Matrix,
        step: Scalar,
    ) -> Result<Scalar, GradGraphError> {
        let base = self.value(x)?.get(row, col);

        self.value_mut(x)?.set(row, col, base + step);
        self.recache();
        let plus = weighted_sum(self.forward(terminal)?, seed);

        self.value_mut(x)?.set(row, col, base - step);
        self.recache();
        let minus = weighted_sum(self.forward(terminal)?, seed);

        self.value_mut(x)?.set(row, col, base);
        Ok((plus - minus) / (2.0 * step))
    }
}

fn weighted_sum(value: &Matrix, seed: &Matrix) -> Scalar {
    value
        .as_slice()
        .iter()
        .zip(seed.as_slice())
        .filter(|(_, s)| **s != 0.0)
        .map(|(&v, &s)| v * s)
        .sum()
}

fn ensure_index(index: usize, bound: usize, operation: &str) -> Result<(), GradGraphError> {
    if index >= bound {
        return Err(GradGraphError::IndexOutOfBounds {
            index,
            bound,
            operation: operation.to_string(),
        });
    }
    Ok(())
}

/// Compares the analytic gradients of `wrt` against the numerical oracle.
///
/// Clears all gradients, back-propagates `seed` (ones when `None`) from `terminal`,
/// then checks every element of every listed leaf.
pub fn check_gradients(
    graph: &mut Graph,
    terminal: NodeId,
    wrt: &[NodeId],
    seed: Option<&Matrix>,
    config: &GradCheckConfig,
) -> Result<(), GradCheckError> {
    config.validate()?;
    let (rows, cols) = graph.forward(terminal)?.shape();
    let seed = seed.cloned().unwrap_or_else(|| Matrix::ones(rows, cols));

    graph.zero_grad();
    graph
        .backward(terminal, &seed)
        .map_err(GradCheckError::BackwardPassError)?;

    for (input_index, &x) in wrt.iter().enumerate() {
        let analytical = graph.gradient(x)?;
        let numerical = graph.dfdx_with_step(terminal, x, &seed, config.step)?;
        for (element_index, (&a, &n)) in analytical
            .as_slice()
            .iter()
            .zip(numerical.as_slice())
            .enumerate()
        {
            if !config.accepts(a, n) {
                return Err(GradCheckError::GradientMismatch {
                    input_index,
                    element_index,
                    analytical: a,
                    numerical: n,
                    difference: (a - n).abs(),
                });
            }
        }
    }
    debug!(
        "gradient check passed for {} inputs of node {}",
        wrt.len(),
        terminal
    );
    Ok(())
}

#[cfg(test)]
#[path = "grad_check_test.rs"]
mod tests;
