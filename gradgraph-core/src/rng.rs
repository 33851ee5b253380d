//! # Random Source
//!
//! [`Rng`] is the seeded random source owned by every [`Graph`](crate::Graph). Stochastic
//! nodes (dropout, the Gaussian sampler) and variable initialisation draw from it, and
//! client code reaches it through [`Graph::random`](crate::Graph::random) for batch
//! shuffling. Seeding a graph with [`Graph::with_seed`](crate::Graph::with_seed) makes
//! every draw reproducible.

use crate::error::GradGraphError;
use crate::matrix::{Matrix, Scalar};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng as _, SeedableRng};
use rand_distr::Normal;

/// Seeded random number generator with the draws the engine needs.
#[derive(Debug, Clone)]
pub struct Rng {
    inner: StdRng,
}

impl Rng {
    /// Creates a generator seeded from system entropy.
    pub fn new() -> Self {
        Rng {
            inner: StdRng::from_entropy(),
        }
    }

    /// Creates a reproducible generator.
    pub fn seeded(seed: u64) -> Self {
        Rng {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw from `[low, high)`.
    pub fn uniform(&mut self, low: Scalar, high: Scalar) -> Scalar {
        if low >= high {
            return low;
        }
        self.inner.gen_range(low..high)
    }

    /// Gaussian draw. A zero (or negative) `std` returns `mean`.
    pub fn normal(&mut self, mean: Scalar, std: Scalar) -> Scalar {
        match Normal::new(mean, std) {
            Ok(dist) if std > 0.0 => dist.sample(&mut self.inner),
            _ => mean,
        }
    }

    /// Returns `true` with probability `p`.
    pub fn bernoulli(&mut self, p: Scalar) -> bool {
        self.inner.gen::<Scalar>() < p
    }

    pub fn uniform_matrix(&mut self, rows: usize, cols: usize, low: Scalar, high: Scalar) -> Matrix {
        Matrix::from_fn(rows, cols, |_, _| self.uniform(low, high))
    }

    pub fn normal_matrix(&mut self, rows: usize, cols: usize, mean: Scalar, std: Scalar) -> Matrix {
        Matrix::from_fn(rows, cols, |_, _| self.normal(mean, std))
    }

    /// Picks an index with probability proportional to its weight.
    ///
    /// Weights need not be normalized but must be non-negative with a positive sum.
    pub fn discrete_choice(&mut self, weights: &[Scalar]) -> Result<usize, GradGraphError> {
        let dist = WeightedIndex::new(weights).map_err(|e| {
            GradGraphError::InvalidArgument(format!("discrete_choice weights: {}", e))
        })?;
        Ok(dist.sample(&mut self.inner))
    }

    /// Random index in `[0, bound)`.
    pub fn index(&mut self, bound: usize) -> usize {
        self.inner.gen_range(0..bound.max(1))
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.inner);
    }

    /// Moves a uniformly random selection of `amount` elements into the first
    /// `amount` slots, leaving the rest of the slice in arbitrary order.
    ///
    /// Cheaper than a full shuffle when only a few samples are needed (e.g. picking
    /// a mini-batch out of a large index list).
    pub fn partial_shuffle<T>(&mut self, items: &mut [T], amount: usize) {
        let amount = amount.min(items.len());
        // rand leaves the chosen elements at the tail
        items.partial_shuffle(&mut self.inner, amount);
        items.rotate_right(amount);
    }
}

impl Default for Rng {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "rng_test.rs"]
mod tests;
