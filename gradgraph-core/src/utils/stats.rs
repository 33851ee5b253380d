use crate::error::GradGraphError;
use crate::matrix::{Matrix, Scalar};

/// Running state shared by the moving averages: the current estimate, created on
/// the first update with the shape of the first sample.
#[derive(Debug, Clone)]
struct Running {
    initial: Scalar,
    value: Option<Matrix>,
}

impl Running {
    fn new(initial: Scalar) -> Self {
        Running {
            initial,
            value: None,
        }
    }

    /// Moves the estimate toward `x` by `rate`.
    fn blend(&mut self, x: &Matrix, rate: Scalar, operation: &str) -> Result<(), GradGraphError> {
        let initial = self.initial;
        let value = self
            .value
            .get_or_insert_with(|| Matrix::filled(x.rows(), x.cols(), initial));
        value.ensure_same_shape(x, operation)?;
        for (v, &xi) in value.as_mut_slice().iter_mut().zip(x.as_slice()) {
            *v += rate * (xi - *v);
        }
        Ok(())
    }
}

/// Simple moving average over (approximately) the last `window` samples.
///
/// The first `window` samples are averaged exactly; later samples replace
/// `1/window` of the estimate each.
#[derive(Debug, Clone)]
pub struct Sma {
    running: Running,
    window: usize,
    count: usize,
}

impl Sma {
    pub fn new(initial: Scalar, window: usize) -> Self {
        Sma {
            running: Running::new(initial),
            window: window.max(1),
            count: 0,
        }
    }

    pub fn update(&mut self, x: &Matrix) -> Result<(), GradGraphError> {
        let count = (self.count + 1).min(self.window);
        self.running.blend(x, 1.0 / count as Scalar, "sma")?;
        self.count = count;
        Ok(())
    }

    /// Current average, `None` before the first sample.
    pub fn value(&self) -> Option<&Matrix> {
        self.running.value.as_ref()
    }
}

/// Exponential moving average: `avg = decay * avg + (1 - decay) * x`.
#[derive(Debug, Clone)]
pub struct Ema {
    running: Running,
    decay: Scalar,
}

impl Ema {
    pub fn new(initial: Scalar, decay: Scalar) -> Self {
        Ema {
            running: Running::new(initial),
            decay,
        }
    }

    pub fn update(&mut self, x: &Matrix) -> Result<(), GradGraphError> {
        self.running.blend(x, 1.0 - self.decay, "ema")
    }

    pub fn value(&self) -> Option<&Matrix> {
        self.running.value.as_ref()
    }
}

/// Weighted moving average over a window measured in accumulated weight.
#[derive(Debug, Clone)]
pub struct Wma {
    running: Running,
    window: Scalar,
    total: Scalar,
}

impl Wma {
    pub fn new(initial: Scalar, window: Scalar) -> Self {
        Wma {
            running: Running::new(initial),
            window,
            total: 0.0,
        }
    }

    /// Adds a sample with a positive `weight`; non-positive weights are ignored.
    pub fn update(&mut self, x: &Matrix, weight: Scalar) -> Result<(), GradGraphError> {
        if weight.is_nan() || weight <= 0.0 {
            return Ok(());
        }
        let total = (self.total + weight).min(self.window.max(weight));
        self.running.blend(x, weight / total, "wma")?;
        self.total = total;
        Ok(())
    }

    pub fn value(&self) -> Option<&Matrix> {
        self.running.value.as_ref()
    }
}

/// Discounted returns: `d[i] = r[i] + gamma * d[i + 1]`.
pub fn discount_reward(rewards: &[Scalar], gamma: Scalar) -> Vec<Scalar> {
    let mut discounted = vec![0.0; rewards.len()];
    let mut acc = 0.0;
    for (d, &r) in discounted.iter_mut().zip(rewards).rev() {
        acc = r + gamma * acc;
        *d = acc;
    }
    discounted
}

/// Cosine similarity of the row vector `a` (`1 x n`) with every row of `b`
/// (`k x n`), as a `1 x k` row. Rows with zero norm score `0`.
pub fn cosine_similarity(a: &Matrix, b: &Matrix) -> Result<Matrix, GradGraphError> {
    if a.rows() != 1 || a.cols() != b.cols() {
        return Err(GradGraphError::shape((1, b.cols()), a.shape(), "cosine_similarity"));
    }
    let norm = |v: &[Scalar]| v.iter().map(|x| x * x).sum::<Scalar>().sqrt();
    let a_norm = norm(a.as_slice());
    let scores = (0..b.rows())
        .map(|r| {
            let row = b.row(r);
            let denom = a_norm * norm(row);
            if denom == 0.0 {
                0.0
            } else {
                a.as_slice().iter().zip(row).map(|(x, y)| x * y).sum::<Scalar>() / denom
            }
        })
        .collect();
    Ok(Matrix::row_vector(scores))
}

#[cfg(test)]
#[path = "stats_test.rs"]
mod tests;
