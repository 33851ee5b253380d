use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::{Matrix, Scalar};
use crate::optim::{check_learning_rate, Optimizer};
use log::{debug, trace};
use std::collections::HashMap;

/// Hyperparameters of [`Adam`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamConfig {
    pub learning_rate: Scalar,
    pub beta1: Scalar,
    pub beta2: Scalar,
    pub epsilon: Scalar,
}

impl Default for AdamConfig {
    fn default() -> Self {
        AdamConfig {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl AdamConfig {
    pub fn new(learning_rate: Scalar) -> Self {
        AdamConfig {
            learning_rate,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), GradGraphError> {
        check_learning_rate(self.learning_rate)?;
        if !(0.0..1.0).contains(&self.beta1) {
            return Err(GradGraphError::ConfigurationError(
                "Beta1 must be in [0, 1)".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.beta2) {
            return Err(GradGraphError::ConfigurationError(
                "Beta2 must be in [0, 1)".to_string(),
            ));
        }
        if self.epsilon.is_nan() || self.epsilon <= 0.0 {
            return Err(GradGraphError::ConfigurationError(
                "Epsilon must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// First and second raw moment estimates of one variable.
#[derive(Debug, Clone)]
struct Moments {
    m: Matrix,
    v: Matrix,
}

/// Adam optimizer (Kingma & Ba, 2014).
///
/// Moments are created lazily the first time a variable is updated and keep the
/// variable's shape from then on. The step counter is global: it advances once per
/// successful [`update`](Optimizer::update) call. Every variable is checked before
/// anything is written, so a failed update leaves weights, moments and counter as
/// they were.
#[derive(Debug, Clone)]
pub struct Adam {
    variables: Vec<NodeId>,
    config: AdamConfig,
    iterations: u64,
    state: HashMap<NodeId, Moments>,
}

impl Adam {
    /// Adam with the default betas and epsilon.
    pub fn new(variables: Vec<NodeId>, learning_rate: Scalar) -> Result<Self, GradGraphError> {
        Self::with_config(variables, AdamConfig::new(learning_rate))
    }

    pub fn with_config(variables: Vec<NodeId>, config: AdamConfig) -> Result<Self, GradGraphError> {
        config.validate()?;
        Ok(Adam {
            variables,
            config,
            iterations: 0,
            state: HashMap::new(),
        })
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    /// Number of updates applied since creation or the last reset.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}

impl Optimizer for Adam {
    fn update(&mut self, graph: &mut Graph) -> Result<(), GradGraphError> {
        for &id in &self.variables {
            let (value, grad) = graph.parameter(id)?;
            if let Some(grad) = grad {
                value.ensure_same_shape(grad, "adam")?;
            }
            if let Some(moments) = self.state.get(&id) {
                moments.m.ensure_same_shape(value, "adam")?;
            }
        }

        self.iterations += 1;
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.config;
        let t = self.iterations.min(i32::MAX as u64) as i32;
        let bias_correction1 = 1.0 - beta1.powi(t);
        let bias_correction2 = 1.0 - beta2.powi(t);

        for &id in &self.variables {
            let (value, grad) = graph.parameter_mut(id)?;
            let grad = match grad {
                Some(grad) => grad,
                None => {
                    trace!("adam: {} has no gradient, skipped", id);
                    continue;
                }
            };

            let moments = self.state.entry(id).or_insert_with(|| {
                debug!("adam: new moments for {} {:?}", id, value.shape());
                Moments {
                    m: Matrix::zeros_like(value),
                    v: Matrix::zeros_like(value),
                }
            });

            let params = value.as_mut_slice().iter_mut();
            let m = moments.m.as_mut_slice().iter_mut();
            let v = moments.v.as_mut_slice().iter_mut();
            for (((p, m), v), &g) in params.zip(m).zip(v).zip(grad.as_slice()) {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                let m_hat = *m / bias_correction1;
                let v_hat = *v / bias_correction2;
                *p -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
            }
        }
        debug!(
            "adam: step {} over {} variables (lr {})",
            self.iterations,
            self.variables.len(),
            learning_rate
        );
        Ok(())
    }

    fn variables(&self) -> &[NodeId] {
        &self.variables
    }

    fn learning_rate(&self) -> Scalar {
        self.config.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: Scalar) -> Result<(), GradGraphError> {
        check_learning_rate(learning_rate)?;
        self.config.learning_rate = learning_rate;
        Ok(())
    }

    fn reset(&mut self) {
        self.iterations = 0;
        self.state.clear();
    }
}

#[cfg(test)]
#[path = "adam_test.rs"]
mod tests;
