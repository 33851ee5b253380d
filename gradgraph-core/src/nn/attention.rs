//! Scaled dot-product and multi-head attention.
//!
//! Both are composites: the forward pass is wired from `product`, `transpose`,
//! `broadcast`, `mul`, `add`, `softmax`, `dropout`, `split` and `join` nodes, so no
//! attention-specific backward rule exists. The only dedicated node is the mask bias,
//! which does not propagate gradient.

use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::{Matrix, Scalar};
use log::debug;

/// Shape and regularisation of a multi-head attention block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttentionConfig {
    /// Model width `E`; queries, keys and values all have `E` columns.
    pub embed_size: usize,
    /// Number of heads `H`; each head sees `E / H` columns.
    pub num_heads: usize,
    /// Whether the four projections carry a bias row.
    pub bias: bool,
    /// Dropout rate applied to the attention weights, `0` to disable.
    pub dropout: Scalar,
}

impl AttentionConfig {
    pub fn new(embed_size: usize, num_heads: usize) -> Self {
        AttentionConfig {
            embed_size,
            num_heads,
            bias: true,
            dropout: 0.0,
        }
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_dropout(mut self, dropout: Scalar) -> Self {
        self.dropout = dropout;
        self
    }

    /// `D = E / H`.
    pub fn head_size(&self) -> usize {
        self.embed_size / self.num_heads.max(1)
    }

    pub fn validate(&self) -> Result<(), GradGraphError> {
        if self.embed_size == 0 || self.num_heads == 0 {
            return Err(GradGraphError::ConfigurationError(
                "attention: embed_size and num_heads must be positive".to_string(),
            ));
        }
        if self.embed_size % self.num_heads != 0 {
            return Err(GradGraphError::ConfigurationError(format!(
                "attention: embed_size {} is not divisible by {} heads",
                self.embed_size, self.num_heads
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(GradGraphError::ConfigurationError(format!(
                "attention: dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }
}

/// Handle of a multi-head attention block: the output and its projection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiHeadAttention {
    pub output: NodeId,
    pub wq: NodeId,
    pub wk: NodeId,
    pub wv: NodeId,
    pub wo: NodeId,
    pub bq: Option<NodeId>,
    pub bk: Option<NodeId>,
    pub bv: Option<NodeId>,
    pub bo: Option<NodeId>,
}

impl MultiHeadAttention {
    /// Projection weights followed by the biases that exist.
    pub fn parameters(&self) -> Vec<NodeId> {
        let mut params = vec![self.wq, self.wk, self.wv, self.wo];
        params.extend([self.bq, self.bk, self.bv, self.bo].into_iter().flatten());
        params
    }
}

// --- Mask bias ---

/// `q.rows x k.rows` additive bias: `0` where attending is allowed, `-inf` where
/// the mask holds a zero. Without a mask the bias is all zeros. Inputs: `q, k[, mask]`.
#[derive(Debug)]
struct MaskBias;

impl Operation for MaskBias {
    fn name(&self) -> &'static str {
        "attention_mask_bias"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        let shape = (ctx.inputs[0].rows(), ctx.inputs[1].rows());
        let bias = match ctx.inputs.get(2) {
            Some(mask) => {
                if mask.shape() != shape {
                    return Err(GradGraphError::shape(shape, mask.shape(), "attention_mask_bias"));
                }
                mask.map(|m| if m == 0.0 { Scalar::NEG_INFINITY } else { 0.0 })
            }
            None => Matrix::zeros(shape.0, shape.1),
        };
        Ok(Evaluation::value(bias))
    }

    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        Ok(vec![None; ctx.inputs.len()])
    }
}

impl Graph {
    /// Additive attention bias sized from `q` and `k` when the node is evaluated.
    pub fn new_attention_mask_bias(
        &mut self,
        q: NodeId,
        k: NodeId,
        mask: Option<NodeId>,
    ) -> Result<NodeId, GradGraphError> {
        match mask {
            Some(mask) => self.push_function(MaskBias, &[q, k, mask]),
            None => self.push_function(MaskBias, &[q, k]),
        }
    }

    /// `softmax(q kᵀ / sqrt(head_size) + bias) v`, with optional dropout on the
    /// attention weights.
    ///
    /// `q` is `L x D`, `k` and `v` are `S x D`; the result is `L x D`. A row whose
    /// mask is entirely zero has no finite score and evaluates to NaN.
    pub fn new_scaled_dot_product_attention(
        &mut self,
        q: NodeId,
        k: NodeId,
        v: NodeId,
        mask: Option<NodeId>,
        head_size: usize,
        dropout: Scalar,
    ) -> Result<NodeId, GradGraphError> {
        if head_size == 0 {
            return Err(GradGraphError::InvalidArgument(
                "scaled_dot_product_attention: head_size must be positive".to_string(),
            ));
        }
        let kt = self.new_transpose(k)?;
        let scores = self.new_product(q, kt)?;
        let factor = self.new_constant_with(Matrix::scalar(1.0 / (head_size as Scalar).sqrt()))?;
        let factor = self.new_broadcast(factor, scores)?;
        let scaled = self.new_mul(scores, factor)?;
        let bias = self.new_attention_mask_bias(q, k, mask)?;
        let biased = self.new_add(scaled, bias)?;
        let mut weights = self.new_softmax(biased)?;
        if dropout > 0.0 {
            weights = self.new_dropout(weights, dropout)?;
        }
        let attended = self.new_product(weights, v)?;
        self.new_composite(attended)
    }

    /// Multi-head attention over `q` (`target_size x E`) and `k`, `v`
    /// (`source_size x E`).
    ///
    /// The inputs are projected by `E x E` weights, split column-wise into `H` heads
    /// of width `E / H`, attended per head, re-joined and projected by `Wo`.
    ///
    /// The projections are registered as `MHA.Wq`, `MHA.Wk`, `MHA.Wv`, `MHA.Wo` and,
    /// with bias, `MHA.bq` .. `MHA.bo`. A later attention block in the same graph
    /// takes over these names.
    #[allow(clippy::too_many_arguments)]
    pub fn new_multi_head_attention(
        &mut self,
        q: NodeId,
        k: NodeId,
        v: NodeId,
        mask: Option<NodeId>,
        target_size: usize,
        source_size: usize,
        config: &AttentionConfig,
    ) -> Result<MultiHeadAttention, GradGraphError> {
        config.validate()?;
        if target_size == 0 || source_size == 0 {
            return Err(GradGraphError::InvalidArgument(
                "multi_head_attention: sequence sizes must be positive".to_string(),
            ));
        }
        let e = config.embed_size;
        let d = config.head_size();

        let wq = self.new_named_variable(e, e, "MHA.Wq")?;
        let wk = self.new_named_variable(e, e, "MHA.Wk")?;
        let wv = self.new_named_variable(e, e, "MHA.Wv")?;
        let wo = self.new_named_variable(e, e, "MHA.Wo")?;
        let mut zero_bias = |name: &str| -> Result<NodeId, GradGraphError> {
            let b = self.new_variable_with(Matrix::zeros(1, e))?;
            self.name(b, name)?;
            Ok(b)
        };
        let (bq, bk, bv, bo) = if config.bias {
            (
                Some(zero_bias("MHA.bq")?),
                Some(zero_bias("MHA.bk")?),
                Some(zero_bias("MHA.bv")?),
                Some(zero_bias("MHA.bo")?),
            )
        } else {
            (None, None, None, None)
        };

        let qp = self.new_affine(q, wq, bq)?;
        let kp = self.new_affine(k, wk, bk)?;
        let vp = self.new_affine(v, wv, bv)?;

        // heads are joined as transposed D x L blocks, stacking them row-major
        let mut joined: Option<NodeId> = None;
        for head in 0..config.num_heads {
            let qh = self.new_split(qp, 0, head * d, target_size, d)?;
            let kh = self.new_split(kp, 0, head * d, source_size, d)?;
            let vh = self.new_split(vp, 0, head * d, source_size, d)?;
            let attended = self.new_scaled_dot_product_attention(qh, kh, vh, mask, d, config.dropout)?;
            let block = self.new_transpose(attended)?;
            joined = Some(match joined {
                Some(acc) => self.new_join(acc, block, (head + 1) * d, target_size)?,
                None => block,
            });
        }
        let joined = joined.ok_or_else(|| {
            GradGraphError::InternalError("multi_head_attention built no heads".to_string())
        })?;
        let concatenated = self.new_transpose(joined)?;
        let projected = self.new_affine(concatenated, wo, bo)?;
        let output = self.new_composite(projected)?;
        debug!(
            "multi-head attention {}: {} heads of width {}, {} -> {} rows",
            output, config.num_heads, d, source_size, target_size
        );

        Ok(MultiHeadAttention {
            output,
            wq,
            wk,
            wv,
            wo,
            bq,
            bk,
            bv,
            bo,
        })
    }
}

#[cfg(test)]
#[path = "attention_test.rs"]
mod tests;
