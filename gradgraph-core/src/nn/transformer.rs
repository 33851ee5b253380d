//! Building blocks of a transformer encoder.

use crate::autograd::graph::check_dims;
use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::{Matrix, Scalar};
use crate::nn::attention::{AttentionConfig, MultiHeadAttention};
use crate::nn::layers::{Linear, Norm};

/// Sinusoidal position table: even columns `sin(pos * w)`, odd columns `cos(pos * w)`,
/// with `w = 10000^(-2i/emb)` for the column pair `i`.
pub fn positional_table(max_seq: usize, emb: usize) -> Matrix {
    Matrix::from_fn(max_seq, emb, |pos, col| {
        let pair = (col - col % 2) as Scalar;
        let angle = pos as Scalar * (-(pair * (10000.0 as Scalar).ln()) / emb as Scalar).exp();
        if col % 2 == 0 {
            angle.sin()
        } else {
            angle.cos()
        }
    })
}

/// Adds the first `x.rows` rows of a fixed table to `x`.
#[derive(Debug)]
struct PositionalEncoding {
    table: Matrix,
}

impl Operation for PositionalEncoding {
    fn name(&self) -> &'static str {
        "positional_encoding"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        let x = ctx.inputs[0];
        if x.rows() > self.table.rows() || x.cols() != self.table.cols() {
            return Err(GradGraphError::shape(self.table.shape(), x.shape(), "positional_encoding"));
        }
        let positions = self.table.block(0, 0, x.rows(), x.cols())?;
        Ok(Evaluation::value(x.add(&positions)?))
    }

    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        Ok(vec![Some(ctx.grad.clone())])
    }
}

/// Handle of a position-wise feed-forward block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedForward {
    pub output: NodeId,
    pub expand: Linear,
    pub contract: Linear,
}

/// Sizes of an encoder layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderConfig {
    pub seq_size: usize,
    pub embed_size: usize,
    pub num_heads: usize,
    pub ff_size: usize,
    pub dropout: Scalar,
}

impl EncoderConfig {
    pub fn new(seq_size: usize, embed_size: usize, num_heads: usize, ff_size: usize) -> Self {
        EncoderConfig {
            seq_size,
            embed_size,
            num_heads,
            ff_size,
            dropout: 0.0,
        }
    }

    pub fn with_dropout(mut self, dropout: Scalar) -> Self {
        self.dropout = dropout;
        self
    }

    fn attention(&self) -> AttentionConfig {
        AttentionConfig::new(self.embed_size, self.num_heads).with_dropout(self.dropout)
    }
}

/// Handle of an encoder layer and its sub-blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderLayer {
    pub output: NodeId,
    pub attention: MultiHeadAttention,
    pub attention_norm: Norm,
    pub feed_forward: FeedForward,
    pub output_norm: Norm,
}

impl EncoderLayer {
    /// Every trainable variable of the layer.
    pub fn parameters(&self) -> Vec<NodeId> {
        let mut params = self.attention.parameters();
        params.extend([self.attention_norm.gain, self.attention_norm.bias]);
        for linear in [self.feed_forward.expand, self.feed_forward.contract] {
            params.push(linear.weight);
            params.extend(linear.bias);
        }
        params.extend([self.output_norm.gain, self.output_norm.bias]);
        params
    }
}

impl Graph {
    /// Adds sinusoidal position information to the rows of `x` (`seq x emb`,
    /// `seq <= max_seq`). The gradient passes through unchanged.
    pub fn new_positional_encoding(
        &mut self,
        x: NodeId,
        max_seq: usize,
        emb: usize,
    ) -> Result<NodeId, GradGraphError> {
        check_dims(max_seq, emb, "new_positional_encoding")?;
        let table = positional_table(max_seq, emb);
        self.push_function(PositionalEncoding { table }, &[x])
    }

    /// `linear(emb -> ff) -> relu -> dropout -> linear(ff -> emb)`.
    pub fn new_feed_forward(
        &mut self,
        x: NodeId,
        emb: usize,
        ff: usize,
        dropout: Scalar,
    ) -> Result<FeedForward, GradGraphError> {
        let expand = self.new_linear(x, emb, ff, true)?;
        let mut hidden = self.new_relu(expand.output)?;
        if dropout > 0.0 {
            hidden = self.new_dropout(hidden, dropout)?;
        }
        let contract = self.new_linear(hidden, ff, emb, true)?;
        let output = self.new_composite(contract.output)?;
        Ok(FeedForward {
            output,
            expand,
            contract,
        })
    }

    /// Self-attention encoder layer over `x` (`seq x emb`):
    /// `n = norm(x + dropout(mha(x, x, x)))`, `y = norm(n + dropout(ff(n)))`.
    /// Both norms standardize the whole `seq x emb` block.
    pub fn new_encoder_layer(
        &mut self,
        x: NodeId,
        mask: Option<NodeId>,
        config: &EncoderConfig,
    ) -> Result<EncoderLayer, GradGraphError> {
        let seq = config.seq_size;
        let emb = config.embed_size;
        let attention = self.new_multi_head_attention(x, x, x, mask, seq, seq, &config.attention())?;
        let attended = self.new_residual(x, attention.output, config.dropout)?;
        let attention_norm = self.new_norm(attended, seq, emb)?;

        let feed_forward = self.new_feed_forward(attention_norm.output, emb, config.ff_size, config.dropout)?;
        let fed = self.new_residual(attention_norm.output, feed_forward.output, config.dropout)?;
        let output_norm = self.new_norm(fed, seq, emb)?;

        let output = self.new_composite(output_norm.output)?;
        Ok(EncoderLayer {
            output,
            attention,
            attention_norm,
            feed_forward,
            output_norm,
        })
    }

    fn new_residual(&mut self, x: NodeId, branch: NodeId, dropout: Scalar) -> Result<NodeId, GradGraphError> {
        let branch = if dropout > 0.0 {
            self.new_dropout(branch, dropout)?
        } else {
            branch
        };
        self.new_add(x, branch)
    }
}

#[cfg(test)]
#[path = "transformer_test.rs"]
mod tests;
