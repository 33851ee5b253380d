//! Numeric helpers that sit next to training loops: running averages of matrices,
//! discounted returns and cosine similarity.

pub mod stats;

pub use stats::{cosine_similarity, discount_reward, Ema, Sma, Wma};
