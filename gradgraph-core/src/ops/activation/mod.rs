//! Activation functions: elementwise non-linearities, the softmax family and dropout.

pub mod dropout;
pub mod elementwise;
pub mod softmax;

pub use elementwise::erf;
