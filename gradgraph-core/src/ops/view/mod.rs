//! Structural operators: they move or replicate elements without arithmetic.

pub mod broadcast;
pub mod reshape;
pub mod split_join;
