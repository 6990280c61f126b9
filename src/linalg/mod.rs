//! Dense vectors and matrices of `f64`, with value semantics

mod matrix;
mod vector;

pub use matrix::*;
pub use vector::*;

/// Error structure for collections size mismatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Expected {expected} values, but got {got}!")]
pub struct SizeMismatch {
    pub expected: usize,
    pub got: usize,
}

/// Error structure for operands of incompatible shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DimensionMismatch {
    #[error("Vector dimensions differ. {0}")]
    Vector(SizeMismatch),
    /// Shapes are given as `(height, width)`.
    #[error("Expected {expected:?} matrix, but got {got:?}!")]
    Matrix {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("Inner dimensions of product differ: {left} columns against {right} rows!")]
    Inner { left: usize, right: usize },
}

impl DimensionMismatch {
    pub(crate) fn vector(expected: usize, got: usize) -> Self {
        DimensionMismatch::Vector(SizeMismatch { expected, got })
    }
}
