//! # Dense Matrix Values
//!
//! [`Matrix`] is the unit of data flowing through a [`Graph`](crate::Graph): a dense,
//! row-major 2-D buffer of [`Scalar`] elements. Scalars and vectors are represented
//! as `1x1`, `1xN` or `Nx1` matrices.
//!
//! Shape-checked operations return `Result`; the unchecked helpers (`map`, `scale`,
//! `transpose`, ...) cannot fail.

use crate::error::GradGraphError;
use approx::{AbsDiffEq, RelativeEq};
use num_traits::{Float, One, Zero};
use std::fmt;

/// The single floating-point element type of every value in the engine.
pub type Scalar = f64;

/// A dense row-major matrix.
#[derive(Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<Scalar>,
}

impl Matrix {
    /// Creates a matrix from row-major data.
    ///
    /// # Errors
    /// Returns `MatrixCreationError` if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<Scalar>) -> Result<Self, GradGraphError> {
        if data.len() != rows * cols {
            return Err(GradGraphError::MatrixCreationError {
                data_len: data.len(),
                shape: (rows, cols),
            });
        }
        Ok(Matrix { rows, cols, data })
    }

    pub fn filled(rows: usize, cols: usize, value: Scalar) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, Scalar::zero())
    }

    pub fn ones(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, Scalar::one())
    }

    pub fn zeros_like(other: &Matrix) -> Self {
        Self::zeros(other.rows, other.cols)
    }

    /// A `1x1` matrix.
    pub fn scalar(value: Scalar) -> Self {
        Self::filled(1, 1, value)
    }

    pub fn row_vector(data: Vec<Scalar>) -> Self {
        Matrix {
            rows: 1,
            cols: data.len(),
            data,
        }
    }

    pub fn column_vector(data: Vec<Scalar>) -> Self {
        Matrix {
            rows: data.len(),
            cols: 1,
            data,
        }
    }

    /// Builds a matrix from nested rows, e.g. `Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]])`.
    ///
    /// # Errors
    /// Returns `MatrixCreationError` when the rows have different lengths.
    pub fn from_rows<R: AsRef<[Scalar]>>(rows: &[R]) -> Result<Self, GradGraphError> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let data: Vec<Scalar> = rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect();
        Self::new(rows.len(), cols, data)
    }

    /// Builds a matrix by evaluating `f(row, col)` for every entry.
    pub fn from_fn<F: FnMut(usize, usize) -> Scalar>(rows: usize, cols: usize, mut f: F) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Matrix { rows, cols, data }
    }

    // --- Accessors ---

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element at `(row, col)`. Panics when out of bounds, like slice indexing.
    pub fn get(&self, row: usize, col: usize) -> Scalar {
        assert!(row < self.rows && col < self.cols, "matrix index out of bounds");
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: Scalar) {
        assert!(row < self.rows && col < self.cols, "matrix index out of bounds");
        self.data[row * self.cols + col] = value;
    }

    pub fn as_slice(&self) -> &[Scalar] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Scalar] {
        &mut self.data
    }

    pub fn to_vec(&self) -> Vec<Scalar> {
        self.data.clone()
    }

    pub fn into_vec(self) -> Vec<Scalar> {
        self.data
    }

    /// Borrowed view of one row.
    pub fn row(&self, row: usize) -> &[Scalar] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [Scalar] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    // --- Elementwise ---

    pub fn map<F: Fn(Scalar) -> Scalar>(&self, f: F) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Combines two same-shaped matrices entry by entry.
    pub fn zip_map<F: Fn(Scalar, Scalar) -> Scalar>(
        &self,
        other: &Matrix,
        operation: &str,
        f: F,
    ) -> Result<Matrix, GradGraphError> {
        self.ensure_same_shape(other, operation)?;
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix, GradGraphError> {
        self.zip_map(other, "add", |a, b| a + b)
    }

    pub fn sub(&self, other: &Matrix) -> Result<Matrix, GradGraphError> {
        self.zip_map(other, "sub", |a, b| a - b)
    }

    pub fn hadamard(&self, other: &Matrix) -> Result<Matrix, GradGraphError> {
        self.zip_map(other, "hadamard", |a, b| a * b)
    }

    pub fn scale(&self, factor: Scalar) -> Matrix {
        self.map(|v| v * factor)
    }

    /// In-place accumulation, the core of gradient summation.
    pub fn add_assign(&mut self, other: &Matrix) -> Result<(), GradGraphError> {
        self.ensure_same_shape(other, "add_assign")?;
        for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += b;
        }
        Ok(())
    }

    pub fn fill(&mut self, value: Scalar) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    // --- Reductions ---

    pub fn sum(&self) -> Scalar {
        self.data.iter().copied().sum()
    }

    pub fn mean(&self) -> Scalar {
        self.sum() / self.data.len() as Scalar
    }

    pub fn max(&self) -> Scalar {
        self.data.iter().copied().fold(Scalar::neg_infinity(), Scalar::max)
    }

    /// Sums every column, returning a `1 x cols` row vector.
    pub fn column_sums(&self) -> Matrix {
        let mut out = Matrix::zeros(1, self.cols);
        for r in 0..self.rows {
            for (acc, &v) in out.data.iter_mut().zip(self.row(r)) {
                *acc += v;
            }
        }
        out
    }

    /// Sums every row, returning a `rows x 1` column vector.
    pub fn row_sums(&self) -> Matrix {
        Matrix::column_vector((0..self.rows).map(|r| self.row(r).iter().sum()).collect())
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    // --- Linear algebra ---

    pub fn transpose(&self) -> Matrix {
        Matrix::from_fn(self.cols, self.rows, |r, c| self.get(c, r))
    }

    /// Matrix product `self * other`.
    pub fn matmul(&self, other: &Matrix) -> Result<Matrix, GradGraphError> {
        if self.cols != other.rows {
            return Err(GradGraphError::shape(
                (self.cols, other.cols),
                other.shape(),
                "matmul",
            ));
        }
        let mut out = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            let out_row = &mut out.data[i * other.cols..(i + 1) * other.cols];
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                for (o, &b) in out_row.iter_mut().zip(other.row(k)) {
                    *o += a * b;
                }
            }
        }
        Ok(out)
    }

    /// Reinterprets the row-major buffer with a new shape.
    pub fn reshape(&self, rows: usize, cols: usize) -> Result<Matrix, GradGraphError> {
        if rows * cols != self.len() {
            return Err(GradGraphError::shape((rows, cols), self.shape(), "reshape"));
        }
        Ok(Matrix {
            rows,
            cols,
            data: self.data.clone(),
        })
    }

    // --- Blocks ---

    /// Copies the `rows x cols` block starting at `(row, col)`.
    pub fn block(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Matrix, GradGraphError> {
        self.ensure_block(row, col, rows, cols, "block")?;
        Ok(Matrix::from_fn(rows, cols, |r, c| self.get(row + r, col + c)))
    }

    /// Overwrites the block at `(row, col)` with `block`.
    pub fn set_block(&mut self, row: usize, col: usize, block: &Matrix) -> Result<(), GradGraphError> {
        self.ensure_block(row, col, block.rows, block.cols, "set_block")?;
        for r in 0..block.rows {
            let start = (row + r) * self.cols + col;
            self.data[start..start + block.cols].copy_from_slice(block.row(r));
        }
        Ok(())
    }

    /// Adds `block` into the block at `(row, col)`.
    pub fn add_block(&mut self, row: usize, col: usize, block: &Matrix) -> Result<(), GradGraphError> {
        self.ensure_block(row, col, block.rows, block.cols, "add_block")?;
        for r in 0..block.rows {
            let start = (row + r) * self.cols + col;
            for (a, &b) in self.data[start..start + block.cols].iter_mut().zip(block.row(r)) {
                *a += b;
            }
        }
        Ok(())
    }

    // --- Checks ---

    pub(crate) fn ensure_same_shape(&self, other: &Matrix, operation: &str) -> Result<(), GradGraphError> {
        if self.shape() != other.shape() {
            return Err(GradGraphError::shape(self.shape(), other.shape(), operation));
        }
        Ok(())
    }

    fn ensure_block(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
        operation: &str,
    ) -> Result<(), GradGraphError> {
        if row + rows > self.rows {
            return Err(GradGraphError::IndexOutOfBounds {
                index: row + rows,
                bound: self.rows,
                operation: operation.to_string(),
            });
        }
        if col + cols > self.cols {
            return Err(GradGraphError::IndexOutOfBounds {
                index: col + cols,
                bound: self.cols,
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix({}x{}) [", self.rows, self.cols)?;
        for r in 0..self.rows {
            writeln!(f, "  {:?}", self.row(r))?;
        }
        write!(f, "]")
    }
}

impl AbsDiffEq for Matrix {
    type Epsilon = Scalar;

    fn default_epsilon() -> Scalar {
        Scalar::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Scalar) -> bool {
        self.shape() == other.shape()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a.abs_diff_eq(b, epsilon))
    }
}

impl RelativeEq for Matrix {
    fn default_max_relative() -> Scalar {
        Scalar::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: Scalar, max_relative: Scalar) -> bool {
        self.shape() == other.shape()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a.relative_eq(b, epsilon, max_relative))
    }
}

#[cfg(test)]
#[path = "matrix_test.rs"]
mod tests;
