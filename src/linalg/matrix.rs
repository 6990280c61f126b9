use std::{fmt, ops};

use super::{DimensionMismatch, Vector};

/// Real matrix of fixed height and width.
///
/// Components are stored row after row:
/// `components = [row_0][row_1] ... [row_(height-1)]`
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    height: usize,
    width: usize,
    components: Box<[f64]>,
}

impl Matrix {
    /// Returns `height`x`width` matrix filled with zeros.
    pub fn zeros(height: usize, width: usize) -> Matrix {
        Matrix::filled(height, width, 0.0)
    }

    pub fn filled(height: usize, width: usize, value: f64) -> Matrix {
        Matrix {
            height,
            width,
            components: vec![value; height * width].into_boxed_slice(),
        }
    }

    /// Square identity matrix.
    pub fn identity(size: usize) -> Matrix {
        let mut matrix = Matrix::zeros(size, size);
        for i in 0..size {
            matrix[(i, i)] = 1.0;
        }
        matrix
    }

    /// Builds matrix from its components, given row after row.
    ///
    /// # Returns
    /// * `Ok(Matrix)` if `width` divides the number of components;
    /// * `Err(DimensionMismatch)` otherwise.
    ///
    /// # Examples
    /// ```
    /// # use rpmlp::linalg::Matrix;
    /// let m = Matrix::from_components(2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    /// assert_eq!(m.shape(), (3, 2));
    /// assert_eq!(m[(2, 0)], 5.0);
    /// ```
    pub fn from_components(width: usize, components: Vec<f64>) -> Result<Matrix, DimensionMismatch> {
        if width == 0 || components.len() % width != 0 {
            let height = if width == 0 { 0 } else { components.len() / width + 1 };
            return Err(DimensionMismatch::Matrix {
                expected: (height, width),
                got: (1, components.len()),
            });
        }
        Ok(Matrix {
            height: components.len() / width,
            width,
            components: components.into_boxed_slice(),
        })
    }

    /// Builds matrix from row vectors, which all must have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Matrix, DimensionMismatch> {
        let width = rows.first().map_or(0, Vec::len);
        let mut components = Vec::with_capacity(rows.len() * width);
        for row in rows {
            if row.len() != width {
                return Err(DimensionMismatch::vector(width, row.len()));
            }
            components.extend_from_slice(row);
        }
        Ok(Matrix {
            height: rows.len(),
            width,
            components: components.into_boxed_slice(),
        })
    }

    /// Outer product `column ⊗ row`, a `column.dimension()`x`row.dimension()` matrix.
    pub fn outer(column: &Vector, row: &Vector) -> Matrix {
        let mut components = Vec::with_capacity(column.dimension() * row.dimension());
        for &c in column {
            components.extend(row.iter().map(|&r| c * r));
        }
        Matrix {
            height: column.dimension(),
            width: row.dimension(),
            components: components.into_boxed_slice(),
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// `(height, width)`
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn is_square(&self) -> bool {
        self.height == self.width
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.components
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.components
    }

    /// Returns copy of `i`-th row.
    pub fn row(&self, i: usize) -> Vector {
        Vector::from(&self.components[i * self.width..(i + 1) * self.width])
    }

    /// Overwrites `i`-th row with the given vector.
    pub fn set_row(&mut self, i: usize, row: &Vector) -> Result<(), DimensionMismatch> {
        if row.dimension() != self.width {
            return Err(DimensionMismatch::vector(self.width, row.dimension()));
        }
        self.components[i * self.width..(i + 1) * self.width].copy_from_slice(row.as_slice());
        Ok(())
    }

    /// Returns copy of `j`-th column.
    pub fn column(&self, j: usize) -> Vector {
        assert!(j < self.width, "column {} out of range for width {}", j, self.width);
        (0..self.height).map(|i| self[(i, j)]).collect()
    }

    pub fn transpose(&self) -> Matrix {
        let mut transposed = Matrix::zeros(self.width, self.height);
        for i in 0..self.height {
            for j in 0..self.width {
                transposed[(j, i)] = self[(i, j)];
            }
        }
        transposed
    }

    fn check_shape(&self, other: &Matrix) -> Result<(), DimensionMismatch> {
        if self.shape() != other.shape() {
            return Err(DimensionMismatch::Matrix {
                expected: self.shape(),
                got: other.shape(),
            });
        }
        Ok(())
    }

    fn zip_with(
        &self,
        other: &Matrix,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Matrix, DimensionMismatch> {
        self.check_shape(other)?;
        Ok(Matrix {
            height: self.height,
            width: self.width,
            components: self
                .components
                .iter()
                .zip(other.components.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    pub fn checked_add(&self, other: &Matrix) -> Result<Matrix, DimensionMismatch> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn checked_sub(&self, other: &Matrix) -> Result<Matrix, DimensionMismatch> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Component-wise (Hadamard) product.
    pub fn hadamard(&self, other: &Matrix) -> Result<Matrix, DimensionMismatch> {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        self.map(|x| factor * x)
    }

    /// Applies `f` on every component.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Matrix {
        Matrix {
            height: self.height,
            width: self.width,
            components: self.components.iter().map(|&x| f(x)).collect(),
        }
    }

    /// Matrix product `self · other`.
    ///
    /// # Returns
    /// * `Ok(Matrix)` of shape `self.height()`x`other.width()` if
    /// `self.width()` = `other.height()`;
    /// * `Err(DimensionMismatch)` otherwise.
    pub fn mul_matrix(&self, other: &Matrix) -> Result<Matrix, DimensionMismatch> {
        if self.width != other.height {
            return Err(DimensionMismatch::Inner {
                left: self.width,
                right: other.height,
            });
        }
        let mut product = Matrix::zeros(self.height, other.width);
        for i in 0..self.height {
            for k in 0..self.width {
                let a = self[(i, k)];
                for j in 0..other.width {
                    product[(i, j)] += a * other[(k, j)];
                }
            }
        }
        Ok(product)
    }

    /// Matrix-vector product `self · vector`.
    pub fn mul_vector(&self, vector: &Vector) -> Result<Vector, DimensionMismatch> {
        if self.width != vector.dimension() {
            return Err(DimensionMismatch::Inner {
                left: self.width,
                right: vector.dimension(),
            });
        }
        Ok((0..self.height)
            .map(|i| {
                self.components[i * self.width..(i + 1) * self.width]
                    .iter()
                    .zip(vector.iter())
                    .map(|(a, b)| a * b)
                    .sum::<f64>()
            })
            .collect())
    }
}

impl ops::Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        assert!(j < self.width, "column {} out of range for width {}", j, self.width);
        &self.components[i * self.width + j]
    }
}

impl ops::IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        assert!(j < self.width, "column {} out of range for width {}", j, self.width);
        &mut self.components[i * self.width + j]
    }
}

impl Matrix {
    fn fmt_row(&self, f: &mut fmt::Formatter, i: usize) -> fmt::Result {
        for j in 0..self.width {
            if j > 0 {
                write!(f, ",")?;
            }
            write!(f, "{:7.3}", self[(i, j)])?;
        }
        Ok(())
    }
}

/// Prints the matrix as a bracketed block:
/// ```text
/// /  1.000,  0.000\
/// \  0.000,  1.000/
/// ```
impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.height {
            0 => write!(f, "()"),
            1 => {
                write!(f, "(")?;
                self.fmt_row(f, 0)?;
                write!(f, ")")
            }
            height => {
                write!(f, "/")?;
                self.fmt_row(f, 0)?;
                writeln!(f, "\\")?;
                for i in 1..height - 1 {
                    write!(f, "|")?;
                    self.fmt_row(f, i)?;
                    writeln!(f, "|")?;
                }
                write!(f, "\\")?;
                self.fmt_row(f, height - 1)?;
                write!(f, "/")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> Matrix {
        Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap()
    }

    #[test]
    fn transpose_swaps_indices() {
        let m = sample();
        let t = m.transpose();
        assert_eq!(t.shape(), (3, 2));
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(m[(i, j)], t[(j, i)]);
            }
        }
        assert_eq!(t.transpose(), m);
    }

    #[test]
    fn matrix_vector_product() {
        let v = Vector::from(vec![1.0, 0.0, -1.0]);
        assert_eq!(sample().mul_vector(&v).unwrap(), Vector::from(vec![-2.0, -2.0]));
    }

    #[test]
    fn matrix_matrix_product() {
        let m = sample();
        let product = m.mul_matrix(&m.transpose()).unwrap();
        assert_eq!(product, Matrix::from_rows(&[vec![14.0, 32.0], vec![32.0, 77.0]]).unwrap());
        assert_eq!(Matrix::identity(2).mul_matrix(&m).unwrap(), m);
    }

    #[test]
    fn incompatible_products_are_rejected() {
        let m = sample();
        assert_eq!(
            m.mul_matrix(&m),
            Err(DimensionMismatch::Inner { left: 3, right: 2 })
        );
        assert_eq!(
            m.mul_vector(&Vector::zeros(2)),
            Err(DimensionMismatch::Inner { left: 3, right: 2 })
        );
        assert_eq!(
            m.checked_add(&Matrix::zeros(3, 2)),
            Err(DimensionMismatch::Matrix {
                expected: (2, 3),
                got: (3, 2)
            })
        );
    }

    #[test]
    fn outer_product() {
        let column = Vector::from(vec![1.0, 2.0]);
        let row = Vector::from(vec![3.0, 4.0, 5.0]);
        let outer = Matrix::outer(&column, &row);
        assert_eq!(outer.shape(), (2, 3));
        assert_relative_eq!(outer[(1, 2)], 10.0);
        assert_eq!(outer.row(0), row);
    }

    #[test]
    fn rows_and_columns() {
        let mut m = sample();
        assert_eq!(m.column(1), Vector::from(vec![2.0, 5.0]));
        m.set_row(0, &Vector::from(vec![7.0, 8.0, 9.0])).unwrap();
        assert_eq!(m.row(0), Vector::from(vec![7.0, 8.0, 9.0]));
        assert!(m.set_row(1, &Vector::zeros(2)).is_err());
    }

    #[test]
    fn elementwise_operations() {
        let m = sample();
        assert_eq!(m.checked_sub(&m).unwrap(), Matrix::zeros(2, 3));
        assert_eq!(m.checked_add(&m).unwrap(), m.scale(2.0));
        assert_eq!(m.hadamard(&m).unwrap(), m.map(|x| x * x));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(Matrix::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(Matrix::from_components(4, vec![1.0; 6]).is_err());
    }

    #[test]
    fn displays_as_block() {
        let text = Matrix::identity(2).to_string();
        assert_eq!(text, "/  1.000,  0.000\\\n\\  0.000,  1.000/");
    }
}
