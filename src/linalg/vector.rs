use std::{fmt, ops};

use super::DimensionMismatch;

/// Real vector of fixed dimension.
///
/// All arithmetic returns a new vector; the only way to change a vector in place
/// is indexed assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    components: Box<[f64]>,
}

impl Vector {
    /// Returns vector of given dimension filled with zeros.
    pub fn zeros(dimension: usize) -> Vector {
        Vector::filled(dimension, 0.0)
    }

    /// Returns vector of given dimension with every component set to `value`.
    pub fn filled(dimension: usize, value: f64) -> Vector {
        Vector {
            components: vec![value; dimension].into_boxed_slice(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.components.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.components
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.components
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.components.iter()
    }

    fn check_dimension(&self, other: &Vector) -> Result<(), DimensionMismatch> {
        if self.dimension() != other.dimension() {
            return Err(DimensionMismatch::vector(
                self.dimension(),
                other.dimension(),
            ));
        }
        Ok(())
    }

    /// Combines two vectors of equal dimension component by component.
    fn zip_with(
        &self,
        other: &Vector,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Vector, DimensionMismatch> {
        self.check_dimension(other)?;
        Ok(self
            .iter()
            .zip(other.iter())
            .map(|(&a, &b)| f(a, b))
            .collect())
    }

    /// Component-wise sum.
    ///
    /// # Returns
    /// * `Ok(Vector)` if `self` and `other` have the same dimension;
    /// * `Err(DimensionMismatch)` otherwise.
    pub fn checked_add(&self, other: &Vector) -> Result<Vector, DimensionMismatch> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Component-wise difference `self - other`.
    pub fn checked_sub(&self, other: &Vector) -> Result<Vector, DimensionMismatch> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Hadamard (Schur) product, i.e. the component-wise product.
    ///
    /// # Examples
    /// ```
    /// # use rpmlp::linalg::Vector;
    /// let a = Vector::from(vec![1.0, 2.0, 3.0]);
    /// let b = Vector::from(vec![4.0, 0.5, -1.0]);
    /// assert_eq!(a.hadamard(&b).unwrap(), Vector::from(vec![4.0, 1.0, -3.0]));
    /// ```
    pub fn hadamard(&self, other: &Vector) -> Result<Vector, DimensionMismatch> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Scalar (dot) product.
    pub fn dot(&self, other: &Vector) -> Result<f64, DimensionMismatch> {
        self.check_dimension(other)?;
        Ok(self.iter().zip(other.iter()).map(|(a, b)| a * b).sum())
    }

    pub fn scale(&self, factor: f64) -> Vector {
        self.map(|x| factor * x)
    }

    /// Adds `value` to every component.
    pub fn add_to_all(&self, value: f64) -> Vector {
        self.map(|x| x + value)
    }

    /// Applies `f` on every component.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Vector {
        self.iter().map(|&x| f(x)).collect()
    }

    pub fn component_sum(&self) -> f64 {
        self.iter().sum()
    }

    pub fn squared_component_sum(&self) -> f64 {
        self.iter().map(|x| x * x).sum()
    }

    /// Euclidean length.
    pub fn length(&self) -> f64 {
        self.squared_component_sum().sqrt()
    }
}

impl From<Vec<f64>> for Vector {
    fn from(components: Vec<f64>) -> Self {
        Vector {
            components: components.into_boxed_slice(),
        }
    }
}

impl From<&[f64]> for Vector {
    fn from(components: &[f64]) -> Self {
        Vector::from(components.to_vec())
    }
}

impl std::iter::FromIterator<f64> for Vector {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Vector::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl ops::Index<usize> for Vector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.components[index]
    }
}

impl ops::IndexMut<usize> for Vector {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.components[index]
    }
}

impl<'a> IntoIterator for &'a Vector {
    type Item = &'a f64;
    type IntoIter = std::slice::Iter<'a, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Prints the vector as a row vector: `(  0.000,  1.000)`.
impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (i, x) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{:7.3}", x)?;
        }
        write!(f, ")")
    }
}
