pub mod net;
pub mod task;
pub mod trainer;

use pyo3::{prelude::*, wrap_pymodule};

use crate::linalg::{DimensionMismatch, Matrix, Vector};
use crate::Impl_to_PyErr;

#[pymodule]
fn perceptron(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<net::Net>()?;
    m.add_class::<trainer::Trainer>()?;
    m.add_class::<task::Task>()?;
    Ok(())
}

pub fn construct_module(m: &PyModule) -> PyResult<()> {
    m.add_wrapped(wrap_pymodule!(perceptron))?;
    Ok(())
}

/// Weights and biases as nested lists: `weights[i][row][column]`, `biases[i][row]`.
pub(super) type Parameters = (Vec<Vec<Vec<f64>>>, Vec<Vec<f64>>);

pub(super) fn parameters_from_py(
    weights: Vec<Vec<Vec<f64>>>,
    biases: Vec<Vec<f64>>,
) -> Result<(Vec<Matrix>, Vec<Vector>), DimensionMismatch> {
    let weights = weights
        .iter()
        .map(|rows| Matrix::from_rows(rows))
        .collect::<Result<_, _>>()?;
    Ok((weights, biases.into_iter().map(Vector::from).collect()))
}

pub(super) fn parameters_to_py(net: &crate::perceptron::Net) -> Parameters {
    let (weights, biases) = net.export();
    (
        weights
            .iter()
            .map(|m| (0..m.height()).map(|i| m.row(i).as_slice().to_vec()).collect())
            .collect(),
        biases.iter().map(|b| b.as_slice().to_vec()).collect(),
    )
}

Impl_to_PyErr!(for DimensionMismatch);
