//! Python FFI
use pyo3::prelude::*;

mod gen_macros;
pub mod perceptron;

pub use gen_macros::Consumed;

#[pymodule]
fn rpmlp(_py: Python, m: &PyModule) -> PyResult<()> {
    perceptron::construct_module(m)?;
    Ok(())
}

crate::Impl_to_PyErr!(for Consumed);
