//! Multilayer perceptrons trained by backpropagation, with a choice of
//! gradient descent strategies.

pub mod linalg;
pub mod perceptron;

#[cfg(feature = "python")]
pub mod python_ffi;
