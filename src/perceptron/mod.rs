//! Multilayer perceptron with logistic activations, trained by backpropagation
//!
//! `Net` holds the coefficients and does forward propagation, `Trainer` owns a `Net`
//! together with gradient accumulators and the state of the chosen `Strategy`.

mod net;
mod report;
mod strategy;
mod task;
mod trainer;

pub use net::*;
pub use report::*;
pub use strategy::*;
pub use task::*;
pub use trainer::*;
