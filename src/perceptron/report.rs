//! Console reports on a network and a task.
//!
//! Reports compute everything on construction, so printing can't fail.

use std::fmt;

use super::net::{Net, ProcessError};
use super::task::Task;
use crate::linalg::{Matrix, Vector};

pub const DIVIDING_LINE: &str = "-----------------------------------------------";

/// Net outputs for every example of a task, next to the desired ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsReport {
    /// `(input, output, desired output)` per example.
    rows: Vec<(Vector, Vector, Vector)>,
    total_error: f64,
}

impl ResultsReport {
    pub fn new(net: &Net, task: &Task) -> Result<ResultsReport, ProcessError> {
        let mut rows = Vec::with_capacity(task.len());
        let mut total_error = 0.0;
        for example in task {
            let output = net.process(&example.input)?;
            total_error += Net::calc_cost(&output, &example.output)?;
            rows.push((example.input.clone(), output, example.output.clone()));
        }
        Ok(ResultsReport { rows, total_error })
    }

    pub fn total_error(&self) -> f64 {
        self.total_error
    }
}

impl fmt::Display for ResultsReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Neural network outputs for given learning task")?;
        for (input, output, desired) in &self.rows {
            writeln!(f, "{}", DIVIDING_LINE)?;
            writeln!(f, "Input:\n{}", input)?;
            writeln!(f, "\nOutput:\n{}", output)?;
            writeln!(f, "\nDesired output:\n{}", desired)?;
        }
        writeln!(f, "{}", DIVIDING_LINE)?;
        write!(
            f,
            "Total error over all learning examples:\n{:.10}",
            self.total_error
        )
    }
}

/// Weights and biases of every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkReport {
    layer_count: usize,
    weights: Vec<Matrix>,
    biases: Vec<Vector>,
}

impl NetworkReport {
    pub fn new(net: &Net) -> NetworkReport {
        let (weights, biases) = net.export();
        NetworkReport {
            layer_count: net.layer_count(),
            weights,
            biases,
        }
    }

    fn layer_name(&self, layer: usize) -> String {
        if layer == 0 {
            "input-layer".to_string()
        } else if layer + 1 == self.layer_count {
            "output-layer".to_string()
        } else {
            format!("hidden-layer {}", layer)
        }
    }
}

impl fmt::Display for NetworkReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Current neural network state\n{}", DIVIDING_LINE)?;
        for (i, (weights, biases)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            if i > 0 {
                write!(f, "\n{}", DIVIDING_LINE)?;
            }
            let (from, to) = (self.layer_name(i), self.layer_name(i + 1));
            write!(f, "\nWeights between {} and {}:\n\n{}\n", from, to, weights)?;
            write!(f, "\n{}\n{} bias:\n\n{}\n", DIVIDING_LINE, capitalized(&to), biases)?;
        }
        Ok(())
    }
}

fn capitalized(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Sensitivity of the net to every input neuron, see `Net::sensitivity`.
#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityReport {
    sensitivities: Vec<f64>,
}

impl SensitivityReport {
    pub fn new(net: &Net, task: &Task) -> Result<SensitivityReport, ProcessError> {
        Ok(SensitivityReport {
            sensitivities: net.sensitivities(task)?,
        })
    }

    pub fn sensitivities(&self) -> &[f64] {
        &self.sensitivities
    }
}

impl fmt::Display for SensitivityReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Input neuron sensitivities\n{}", DIVIDING_LINE)?;
        for s in &self.sensitivities {
            write!(f, "\n{}", s)?;
        }
        Ok(())
    }
}
