use pyo3::prelude::*;

use crate::perceptron::{Task as InnerTask, TaskError};
use crate::Impl_to_PyErr;

#[pyclass]
pub struct Task {
    pub(super) task: InnerTask,
}

#[pymethods]
impl Task {
    #[new]
    pub fn new(
        input_dimension: usize,
        output_dimension: usize,
        examples: Option<Vec<(Vec<f64>, Vec<f64>)>>,
    ) -> Result<Self, TaskError> {
        Ok(Self {
            task: InnerTask::from_pairs(input_dimension, output_dimension, examples.unwrap_or_default())?,
        })
    }

    pub fn add(&mut self, input: Vec<f64>, output: Vec<f64>) -> Result<(), TaskError> {
        self.task.add(input.into(), output.into())
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.task.input_dimension(), self.task.output_dimension())
    }

    pub fn len(&self) -> usize {
        self.task.len()
    }

    pub fn examples(&self) -> Vec<(Vec<f64>, Vec<f64>)> {
        self.task
            .iter()
            .map(|e| (e.input.as_slice().to_vec(), e.output.as_slice().to_vec()))
            .collect()
    }
}

Impl_to_PyErr!(for TaskError);
