use pyo3::prelude::*;

use super::net::{ConsumableNet, Net};
use super::task::Task;
use super::{parameters_to_py, Parameters};
use crate::perceptron::{TrainError, Trainer as InnerTrainer};
use crate::{Impl_to_PyErr, MakeConsumable};

MakeConsumable!(ConsumableTrainer, InnerTrainer, Trainer);

#[pyclass]
pub struct Trainer {
    pub(super) trainer: ConsumableTrainer,
}

#[pymethods]
impl Trainer {
    pub fn geometry(&self) -> PyResult<Vec<usize>> {
        Ok(self.trainer.get_ref()?.net_ref().geometry().to_vec())
    }

    pub fn export_net(&self) -> PyResult<Parameters> {
        Ok(parameters_to_py(self.trainer.get_ref()?.net_ref()))
    }

    /// Returns `(propagations, updates)`.
    pub fn statistics(&self) -> PyResult<(usize, usize)> {
        let statistics = self.trainer.get_ref()?.statistics();
        Ok((statistics.propagations, statistics.updates))
    }

    pub fn process(&mut self, inputs: Vec<f64>) -> PyResult<Vec<f64>> {
        let outputs = self.trainer.get_ref_mut()?.forward_propagate(&inputs.into())?;
        Ok(outputs.as_slice().to_vec())
    }

    pub fn online_train(&mut self, task: PyRef<Task>) -> PyResult<f64> {
        Ok(self.trainer.get_ref_mut()?.online_train(&task.task)?)
    }

    pub fn batch_train(&mut self, task: PyRef<Task>) -> PyResult<f64> {
        Ok(self.trainer.get_ref_mut()?.batch_train(&task.task)?)
    }

    pub fn teardown(&mut self) -> PyResult<Net> {
        Ok(Net {
            net: ConsumableNet::acquire(self.trainer.release()?.teardown()),
        })
    }
}

Impl_to_PyErr!(for TrainError);
