use pyo3::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

use super::task::Task;
use super::trainer::{ConsumableTrainer, Trainer};
use super::{parameters_from_py, parameters_to_py, Parameters};
use crate::perceptron::{
    ConfigError, ConstantRate, Elastic, Manhattan, Momentum, Net as InnerNet, NewNetError,
    ProcessError, QuickProp, Strategy,
};
use crate::{Impl_to_PyErr, MakeConsumable};

MakeConsumable!(ConsumableNet, InnerNet, Net);

#[pyclass]
pub struct Net {
    pub(super) net: ConsumableNet,
}

impl Net {
    /// Builds trainer on a copy first, so the net is consumed only on success.
    fn build_trainer(&mut self, weight_decay: f64, strategy: Strategy) -> PyResult<Trainer> {
        let trainer = self.net.get_ref()?.clone().build_trainer(weight_decay, strategy)?;
        self.net.release()?;
        Ok(Trainer {
            trainer: ConsumableTrainer::acquire(trainer),
        })
    }
}

#[pymethods]
impl Net {
    #[new]
    pub fn new(weights: Vec<Vec<Vec<f64>>>, biases: Vec<Vec<f64>>) -> PyResult<Self> {
        let (weights, biases) = parameters_from_py(weights, biases)?;
        Ok(Self {
            net: ConsumableNet::acquire(InnerNet::from_parameters(weights, biases)?),
        })
    }

    #[staticmethod]
    pub fn random(
        geometry: Vec<usize>,
        lower_bound: f64,
        higher_bound: f64,
        seed: Option<u64>,
    ) -> Result<Self, NewNetError> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            net: ConsumableNet::acquire(InnerNet::random(
                &geometry,
                lower_bound,
                higher_bound,
                &mut rng,
            )?),
        })
    }

    pub fn geometry(&self) -> PyResult<Vec<usize>> {
        Ok(self.net.get_ref()?.geometry().to_vec())
    }

    pub fn export(&self) -> PyResult<Parameters> {
        Ok(parameters_to_py(self.net.get_ref()?))
    }

    pub fn process(&self, inputs: Vec<f64>) -> PyResult<Vec<f64>> {
        let outputs = self.net.get_ref()?.process(&inputs.into())?;
        Ok(outputs.as_slice().to_vec())
    }

    pub fn total_error(&self, task: PyRef<Task>) -> PyResult<f64> {
        Ok(self.net.get_ref()?.total_error(&task.task)?)
    }

    pub fn sensitivity(&self, input_index: usize, task: PyRef<Task>) -> PyResult<f64> {
        Ok(self.net.get_ref()?.sensitivity(input_index, &task.task)?)
    }

    pub fn build_constant_rate_trainer(
        &mut self,
        weight_decay: f64,
        learn_rate: f64,
        flat_spot: f64,
    ) -> PyResult<Trainer> {
        let strategy = ConstantRate {
            learn_rate,
            flat_spot,
        };
        self.build_trainer(weight_decay, strategy.into())
    }

    pub fn build_momentum_trainer(
        &mut self,
        weight_decay: f64,
        learn_rate: f64,
        flat_spot: f64,
        momentum: f64,
    ) -> PyResult<Trainer> {
        let strategy = Momentum {
            learn_rate,
            flat_spot,
            momentum,
        };
        self.build_trainer(weight_decay, strategy.into())
    }

    pub fn build_manhattan_trainer(&mut self, weight_decay: f64, step_range: f64) -> PyResult<Trainer> {
        self.build_trainer(weight_decay, Manhattan { step_range }.into())
    }

    pub fn build_elastic_trainer(
        &mut self,
        weight_decay: f64,
        starting_step_range: f64,
        shrink_factor: f64,
        growth_factor: f64,
        min_step_range: f64,
        max_step_range: f64,
    ) -> PyResult<Trainer> {
        let strategy = Elastic {
            starting_step_range,
            shrink_factor,
            growth_factor,
            min_step_range,
            max_step_range,
        };
        self.build_trainer(weight_decay, strategy.into())
    }

    pub fn build_quick_prop_trainer(
        &mut self,
        weight_decay: f64,
        starting_step_range: f64,
        max_step_range: f64,
        learn_rate: f64,
    ) -> PyResult<Trainer> {
        let strategy = QuickProp {
            starting_step_range,
            max_step_range,
            learn_rate,
        };
        self.build_trainer(weight_decay, strategy.into())
    }

    #[staticmethod]
    pub fn calc_cost(outputs: Vec<f64>, desired_outputs: Vec<f64>) -> PyResult<f64> {
        Ok(InnerNet::calc_cost(&outputs.into(), &desired_outputs.into())?)
    }
}

Impl_to_PyErr!(for NewNetError, ProcessError, ConfigError);
