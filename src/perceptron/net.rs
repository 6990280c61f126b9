use rand::{distributions::Uniform, prelude::Distribution, Rng};
use std::mem;

use super::strategy::{ConfigError, Strategy};
use super::task::Task;
use super::trainer::Trainer;
use crate::linalg::{DimensionMismatch, Matrix, SizeMismatch, Vector};

/// Weights and biases of one transition between two neighbouring layers.
///
/// The same shape is reused for everything that is kept per coefficient:
/// gradients, previous gradients and step ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct Coeffs {
    /// `next layer size` x `previous layer size`
    pub weights: Matrix,
    /// One bias per neuron of the next layer.
    pub biases: Vector,
}

impl Coeffs {
    pub fn new(weights: Matrix, biases: Vector) -> Coeffs {
        Coeffs { weights, biases }
    }

    /// Coefficients of the same shape, all set to `value`.
    pub fn filled_like(&self, value: f64) -> Coeffs {
        Coeffs {
            weights: Matrix::filled(self.weights.height(), self.weights.width(), value),
            biases: Vector::filled(self.biases.dimension(), value),
        }
    }

    pub fn zeros_like(&self) -> Coeffs {
        self.filled_like(0.0)
    }

    pub fn scale(&self, factor: f64) -> Coeffs {
        Coeffs {
            weights: self.weights.scale(factor),
            biases: self.biases.scale(factor),
        }
    }

    /// Iterates over all weights, then all biases.
    pub fn values(&self) -> impl Iterator<Item = &f64> {
        self.weights
            .as_slice()
            .iter()
            .chain(self.biases.as_slice().iter())
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.weights
            .as_mut_slice()
            .iter_mut()
            .chain(self.biases.as_mut_slice().iter_mut())
    }
}

/// Outputs of every layer for one input, produced by `Net::forward_propagate`.
///
/// Backpropagation consumes the trace, so it can only ever run on the outputs of
/// a forward pass that actually happened.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationTrace {
    /// `outputs[0]` is the input itself, the last one is the net output.
    outputs: Box<[Vector]>,

    /// `Net::generation` of the net that produced the trace.
    generation: u64,
}

impl ActivationTrace {
    pub fn input(&self) -> &Vector {
        &self.outputs[0]
    }

    pub fn output(&self) -> &Vector {
        &self.outputs[self.outputs.len() - 1]
    }

    pub fn layers(&self) -> &[Vector] {
        &self.outputs
    }

    pub fn into_output(self) -> Vector {
        self.outputs.into_vec().pop().unwrap_or_else(|| Vector::zeros(0))
    }

    pub(super) fn geometry(&self) -> Vec<usize> {
        self.outputs.iter().map(Vector::dimension).collect()
    }

    pub(super) fn generation(&self) -> u64 {
        self.generation
    }
}

/// Neural network structure
#[derive(Debug, Clone)]
pub struct Net {
    /// The number of neurons in each layer.
    pub(super) geometry: Box<[usize]>,

    /// Coefficients of every transition, `transitions[i]` connects layer `i` to layer `i + 1`.
    pub(super) transitions: Box<[Coeffs]>,

    /// Number of weight updates applied to the net, traces of older coefficients are stale.
    pub(super) generation: u64,
}

/// Nets are equal when their coefficients are, however they were trained.
impl PartialEq for Net {
    fn eq(&self, other: &Net) -> bool {
        self.geometry == other.geometry && self.transitions == other.transitions
    }
}

impl Net {
    /// Returns network for given geometry.
    /// Every weight and bias is drawn uniformly from `[lower_bound, higher_bound]`.
    ///
    /// # Arguments
    /// * `geometry` - a number slice that holds a desired number of neurons in each layer;
    /// * `lower_bound`, `higher_bound` - range of starting coefficients;
    /// * `rng` - random numbers source.
    ///
    /// # Returns
    /// * `Ok(Net)` if geometry has at least two non-empty layers and bounds are ordered;
    /// * `Err(NewNetError)` otherwise.
    ///
    /// # Examples
    /// ```
    /// # use rpmlp::perceptron::Net;
    /// use rand::{rngs::StdRng, SeedableRng};
    ///
    /// let mut rng = StdRng::seed_from_u64(7);
    /// let net = Net::random(&[10, 20, 20, 3], -1.0, 1.0, &mut rng).unwrap();
    /// assert_eq!(net.layer_count(), 4);
    /// ```
    pub fn random<R: Rng + ?Sized>(
        geometry: &[usize],
        lower_bound: f64,
        higher_bound: f64,
        rng: &mut R,
    ) -> Result<Net, NewNetError> {
        if geometry.len() < 2 {
            return Err(NewNetError::BadGeometry(geometry.len()));
        }
        if let Some(layer) = geometry.iter().position(|&size| size < 1) {
            return Err(NewNetError::EmptyLayer(layer));
        }
        // The sampler also needs the width of the range to be finite
        if !(higher_bound - lower_bound).is_finite() || lower_bound > higher_bound {
            return Err(NewNetError::BadBounds {
                lower: lower_bound,
                higher: higher_bound,
            });
        }

        let coeffs_between = Uniform::new_inclusive(lower_bound, higher_bound);
        let mut transitions = Vec::with_capacity(geometry.len() - 1);

        for layers in geometry.windows(2) {
            let (old_layer_size, layer_size) = (layers[0], layers[1]);
            let mut weights = Matrix::zeros(layer_size, old_layer_size);
            for (w, c) in weights
                .as_mut_slice()
                .iter_mut()
                .zip(coeffs_between.sample_iter(&mut *rng))
            {
                *w = c;
            }
            let biases: Vector = coeffs_between
                .sample_iter(&mut *rng)
                .take(layer_size)
                .collect();
            transitions.push(Coeffs::new(weights, biases));
        }

        Net::from_transitions(transitions)
    }

    /// Returns network with the given starting weights and biases.
    ///
    /// `weights[i]` must be `size(layer i+1)` x `size(layer i)`, and `biases[i]`
    /// must have `size(layer i+1)` components.
    ///
    /// # Examples
    /// ```
    /// # use rpmlp::perceptron::Net;
    /// # use rpmlp::linalg::{Matrix, Vector};
    /// let net = Net::from_parameters(vec![Matrix::identity(2)], vec![Vector::zeros(2)]).unwrap();
    /// assert_eq!(net.geometry(), &[2, 2]);
    /// ```
    pub fn from_parameters(weights: Vec<Matrix>, biases: Vec<Vector>) -> Result<Net, NewNetError> {
        if weights.len() != biases.len() {
            return Err(NewNetError::CountMismatch {
                weights: weights.len(),
                biases: biases.len(),
            });
        }
        Net::from_transitions(
            weights
                .into_iter()
                .zip(biases.into_iter())
                .map(|(w, b)| Coeffs::new(w, b))
                .collect(),
        )
    }

    /// Returns network built from per-transition coefficients, checking that they chain.
    pub fn from_transitions(transitions: Vec<Coeffs>) -> Result<Net, NewNetError> {
        let first = transitions.first().ok_or(NewNetError::BadGeometry(1))?;

        let mut geometry = Vec::with_capacity(transitions.len() + 1);
        geometry.push(first.weights.width());

        for (i, coeffs) in transitions.iter().enumerate() {
            let old_layer_size = geometry[i];
            if coeffs.weights.width() != old_layer_size {
                return Err(NewNetError::BadCoefficients {
                    transition: i,
                    mismatch: DimensionMismatch::Matrix {
                        expected: (coeffs.weights.height(), old_layer_size),
                        got: coeffs.weights.shape(),
                    },
                });
            }
            if coeffs.biases.dimension() != coeffs.weights.height() {
                return Err(NewNetError::BadCoefficients {
                    transition: i,
                    mismatch: DimensionMismatch::vector(
                        coeffs.weights.height(),
                        coeffs.biases.dimension(),
                    ),
                });
            }
            geometry.push(coeffs.weights.height());
        }

        if let Some(layer) = geometry.iter().position(|&size| size < 1) {
            return Err(NewNetError::EmptyLayer(layer));
        }

        Ok(Net {
            geometry: geometry.into_boxed_slice(),
            transitions: transitions.into_boxed_slice(),
            generation: 0,
        })
    }

    pub fn geometry(&self) -> &[usize] {
        &self.geometry
    }

    /// Number of layers, input and output layers included.
    pub fn layer_count(&self) -> usize {
        self.geometry.len()
    }

    pub fn input_dimension(&self) -> usize {
        self.geometry[0]
    }

    pub fn output_dimension(&self) -> usize {
        self.geometry[self.geometry.len() - 1]
    }

    pub fn transitions(&self) -> &[Coeffs] {
        &self.transitions
    }

    /// Weights between layer `i` and layer `i + 1`.
    pub fn weights(&self, i: usize) -> &Matrix {
        &self.transitions[i].weights
    }

    /// Biases of layer `i + 1`.
    pub fn biases(&self, i: usize) -> &Vector {
        &self.transitions[i].biases
    }

    /// Exports weights and biases from network.
    ///
    /// # Returns
    /// `(weights, biases)`, one entry per transition.
    pub fn export(&self) -> (Vec<Matrix>, Vec<Vector>) {
        self.transitions
            .iter()
            .map(|c| (c.weights.clone(), c.biases.clone()))
            .unzip()
    }

    /// Sigmoid function.
    /// Implements the formula:
    /// `1 / (1 + exp(-x))`.
    pub fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    /// Sigmoid derivative for a whole layer, expressed in terms of its outputs,
    /// raised by `flat_spot`.
    /// Implements the formula:
    /// `o - o∘o + flat_spot`.
    pub(super) fn output_derivative(output: &Vector, flat_spot: f64) -> Result<Vector, DimensionMismatch> {
        Ok(output
            .checked_sub(&output.hadamard(output)?)?
            .add_to_all(flat_spot))
    }

    /// Propagates the given input through the network.
    ///
    /// Each layer computes `sigmoid(weights · previous outputs - biases)`.
    ///
    /// # Returns
    /// * `Ok(ActivationTrace)` with the outputs of every layer, if `input` has the size of input layer;
    /// * `Err(ProcessError)` otherwise.
    pub fn forward_propagate(&self, input: &Vector) -> Result<ActivationTrace, ProcessError> {
        if input.dimension() != self.input_dimension() {
            return Err(ProcessError::BadInputs(SizeMismatch {
                expected: self.input_dimension(),
                got: input.dimension(),
            }));
        }

        let mut outputs = Vec::with_capacity(self.geometry.len());
        let mut activations = input.clone();
        for coeffs in self.transitions.iter() {
            let next = coeffs
                .weights
                .mul_vector(&activations)?
                .checked_sub(&coeffs.biases)?
                .map(Net::sigmoid);
            outputs.push(mem::replace(&mut activations, next));
        }
        outputs.push(activations);

        Ok(ActivationTrace {
            outputs: outputs.into_boxed_slice(),
            generation: self.generation,
        })
    }

    /// Calculates output of the network using given input.
    ///
    /// # Examples
    /// ```
    /// # use rpmlp::perceptron::Net;
    /// # use rpmlp::linalg::{Matrix, Vector};
    /// let net = Net::from_parameters(vec![Matrix::identity(2)], vec![Vector::zeros(2)]).unwrap();
    /// let outputs = net.process(&Vector::from(vec![0.0, 0.0])).unwrap();
    /// assert_eq!(outputs, Vector::from(vec![0.5, 0.5]));
    /// ```
    pub fn process(&self, input: &Vector) -> Result<Vector, ProcessError> {
        Ok(self.forward_propagate(input)?.into_output())
    }

    /// Calculates cost function of an output values given the desired values.
    /// Implements the formula:
    /// `||desired outputs - outputs||²`
    ///
    /// # Examples
    /// ```
    /// # use rpmlp::perceptron::Net;
    /// # use rpmlp::linalg::Vector;
    /// let outputs = Vector::filled(1000, 10.0);
    /// let desired_outputs = Vector::filled(1000, 10.25);
    /// let cost = Net::calc_cost(&outputs, &desired_outputs).unwrap();
    /// assert_eq!(cost, 62.5);
    /// ```
    pub fn calc_cost(outputs: &Vector, desired_outputs: &Vector) -> Result<f64, DimensionMismatch> {
        Ok(desired_outputs.checked_sub(outputs)?.squared_component_sum())
    }

    fn check_task(&self, task: &Task, check_outputs: bool) -> Result<(), ProcessError> {
        if task.input_dimension() != self.input_dimension()
            || (check_outputs && task.output_dimension() != self.output_dimension())
        {
            return Err(ProcessError::IncompatibleTask {
                expected: (self.input_dimension(), self.output_dimension()),
                got: (task.input_dimension(), task.output_dimension()),
            });
        }
        Ok(())
    }

    /// Total squared error over all examples of the task.
    pub fn total_error(&self, task: &Task) -> Result<f64, ProcessError> {
        self.check_task(task, true)?;
        let mut total = 0.0;
        for example in task {
            total += Net::calc_cost(&self.process(&example.input)?, &example.output)?;
        }
        Ok(total)
    }

    /// Average, over all examples of the task, of the derivative of the summed
    /// outputs with respect to input neuron `input_index`.
    ///
    /// # Returns
    /// * `Ok(f64)` if `input_index` names an input neuron and the task is non-empty
    /// and fits the input layer;
    /// * `Err(ProcessError)` otherwise.
    pub fn sensitivity(&self, input_index: usize, task: &Task) -> Result<f64, ProcessError> {
        if input_index >= self.input_dimension() {
            return Err(ProcessError::BadInputIndex {
                index: input_index,
                inputs: self.input_dimension(),
            });
        }
        self.check_task(task, false)?;
        if task.is_empty() {
            return Err(ProcessError::EmptyTask);
        }

        let mut total = 0.0;
        for example in task {
            total += self.example_sensitivity(input_index, &example.input)?;
        }
        Ok(total / task.len() as f64)
    }

    /// Sensitivities of every input neuron, in order.
    pub fn sensitivities(&self, task: &Task) -> Result<Vec<f64>, ProcessError> {
        (0..self.input_dimension())
            .map(|i| self.sensitivity(i, task))
            .collect()
    }

    fn example_sensitivity(&self, input_index: usize, input: &Vector) -> Result<f64, ProcessError> {
        let trace = self.forward_propagate(input)?;
        let layers = trace.layers();

        // Chain rule through the first transition: only column `input_index` is involved
        let mut sensitivities = Net::output_derivative(&layers[1], 0.0)?
            .hadamard(&self.transitions[0].weights.column(input_index))?;
        for (coeffs, output) in self.transitions[1..].iter().zip(layers[2..].iter()) {
            sensitivities = Net::output_derivative(output, 0.0)?
                .hadamard(&coeffs.weights.mul_vector(&sensitivities)?)?;
        }
        Ok(sensitivities.component_sum())
    }

    /// Consumes `Net` and builds `Trainer` object containing it.
    /// See `Trainer`'s documentation for details.
    ///
    /// # Arguments
    /// * `weight_decay` - fraction of every weight and bias taken away after each update, from `[0, 1)`;
    /// * `strategy` - weight-update strategy and its hyperparameters.
    pub fn build_trainer(
        self,
        weight_decay: f64,
        strategy: impl Into<Strategy>,
    ) -> Result<Trainer, ConfigError> {
        Trainer::build(self, weight_decay, strategy.into())
    }
}

/// Error structure for `Net` construction
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NewNetError {
    #[error("Net must have at least two layers (input and output), but got geometry with len {0}!")]
    BadGeometry(usize),
    #[error("Each layer must have at least one neuron, but layer {0} has none!")]
    EmptyLayer(usize),
    #[error("Expected lower <= higher bounds of finite range, but got [{lower}, {higher}]!")]
    BadBounds { lower: f64, higher: f64 },
    #[error("Got {weights} weight matrices, but {biases} bias vectors!")]
    CountMismatch { weights: usize, biases: usize },
    #[error("Coefficients of transition {transition} don't fit the network. {mismatch}")]
    BadCoefficients {
        transition: usize,
        mismatch: DimensionMismatch,
    },
}

/// Error structure for `Net::forward_propagate` and the methods built on it
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProcessError {
    #[error("Bad inputs. {0}")]
    BadInputs(SizeMismatch),
    #[error("Input neuron {index} doesn't exist, net has {inputs} input(s)!")]
    BadInputIndex { index: usize, inputs: usize },
    #[error("Task of dimensions {got:?} doesn't fit net of dimensions {expected:?}!")]
    IncompatibleTask {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("Task must contain at least one example!")]
    EmptyTask,
    #[error(transparent)]
    Shape(#[from] DimensionMismatch),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn identity_net() -> Net {
        Net::from_parameters(vec![Matrix::identity(2)], vec![Vector::zeros(2)]).unwrap()
    }

    #[test]
    fn identity_layer_applies_only_sigmoid() {
        let outputs = identity_net()
            .process(&Vector::from(vec![0.5, -0.5]))
            .unwrap();
        assert_relative_eq!(outputs[0], Net::sigmoid(0.5));
        assert_relative_eq!(outputs[1], Net::sigmoid(-0.5));
    }

    #[test]
    fn biases_are_subtracted() {
        let net = Net::from_parameters(
            vec![Matrix::from_rows(&[vec![1.0]]).unwrap()],
            vec![Vector::from(vec![2.0])],
        )
        .unwrap();
        let output = net.process(&Vector::from(vec![0.5])).unwrap();
        assert_relative_eq!(output[0], Net::sigmoid(0.5 - 2.0));
    }

    #[test]
    fn trace_holds_every_layer() {
        let mut rng = StdRng::seed_from_u64(1);
        let net = Net::random(&[3, 4, 2], -1.0, 1.0, &mut rng).unwrap();
        let input = Vector::from(vec![0.1, 0.2, 0.3]);
        let trace = net.forward_propagate(&input).unwrap();

        let dims: Vec<usize> = trace.layers().iter().map(Vector::dimension).collect();
        assert_eq!(dims, vec![3, 4, 2]);
        assert_eq!(trace.input(), &input);
        assert_eq!(trace.output(), &net.process(&input).unwrap());
    }

    #[test]
    fn bad_geometry_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            Net::random(&[3], -1.0, 1.0, &mut rng),
            Err(NewNetError::BadGeometry(1))
        );
        assert_eq!(
            Net::random(&[3, 0, 1], -1.0, 1.0, &mut rng),
            Err(NewNetError::EmptyLayer(1))
        );
        assert_eq!(
            Net::random(&[3, 1], 1.0, -1.0, &mut rng),
            Err(NewNetError::BadBounds {
                lower: 1.0,
                higher: -1.0
            })
        );
    }

    #[test]
    fn unbounded_ranges_are_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            Net::random(&[1, 1], -1e308, 1e308, &mut rng),
            Err(NewNetError::BadBounds {
                lower: -1e308,
                higher: 1e308
            })
        );
        assert!(Net::random(&[1, 1], f64::NEG_INFINITY, 0.0, &mut rng).is_err());
        assert!(Net::random(&[1, 1], 0.0, f64::NAN, &mut rng).is_err());
        assert!(Net::random(&[1, 1], 0.5, 0.5, &mut rng).is_ok());
    }

    #[test]
    fn random_coefficients_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let net = Net::random(&[4, 5, 3], -0.25, 0.5, &mut rng).unwrap();
        for coeffs in net.transitions() {
            assert!(coeffs.values().all(|&c| (-0.25..=0.5).contains(&c)));
        }
    }

    #[test]
    fn same_seed_gives_same_net() {
        let a = Net::random(&[2, 3, 1], -1.0, 1.0, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = Net::random(&[2, 3, 1], -1.0, 1.0, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn non_chaining_parameters_are_rejected() {
        let result = Net::from_parameters(
            vec![Matrix::zeros(3, 2), Matrix::zeros(1, 2)],
            vec![Vector::zeros(3), Vector::zeros(1)],
        );
        assert!(matches!(
            result,
            Err(NewNetError::BadCoefficients { transition: 1, .. })
        ));

        let result = Net::from_parameters(vec![Matrix::zeros(3, 2)], vec![Vector::zeros(2)]);
        assert!(matches!(
            result,
            Err(NewNetError::BadCoefficients { transition: 0, .. })
        ));

        assert_eq!(
            Net::from_parameters(vec![Matrix::zeros(1, 1)], vec![]),
            Err(NewNetError::CountMismatch {
                weights: 1,
                biases: 0
            })
        );
    }

    #[test]
    fn wrong_input_size_is_rejected() {
        assert_eq!(
            identity_net().process(&Vector::zeros(3)),
            Err(ProcessError::BadInputs(SizeMismatch {
                expected: 2,
                got: 3
            }))
        );
    }

    #[test]
    fn single_layer_sensitivity_matches_derivative() {
        let net = Net::from_parameters(
            vec![Matrix::from_rows(&[vec![2.0, -1.0]]).unwrap()],
            vec![Vector::zeros(1)],
        )
        .unwrap();
        let task = Task::from_pairs(2, 1, vec![(vec![0.0, 0.0], vec![1.0])]).unwrap();

        // At zero input the sigmoid sits at 0.5, where its derivative is 0.25
        assert_relative_eq!(net.sensitivity(0, &task).unwrap(), 0.5);
        assert_relative_eq!(net.sensitivity(1, &task).unwrap(), -0.25);
        assert_eq!(net.sensitivities(&task).unwrap().len(), 2);
    }

    #[test]
    fn sensitivity_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(11);
        let net = Net::random(&[2, 3, 2], -1.0, 1.0, &mut rng).unwrap();
        let input = vec![0.3, -0.2];
        let task = Task::from_pairs(2, 2, vec![(input.clone(), vec![0.0, 0.0])]).unwrap();

        let h = 1e-6;
        let mut shifted = input.clone();
        shifted[1] += h;
        let numeric = (net.process(&Vector::from(shifted)).unwrap().component_sum()
            - net.process(&Vector::from(input)).unwrap().component_sum())
            / h;
        assert_relative_eq!(net.sensitivity(1, &task).unwrap(), numeric, epsilon = 1e-5);
    }

    #[test]
    fn sensitivity_arguments_are_checked() {
        let net = identity_net();
        let task = Task::new(2, 2).unwrap();
        assert_eq!(net.sensitivity(0, &task), Err(ProcessError::EmptyTask));
        assert_eq!(
            net.sensitivity(2, &task),
            Err(ProcessError::BadInputIndex {
                index: 2,
                inputs: 2
            })
        );
        let other = Task::new(3, 2).unwrap();
        assert!(matches!(
            net.sensitivity(0, &other),
            Err(ProcessError::IncompatibleTask { .. })
        ));
    }

    proptest! {
        #[test]
        fn outputs_are_strictly_between_zero_and_one(
            seed in any::<u64>(),
            hidden in 1usize..6,
            outputs in 1usize..4,
            inputs in proptest::collection::vec(-5.0f64..5.0, 3),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let net = Net::random(&[3, hidden, outputs], -1.0, 1.0, &mut rng).unwrap();
            let result = net.process(&Vector::from(inputs)).unwrap();
            prop_assert_eq!(result.dimension(), outputs);
            prop_assert!(result.iter().all(|&o| o > 0.0 && o < 1.0));
        }
    }
}
