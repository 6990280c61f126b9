use log::{debug, trace};
use rand::Rng;

use super::net::{ActivationTrace, Coeffs, Net, NewNetError, ProcessError};
use super::strategy::{self, ConfigError, Strategy, StrategyState};
use super::task::{Example, Task};
use crate::linalg::{DimensionMismatch, Matrix, SizeMismatch, Vector};

/// Counters of the work a trainer has done since it was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Forward and backward passes, one per example.
    pub propagations: usize,
    /// Applied weight updates.
    pub updates: usize,
}

/// Net trainer structure.
///
/// Training needs gradient accumulators and strategy history next to the network,
/// and this structure holds them all.
/// Training procedure will look like this:
/// * One builds a trainer with `Net::build_trainer`, which consumes `Net`,
/// or directly with `Trainer::random` / `Trainer::from_parameters`.
/// * Training data is processed via `Trainer::online_train` or `Trainer::batch_train`.
/// For finer control, `Trainer::backward_propagate` accumulates gradients of a single
/// example and `Trainer::apply_training` turns them into a weight update.
/// * At any time one can call `Trainer::net_ref` to get access to `Net::process`.
/// * Once finished training, `Trainer::teardown` frees the training state and
/// returns `Net` back.
///
/// # Examples
/// ```
/// # use rpmlp::perceptron::{ConstantRate, Net, Task};
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let task = Task::from_pairs(2, 1, vec![
///     (vec![0.0, 0.0], vec![0.0]),
///     (vec![0.0, 1.0], vec![1.0]),
///     (vec![1.0, 0.0], vec![1.0]),
///     (vec![1.0, 1.0], vec![1.0]),
/// ]).unwrap();
///
/// let mut rng = StdRng::seed_from_u64(42);
/// let net = Net::random(&[2, 2, 1], -1.0, 1.0, &mut rng).unwrap();
/// let mut trainer = net.build_trainer(0.0, ConstantRate::default()).unwrap();
/// for _ in 0..10 {
///     trainer.batch_train(&task).unwrap();
/// }
/// assert_eq!(trainer.statistics().updates, 10);
/// let net = trainer.teardown();
/// ```
#[derive(Debug, Clone)]
pub struct Trainer {
    /// The network object trainer possesses.
    net: Net,

    /// Fraction of every coefficient taken away after each update.
    weight_decay: f64,

    /// Accumulated gradients, same shape as `Net::transitions`.
    gradients: Box<[Coeffs]>,

    strategy: StrategyState,

    /// Net output of the latest propagated example.
    output: Vector,

    // Examples accumulated since the last update
    gradient_counter: usize,

    statistics: Statistics,
}

impl Trainer {
    /// Consumes `Net` and builds `Trainer` object containing it.
    pub(super) fn build(net: Net, weight_decay: f64, strategy: Strategy) -> Result<Trainer, ConfigError> {
        strategy::check_weight_decay(weight_decay)?;

        // Gradients have the same structure as Net::transitions
        let gradients: Box<[Coeffs]> = net.transitions.iter().map(Coeffs::zeros_like).collect();
        let strategy_state = StrategyState::new(strategy, &gradients)?;

        debug!(
            "Built trainer for geometry {:?}: {} strategy, weight decay {}",
            net.geometry(),
            strategy,
            weight_decay
        );

        Ok(Trainer {
            output: Vector::zeros(net.output_dimension()),
            net,
            weight_decay,
            gradients,
            strategy: strategy_state,
            gradient_counter: 0,
            statistics: Statistics::default(),
        })
    }

    /// Builds trainer for a random network, see `Net::random`.
    pub fn random<R: Rng + ?Sized>(
        geometry: &[usize],
        lower_bound: f64,
        higher_bound: f64,
        rng: &mut R,
        weight_decay: f64,
        strategy: impl Into<Strategy>,
    ) -> Result<Trainer, BuildError> {
        let net = Net::random(geometry, lower_bound, higher_bound, rng)?;
        Ok(net.build_trainer(weight_decay, strategy)?)
    }

    /// Builds trainer for a network with the given coefficients, see `Net::from_parameters`.
    pub fn from_parameters(
        weights: Vec<Matrix>,
        biases: Vec<Vector>,
        weight_decay: f64,
        strategy: impl Into<Strategy>,
    ) -> Result<Trainer, BuildError> {
        let net = Net::from_parameters(weights, biases)?;
        Ok(net.build_trainer(weight_decay, strategy)?)
    }

    /// Returns reference to contained `Net`, allowing the use of `Net::process`.
    pub fn net_ref(&self) -> &Net {
        &self.net
    }

    /// Gradients accumulated since the last update (or left over by the strategy's reset).
    pub fn gradients(&self) -> &[Coeffs] {
        &self.gradients
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics
    }

    /// Output of the latest propagated example, zeros before any.
    pub fn current_output(&self) -> &Vector {
        &self.output
    }

    pub fn strategy(&self) -> &StrategyState {
        &self.strategy
    }

    pub fn weight_decay(&self) -> f64 {
        self.weight_decay
    }

    pub fn layer_count(&self) -> usize {
        self.net.layer_count()
    }

    pub fn input_dimension(&self) -> usize {
        self.net.input_dimension()
    }

    pub fn output_dimension(&self) -> usize {
        self.net.output_dimension()
    }

    /// Calculates output of the network, remembering it as the current output.
    pub fn forward_propagate(&mut self, input: &Vector) -> Result<Vector, ProcessError> {
        let output = self.net.process(input)?;
        self.output = output.clone();
        Ok(output)
    }

    /// Accumulates gradients of one example from its forward pass.
    /// Note that weights are not changed by this method, call `Trainer::apply_training`
    /// to finally apply them.
    ///
    /// # Arguments
    /// * `trace` - outputs of every layer, as returned by `Net::forward_propagate` of the contained net;
    /// * `desired_outputs` - desired activations of output neurons.
    ///
    /// # Returns
    /// * `Ok(())` if the trace comes from a net of the same geometry, was taken since
    /// the last update and `desired_outputs` fits the output layer;
    /// * `Err(TrainError)` otherwise, with the trainer left untouched.
    ///
    /// # Examples
    /// ```
    /// # use rpmlp::perceptron::{Manhattan, Net};
    /// # use rpmlp::linalg::{Matrix, Vector};
    /// let net = Net::from_parameters(vec![Matrix::identity(2)], vec![Vector::zeros(2)]).unwrap();
    /// let mut trainer = net.build_trainer(0.0, Manhattan::default()).unwrap();
    ///
    /// let trace = trainer.net_ref().forward_propagate(&Vector::from(vec![1.0, 0.0])).unwrap();
    /// trainer.backward_propagate(trace, &Vector::from(vec![1.0, 0.0])).unwrap();
    /// trainer.apply_training().unwrap();
    /// ```
    pub fn backward_propagate(
        &mut self,
        trace: ActivationTrace,
        desired_outputs: &Vector,
    ) -> Result<(), TrainError> {
        let geometry = trace.geometry();
        if geometry.as_slice() != self.net.geometry() {
            return Err(TrainError::ForeignTrace {
                expected: self.net.geometry().to_vec(),
                got: geometry,
            });
        }
        if trace.generation() != self.net.generation {
            return Err(TrainError::StaleTrace {
                expected: self.net.generation,
                got: trace.generation(),
            });
        }
        if desired_outputs.dimension() != self.net.output_dimension() {
            return Err(TrainError::BadDesiredOutputs(SizeMismatch {
                expected: self.net.output_dimension(),
                got: desired_outputs.dimension(),
            }));
        }

        let flat_spot = self.strategy.flat_spot();
        let layers = trace.layers();
        let last = layers.len() - 1;

        // deltas[i] belongs to layer i + 1, i.e. to the neurons fed by transition i
        let mut deltas = vec![Vector::zeros(0); last];

        // Output error is collapsed to a single number before it is spread over the neurons
        let error = desired_outputs.checked_sub(&layers[last])?.component_sum();
        deltas[last - 1] = Net::output_derivative(&layers[last], flat_spot)?.scale(error);

        for i in (1..last).rev() {
            deltas[i - 1] = self.net.transitions[i]
                .weights
                .transpose()
                .mul_vector(&deltas[i])?
                .hadamard(&Net::output_derivative(&layers[i], flat_spot)?)?;
        }

        // Everything is computed before anything is stored
        let gradients = self
            .gradients
            .iter()
            .zip(deltas.iter())
            .zip(layers.iter())
            .map(|((gradient, delta), output)| {
                Ok(Coeffs::new(
                    gradient.weights.checked_sub(&Matrix::outer(delta, output))?,
                    gradient.biases.checked_add(delta)?,
                ))
            })
            .collect::<Result<Box<[Coeffs]>, DimensionMismatch>>()?;

        self.gradients = gradients;
        self.output = trace.into_output();
        self.gradient_counter += 1;
        self.statistics.propagations += 1;
        Ok(())
    }

    /// Applies training, previously accumulated by `Trainer::backward_propagate`:
    /// lets the strategy change the coefficients, shrinks them by the weight decay
    /// and prepares gradients for the next cycle.
    /// Does nothing if no example was propagated since the last update.
    pub fn apply_training(&mut self) -> Result<(), TrainError> {
        if self.gradient_counter == 0 {
            return Ok(());
        }

        self.strategy
            .adapt(&mut self.net.transitions, &mut self.gradients)?;

        let keep = 1.0 - self.weight_decay;
        for coeffs in self.net.transitions.iter_mut() {
            *coeffs = coeffs.scale(keep);
        }

        self.strategy.reset(&mut self.gradients);
        self.net.generation += 1;

        trace!(
            "Applied update {} over {} example(s)",
            self.statistics.updates + 1,
            self.gradient_counter
        );
        self.gradient_counter = 0;
        self.statistics.updates += 1;
        Ok(())
    }

    fn check_task(&self, task: &Task) -> Result<(), TrainError> {
        if task.input_dimension() != self.net.input_dimension()
            || task.output_dimension() != self.net.output_dimension()
        {
            return Err(TrainError::IncompatibleTask {
                expected: (self.net.input_dimension(), self.net.output_dimension()),
                got: (task.input_dimension(), task.output_dimension()),
            });
        }
        Ok(())
    }

    /// Forward and backward pass of one example.
    ///
    /// # Returns
    /// The squared error of the output seen during the pass.
    fn propagate_example(&mut self, example: &Example) -> Result<f64, TrainError> {
        let trace = self.net.forward_propagate(&example.input)?;
        let cost = Net::calc_cost(trace.output(), &example.output)?;
        self.backward_propagate(trace, &example.output)?;
        Ok(cost)
    }

    /// Performs one training cycle updating the weights after every example.
    ///
    /// # Returns
    /// * `Ok(f64)` with the total squared error of the outputs seen during the cycle;
    /// * `Err(TrainError)` if the task doesn't fit the net.
    pub fn online_train(&mut self, task: &Task) -> Result<f64, TrainError> {
        self.check_task(task)?;

        let mut total_error = 0.0;
        for example in task {
            total_error += self.propagate_example(example)?;
            self.apply_training()?;
        }

        debug!("Online cycle over {} example(s), error {}", task.len(), total_error);
        Ok(total_error)
    }

    /// Performs one training cycle accumulating gradients of every example, then applies
    /// them at once.
    /// (It is equivalent to calling `Trainer::backward_propagate` for every example,
    /// and then `Trainer::apply_training`.)
    /// An empty task accumulates nothing, so no update happens: neither weight decay
    /// nor the momentum carried over from the previous cycle is applied.
    ///
    /// # Returns
    /// * `Ok(f64)` with the total squared error of the outputs seen during the cycle;
    /// * `Err(TrainError)` if the task doesn't fit the net.
    pub fn batch_train(&mut self, task: &Task) -> Result<f64, TrainError> {
        self.check_task(task)?;

        let mut total_error = 0.0;
        for example in task {
            total_error += self.propagate_example(example)?;
        }
        self.apply_training()?;

        debug!("Batch cycle over {} example(s), error {}", task.len(), total_error);
        Ok(total_error)
    }

    /// See `Net::sensitivity`.
    pub fn sensitivity(&self, input_index: usize, task: &Task) -> Result<f64, ProcessError> {
        self.net.sensitivity(input_index, task)
    }

    /// Frees training state, consuming `Trainer` object, and returns contained `Net` back.
    /// Note that gradients accumulated but not yet applied will be lost,
    /// so don't forget to call `Trainer::apply_training` before!
    pub fn teardown(self) -> Net {
        self.net
    }
}

/// Error structure for `Trainer::random` and `Trainer::from_parameters`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Net(#[from] NewNetError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Error structure for `Trainer`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrainError {
    #[error("Bad desired outputs. {0}")]
    BadDesiredOutputs(SizeMismatch),
    #[error("Task of dimensions {got:?} doesn't fit net of dimensions {expected:?}!")]
    IncompatibleTask {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("Expected trace of geometry {expected:?}, but got {got:?}!")]
    ForeignTrace { expected: Vec<usize>, got: Vec<usize> },
    #[error("Expected trace taken after update {expected}, but got one from update {got}!")]
    StaleTrace { expected: u64, got: u64 },
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Shape(#[from] DimensionMismatch),
}
