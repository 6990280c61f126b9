//! Weight-update strategies.
//!
//! A strategy decides how accumulated gradients turn into weight changes, and
//! what is left of the gradients for the next cycle. `Strategy` holds the
//! hyperparameters chosen by the user, `StrategyState` is what the trainer keeps
//! at runtime: the same hyperparameters plus whatever history the rule needs.

use std::{fmt, mem};

use super::net::Coeffs;
use crate::linalg::DimensionMismatch;

/// Plain gradient descent with a constant learn rate and flat-spot elimination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantRate {
    pub learn_rate: f64,
    /// Added to the sigmoid derivative so saturated neurons keep learning, commonly 0.1.
    pub flat_spot: f64,
}

impl Default for ConstantRate {
    fn default() -> Self {
        ConstantRate {
            learn_rate: 1.0,
            flat_spot: 0.1,
        }
    }
}

/// Constant learn rate descent where a fraction of each gradient is carried into the next cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Momentum {
    pub learn_rate: f64,
    pub flat_spot: f64,
    /// Fraction of the gradient kept after an update, commonly between 0.5 and 0.95.
    pub momentum: f64,
}

impl Default for Momentum {
    fn default() -> Self {
        Momentum {
            learn_rate: 0.1,
            flat_spot: 0.1,
            momentum: 0.95,
        }
    }
}

/// Sign descent: every coefficient moves by the same step, against its gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Manhattan {
    pub step_range: f64,
}

impl Default for Manhattan {
    fn default() -> Self {
        Manhattan { step_range: 0.01 }
    }
}

/// Resilient propagation: each coefficient has its own step range which grows
/// while the gradient keeps its sign and shrinks when it flips.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Elastic {
    pub starting_step_range: f64,
    /// Commonly between 0.5 and 0.7.
    pub shrink_factor: f64,
    /// Commonly between 1.05 and 1.2.
    pub growth_factor: f64,
    pub min_step_range: f64,
    pub max_step_range: f64,
}

impl Default for Elastic {
    fn default() -> Self {
        Elastic {
            starting_step_range: 0.1,
            shrink_factor: 0.6,
            growth_factor: 1.1,
            min_step_range: 0.05,
            max_step_range: 0.2,
        }
    }
}

/// Quick propagation: fits a parabola through the last two gradients of each
/// coefficient and jumps to its minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuickProp {
    pub starting_step_range: f64,
    pub max_step_range: f64,
    /// Fraction of the step taken back when the parabola can't be used.
    pub learn_rate: f64,
}

impl Default for QuickProp {
    fn default() -> Self {
        QuickProp {
            starting_step_range: 0.1,
            max_step_range: 1.0,
            learn_rate: 0.3,
        }
    }
}

/// Weight-update strategy with its hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    ConstantRate(ConstantRate),
    Momentum(Momentum),
    Manhattan(Manhattan),
    Elastic(Elastic),
    QuickProp(QuickProp),
}

macro_rules! impl_from_strategy {
    ($($variant:ident),+) => {
        $(impl From<$variant> for Strategy {
            fn from(params: $variant) -> Self {
                Strategy::$variant(params)
            }
        })+
    };
}

impl_from_strategy!(ConstantRate, Momentum, Manhattan, Elastic, QuickProp);

/// Error structure for out-of-range hyperparameters
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{name} must be {requirement}, but got {value}!")]
pub struct ConfigError {
    pub name: &'static str,
    pub requirement: &'static str,
    pub value: f64,
}

fn check(
    name: &'static str,
    requirement: &'static str,
    value: f64,
    holds: bool,
) -> Result<(), ConfigError> {
    if holds {
        Ok(())
    } else {
        Err(ConfigError {
            name,
            requirement,
            value,
        })
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    check(name, "positive and finite", value, value > 0.0 && value.is_finite())
}

fn check_flat_spot(value: f64) -> Result<(), ConfigError> {
    check(
        "Flat-spot elimination coefficient",
        "non-negative and finite",
        value,
        value >= 0.0 && value.is_finite(),
    )
}

pub(super) fn check_weight_decay(value: f64) -> Result<(), ConfigError> {
    check(
        "Weight decay factor",
        "from [0, 1)",
        value,
        (0.0..1.0).contains(&value),
    )
}

impl Strategy {
    /// Checks every hyperparameter against its allowed range.
    ///
    /// # Examples
    /// ```
    /// # use rpmlp::perceptron::{Elastic, Strategy};
    /// let strategy = Strategy::from(Elastic { growth_factor: 0.9, ..Elastic::default() });
    /// assert!(strategy.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Strategy::ConstantRate(ConstantRate {
                learn_rate,
                flat_spot,
            }) => {
                check_positive("Learn rate", learn_rate)?;
                check_flat_spot(flat_spot)
            }
            Strategy::Momentum(Momentum {
                learn_rate,
                flat_spot,
                momentum,
            }) => {
                check_positive("Learn rate", learn_rate)?;
                check_flat_spot(flat_spot)?;
                check(
                    "Momentum term coefficient",
                    "from [0, 1]",
                    momentum,
                    (0.0..=1.0).contains(&momentum),
                )
            }
            Strategy::Manhattan(Manhattan { step_range }) => check_positive("Step range", step_range),
            Strategy::Elastic(Elastic {
                starting_step_range,
                shrink_factor,
                growth_factor,
                min_step_range,
                max_step_range,
            }) => {
                check_positive("Starting step range", starting_step_range)?;
                check(
                    "Step-range shrink factor",
                    "from (0, 1]",
                    shrink_factor,
                    shrink_factor > 0.0 && shrink_factor <= 1.0,
                )?;
                check(
                    "Step-range growth factor",
                    "greater than 1 and finite",
                    growth_factor,
                    growth_factor > 1.0 && growth_factor.is_finite(),
                )?;
                check_positive("Maximal step range", max_step_range)?;
                check(
                    "Minimal step range",
                    "non-negative and not above the maximal step range",
                    min_step_range,
                    min_step_range >= 0.0 && min_step_range <= max_step_range,
                )
            }
            Strategy::QuickProp(QuickProp {
                starting_step_range,
                max_step_range,
                learn_rate,
            }) => {
                check_positive("Starting step range", starting_step_range)?;
                check_positive("Maximal step range", max_step_range)?;
                check(
                    "Learn rate",
                    "from (0, 1]",
                    learn_rate,
                    learn_rate > 0.0 && learn_rate <= 1.0,
                )
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::ConstantRate(_) => "constant rate",
            Strategy::Momentum(_) => "momentum",
            Strategy::Manhattan(_) => "manhattan",
            Strategy::Elastic(_) => "elastic",
            Strategy::QuickProp(_) => "quick propagation",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-coefficient memory of the strategies that look at the previous cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    previous_gradients: Box<[Coeffs]>,
    step_ranges: Box<[Coeffs]>,
}

impl History {
    fn new(gradients: &[Coeffs], starting_step_range: f64) -> History {
        History {
            previous_gradients: gradients.iter().map(Coeffs::zeros_like).collect(),
            step_ranges: gradients
                .iter()
                .map(|g| g.filled_like(starting_step_range))
                .collect(),
        }
    }

    pub fn previous_gradients(&self) -> &[Coeffs] {
        &self.previous_gradients
    }

    /// Signed steps applied to the coefficients on the last update.
    pub fn step_ranges(&self) -> &[Coeffs] {
        &self.step_ranges
    }

    /// Updates every step range with `next_step`, which gets the current step,
    /// mutable current gradient and previous gradient of one coefficient, then adds
    /// the step ranges to the coefficients.
    fn step(
        &mut self,
        transitions: &mut [Coeffs],
        gradients: &mut [Coeffs],
        mut next_step: impl FnMut(f64, &mut f64, f64) -> f64,
    ) -> Result<(), DimensionMismatch> {
        for ((coeffs, current), (steps, previous)) in transitions
            .iter_mut()
            .zip(gradients.iter_mut())
            .zip(self.step_ranges.iter_mut().zip(self.previous_gradients.iter()))
        {
            for ((step, gradient), &previous_gradient) in steps
                .values_mut()
                .zip(current.values_mut())
                .zip(previous.values())
            {
                *step = next_step(*step, gradient, previous_gradient);
            }
            coeffs.weights = coeffs.weights.checked_add(&steps.weights)?;
            coeffs.biases = coeffs.biases.checked_add(&steps.biases)?;
        }
        Ok(())
    }

    /// Current gradients become the previous ones, current ones start from zero.
    fn rotate(&mut self, gradients: &mut [Coeffs]) {
        for (current, previous) in gradients.iter_mut().zip(self.previous_gradients.iter_mut()) {
            let zeros = current.zeros_like();
            *previous = mem::replace(current, zeros);
        }
    }
}

/// Sign function with `sign(0) = 0`.
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Points `step` against the gradient, so that adding it descends.
/// The current gradient decides when it is nonzero, the previous one otherwise;
/// with both zero the step is kept as is.
fn descent_step(step: f64, current: f64, previous: f64) -> f64 {
    let gradient = if current != 0.0 { current } else { previous };
    match sign(gradient) {
        s if s == 0.0 => step,
        s => -s * step.abs(),
    }
}

impl Elastic {
    /// Next step range of a single coefficient.
    ///
    /// The magnitude of the result always lies in `[min_step_range, max_step_range]`.
    pub fn change_step_range(&self, step: f64, current: f64, previous: f64) -> f64 {
        let product = current * previous;
        let changed = if product < 0.0 {
            step * -self.shrink_factor
        } else if product > 0.0 {
            step * self.growth_factor
        } else {
            descent_step(step, current, previous)
        };

        let magnitude = changed
            .abs()
            .max(self.min_step_range)
            .min(self.max_step_range);
        if changed < 0.0 {
            -magnitude
        } else {
            magnitude
        }
    }
}

impl QuickProp {
    /// Next step range of a single coefficient.
    ///
    /// The jump is the exact vertex `current / curvature` accepted while
    /// `|vertex| <= max_step_range`, unlike the classic formula which scales it by the step
    /// once more and uses a strict bound.
    pub fn next_step_range(&self, step: f64, current: f64, previous: f64) -> f64 {
        let product = current * previous;
        if product > 0.0 {
            // Same direction, keep going
            step
        } else if product < 0.0 {
            // Gradient as a linear function of the coefficient, its root is the
            // minimum of the error parabola
            let curvature = (previous - current) / step;
            if curvature < 0.0 {
                let vertex = current / curvature;
                if vertex.abs() <= self.max_step_range {
                    return vertex;
                }
            }
            -self.learn_rate * step
        } else {
            descent_step(step, current, previous)
        }
    }
}

/// Strategy as kept by the trainer, with the history it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyState {
    ConstantRate(ConstantRate),
    Momentum(Momentum),
    Manhattan(Manhattan),
    Elastic(Elastic, History),
    QuickProp(QuickProp, History),
}

impl StrategyState {
    /// Validates `strategy` and allocates its history for gradients shaped like `gradients`.
    pub(super) fn new(strategy: Strategy, gradients: &[Coeffs]) -> Result<StrategyState, ConfigError> {
        strategy.validate()?;
        Ok(match strategy {
            Strategy::ConstantRate(params) => StrategyState::ConstantRate(params),
            Strategy::Momentum(params) => StrategyState::Momentum(params),
            Strategy::Manhattan(params) => StrategyState::Manhattan(params),
            Strategy::Elastic(params) => {
                StrategyState::Elastic(params, History::new(gradients, params.starting_step_range))
            }
            Strategy::QuickProp(params) => {
                StrategyState::QuickProp(params, History::new(gradients, params.starting_step_range))
            }
        })
    }

    /// Hyperparameters this state was built from.
    pub fn strategy(&self) -> Strategy {
        match self {
            StrategyState::ConstantRate(params) => (*params).into(),
            StrategyState::Momentum(params) => (*params).into(),
            StrategyState::Manhattan(params) => (*params).into(),
            StrategyState::Elastic(params, _) => (*params).into(),
            StrategyState::QuickProp(params, _) => (*params).into(),
        }
    }

    pub fn history(&self) -> Option<&History> {
        match self {
            StrategyState::Elastic(_, history) | StrategyState::QuickProp(_, history) => Some(history),
            _ => None,
        }
    }

    /// Value added to the sigmoid derivative during backpropagation.
    pub(super) fn flat_spot(&self) -> f64 {
        match self {
            StrategyState::ConstantRate(params) => params.flat_spot,
            StrategyState::Momentum(params) => params.flat_spot,
            _ => 0.0,
        }
    }

    /// Changes weights and biases according to the accumulated gradients.
    pub(super) fn adapt(
        &mut self,
        transitions: &mut [Coeffs],
        gradients: &mut [Coeffs],
    ) -> Result<(), DimensionMismatch> {
        match self {
            StrategyState::ConstantRate(ConstantRate { learn_rate, .. })
            | StrategyState::Momentum(Momentum { learn_rate, .. }) => {
                let learn_rate = *learn_rate;
                for (coeffs, gradient) in transitions.iter_mut().zip(gradients.iter()) {
                    coeffs.weights = coeffs
                        .weights
                        .checked_sub(&gradient.weights.scale(learn_rate))?;
                    coeffs.biases = coeffs.biases.checked_sub(&gradient.biases.scale(learn_rate))?;
                }
            }
            StrategyState::Manhattan(Manhattan { step_range }) => {
                let step_range = *step_range;
                for (coeffs, gradient) in transitions.iter_mut().zip(gradients.iter()) {
                    coeffs.weights = coeffs
                        .weights
                        .checked_sub(&gradient.weights.map(sign).scale(step_range))?;
                    coeffs.biases = coeffs
                        .biases
                        .checked_sub(&gradient.biases.map(sign).scale(step_range))?;
                }
            }
            StrategyState::Elastic(params, history) => {
                history.step(transitions, gradients, |step, gradient, previous| {
                    let next = params.change_step_range(step, *gradient, previous);
                    if *gradient * previous < 0.0 {
                        // Skip the sign comparison for this coefficient next cycle
                        *gradient = 0.0;
                    }
                    next
                })?;
            }
            StrategyState::QuickProp(params, history) => {
                history.step(transitions, gradients, |step, gradient, previous| {
                    params.next_step_range(step, *gradient, previous)
                })?;
            }
        }
        Ok(())
    }

    /// Prepares gradients for the next cycle.
    pub(super) fn reset(&mut self, gradients: &mut [Coeffs]) {
        match self {
            StrategyState::ConstantRate(_) | StrategyState::Manhattan(_) => {
                for gradient in gradients.iter_mut() {
                    *gradient = gradient.zeros_like();
                }
            }
            StrategyState::Momentum(Momentum { momentum, .. }) => {
                for gradient in gradients.iter_mut() {
                    *gradient = gradient.scale(*momentum);
                }
            }
            StrategyState::Elastic(_, history) | StrategyState::QuickProp(_, history) => {
                history.rotate(gradients)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{Matrix, Vector};
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    // proptest's prelude brings its own `Strategy` trait
    use super::Strategy;

    fn invalid_strategies() -> Vec<Strategy> {
        vec![
            ConstantRate {
                learn_rate: 0.0,
                ..ConstantRate::default()
            }
            .into(),
            ConstantRate {
                learn_rate: -1.0,
                ..ConstantRate::default()
            }
            .into(),
            ConstantRate {
                flat_spot: -0.1,
                ..ConstantRate::default()
            }
            .into(),
            Momentum {
                learn_rate: 0.0,
                ..Momentum::default()
            }
            .into(),
            Momentum {
                momentum: 1.5,
                ..Momentum::default()
            }
            .into(),
            Momentum {
                momentum: -0.1,
                ..Momentum::default()
            }
            .into(),
            Manhattan { step_range: 0.0 }.into(),
            Manhattan { step_range: -0.5 }.into(),
            Elastic {
                starting_step_range: 0.0,
                ..Elastic::default()
            }
            .into(),
            Elastic {
                shrink_factor: 0.0,
                ..Elastic::default()
            }
            .into(),
            Elastic {
                shrink_factor: 1.5,
                ..Elastic::default()
            }
            .into(),
            Elastic {
                growth_factor: 1.0,
                ..Elastic::default()
            }
            .into(),
            Elastic {
                min_step_range: -0.1,
                ..Elastic::default()
            }
            .into(),
            Elastic {
                max_step_range: 0.0,
                ..Elastic::default()
            }
            .into(),
            Elastic {
                min_step_range: 0.5,
                max_step_range: 0.2,
                ..Elastic::default()
            }
            .into(),
            QuickProp {
                starting_step_range: 0.0,
                ..QuickProp::default()
            }
            .into(),
            QuickProp {
                max_step_range: -1.0,
                ..QuickProp::default()
            }
            .into(),
            QuickProp {
                learn_rate: 0.0,
                ..QuickProp::default()
            }
            .into(),
            QuickProp {
                learn_rate: 1.5,
                ..QuickProp::default()
            }
            .into(),
            ConstantRate {
                learn_rate: f64::NAN,
                ..ConstantRate::default()
            }
            .into(),
        ]
    }

    #[test]
    fn defaults_are_valid() {
        let defaults: Vec<Strategy> = vec![
            ConstantRate::default().into(),
            Momentum::default().into(),
            Manhattan::default().into(),
            Elastic::default().into(),
            QuickProp::default().into(),
        ];
        for strategy in defaults {
            assert_eq!(strategy.validate(), Ok(()), "{}", strategy);
        }
    }

    #[test]
    fn out_of_range_hyperparameters_are_rejected() {
        for strategy in invalid_strategies() {
            assert!(strategy.validate().is_err(), "{:?}", strategy);
            assert!(StrategyState::new(strategy, &[]).is_err(), "{:?}", strategy);
        }
    }

    #[test]
    fn weight_decay_range() {
        assert!(check_weight_decay(0.0).is_ok());
        assert!(check_weight_decay(0.99).is_ok());
        assert!(check_weight_decay(1.0).is_err());
        assert!(check_weight_decay(-0.01).is_err());
    }

    fn elastic() -> Elastic {
        Elastic {
            starting_step_range: 0.1,
            shrink_factor: 0.5,
            growth_factor: 1.2,
            min_step_range: 0.01,
            max_step_range: 1.0,
        }
    }

    #[test]
    fn elastic_grows_on_agreement_and_flips_on_disagreement() {
        let e = elastic();
        assert_relative_eq!(e.change_step_range(-0.1, 2.0, 1.0), -0.12);
        assert_relative_eq!(e.change_step_range(-0.1, -2.0, 1.0), 0.05);
        // No history yet: step points against the gradient
        assert_relative_eq!(e.change_step_range(0.1, 3.0, 0.0), -0.1);
        assert_relative_eq!(e.change_step_range(0.1, -3.0, 0.0), 0.1);
    }

    #[test]
    fn elastic_clamps_to_bounds() {
        let e = elastic();
        assert_relative_eq!(e.change_step_range(0.9, 1.0, 1.0), 1.0);
        assert_relative_eq!(e.change_step_range(0.015, 1.0, -1.0), -0.01);
    }

    #[test]
    fn quick_prop_jumps_to_vertex() {
        let q = QuickProp {
            starting_step_range: 0.1,
            max_step_range: 1.0,
            learn_rate: 0.5,
        };
        // Gradient went from -1 to 1 over a step of 0.2: it crosses zero halfway back
        assert_relative_eq!(q.next_step_range(0.2, 1.0, -1.0), -0.1);
        // Same direction keeps the step
        assert_relative_eq!(q.next_step_range(0.2, 1.0, 1.0), 0.2);
        // Vertex too far away falls back to a damped reverse step
        assert_relative_eq!(q.next_step_range(5.0, 100.0, -1.0), -2.5);
        // Parabola without a minimum falls back as well
        assert_relative_eq!(q.next_step_range(-0.2, 1.0, -1.0), 0.1);
        // Zero gradient snaps the sign against the nonzero one
        assert_relative_eq!(q.next_step_range(0.2, 0.0, 2.0), -0.2);
        assert_relative_eq!(q.next_step_range(0.2, -2.0, 0.0), 0.2);
    }

    fn single_transition() -> Vec<Coeffs> {
        vec![Coeffs::new(
            Matrix::from_rows(&[vec![1.0, -1.0]]).unwrap(),
            Vector::from(vec![0.5]),
        )]
    }

    #[test]
    fn manhattan_moves_by_sign_only() {
        let mut transitions = single_transition();
        let mut gradients = vec![Coeffs::new(
            Matrix::from_rows(&[vec![10.0, 0.0]]).unwrap(),
            Vector::from(vec![-0.001]),
        )];
        let mut state = StrategyState::new(Manhattan { step_range: 0.25 }.into(), &gradients).unwrap();

        state.adapt(&mut transitions, &mut gradients).unwrap();
        assert_eq!(transitions[0].weights.as_slice(), &[0.75, -1.0]);
        assert_eq!(transitions[0].biases.as_slice(), &[0.75]);

        state.reset(&mut gradients);
        assert!(gradients[0].values().all(|&g| g == 0.0));
    }

    #[test]
    fn remembering_strategies_rotate_gradients() {
        let mut gradients = single_transition();
        let current = gradients[0].clone();
        let mut state = StrategyState::new(Elastic::default().into(), &gradients).unwrap();

        state.reset(&mut gradients);
        let history = state.history().unwrap();
        assert_eq!(history.previous_gradients()[0], current);
        assert_eq!(gradients[0], current.zeros_like());
    }

    #[test]
    fn elastic_zeroes_gradient_after_sign_change() {
        let mut transitions = single_transition();
        let mut gradients = vec![Coeffs::new(
            Matrix::from_rows(&[vec![1.0, 1.0]]).unwrap(),
            Vector::from(vec![1.0]),
        )];
        let mut state = StrategyState::new(Elastic::default().into(), &gradients).unwrap();

        state.adapt(&mut transitions, &mut gradients).unwrap();
        state.reset(&mut gradients);
        gradients[0].weights[(0, 0)] = -1.0;
        gradients[0].weights[(0, 1)] = 1.0;
        state.adapt(&mut transitions, &mut gradients).unwrap();

        assert_eq!(gradients[0].weights[(0, 0)], 0.0);
        assert_eq!(gradients[0].weights[(0, 1)], 1.0);
    }

    proptest! {
        #[test]
        fn elastic_step_ranges_stay_within_bounds(
            gradients in proptest::collection::vec(
                prop_oneof![Just(0.0), -10.0f64..-1e-9, 1e-9f64..10.0],
                1..64,
            ),
            starting in 0.001f64..2.0,
        ) {
            let e = Elastic { starting_step_range: starting, ..Elastic::default() };
            let mut step = starting;
            let mut previous = 0.0;
            for &current in &gradients {
                step = e.change_step_range(step, current, previous);
                prop_assert!(step.abs() >= e.min_step_range);
                prop_assert!(step.abs() <= e.max_step_range);
                previous = if current * previous < 0.0 { 0.0 } else { current };
            }
        }
    }
}
