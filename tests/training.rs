use rand::{rngs::StdRng, SeedableRng};

use rpmlp::linalg::{Matrix, Vector};
use rpmlp::perceptron::{
    ConstantRate, Elastic, Manhattan, Momentum, Net, QuickProp, Strategy, Task, Trainer,
};

fn or_task() -> Task {
    Task::from_pairs(
        2,
        1,
        vec![
            (vec![0.0, 0.0], vec![0.0]),
            (vec![0.0, 1.0], vec![1.0]),
            (vec![1.0, 0.0], vec![1.0]),
            (vec![1.0, 1.0], vec![1.0]),
        ],
    )
    .unwrap()
}

fn fixed_net() -> Net {
    Net::from_parameters(
        vec![
            Matrix::from_rows(&[vec![0.5, -0.4], vec![0.3, 0.8]]).unwrap(),
            Matrix::from_rows(&[vec![0.7, -0.6]]).unwrap(),
        ],
        vec![Vector::from(vec![0.1, -0.2]), Vector::from(vec![0.05])],
    )
    .unwrap()
}

fn simple() -> ConstantRate {
    ConstantRate {
        learn_rate: 1.0,
        flat_spot: 0.1,
    }
}

/// Runs `cycles` batch cycles, returning the error before and after.
fn train_batch(net: Net, weight_decay: f64, strategy: impl Into<Strategy>, cycles: usize) -> (f64, f64, Net) {
    let task = or_task();
    let before = net.total_error(&task).unwrap();
    let mut trainer = net.build_trainer(weight_decay, strategy).unwrap();
    for _ in 0..cycles {
        trainer.batch_train(&task).unwrap();
    }
    let net = trainer.teardown();
    let after = net.total_error(&task).unwrap();
    (before, after, net)
}

fn assert_sane(net: &Net) {
    for example in &or_task() {
        let output = net.process(&example.input).unwrap();
        assert!(output.iter().all(|&o| o.is_finite() && o > 0.0 && o < 1.0));
    }
    for coeffs in net.transitions() {
        assert!(coeffs.values().all(|c| c.is_finite()));
    }
}

#[test]
fn constant_rate_learns_from_fixed_weights() {
    let (before, after, _) = train_batch(fixed_net(), 0.0, simple(), 100);
    assert!(after < before, "error went from {} to {}", before, after);
}

#[test]
fn constant_rate_learns_from_seeded_weights() {
    let mut rng = StdRng::seed_from_u64(42);
    let net = Net::random(&[2, 2, 1], -1.0, 1.0, &mut rng).unwrap();
    let (before, after, _) = train_batch(net, 0.0, simple(), 100);
    assert!(after < before, "error went from {} to {}", before, after);
}

#[test]
fn manhattan_learns_from_fixed_weights() {
    let (before, after, _) = train_batch(fixed_net(), 0.0, Manhattan::default(), 100);
    assert!(after < before, "error went from {} to {}", before, after);
}

#[test]
fn remaining_strategies_learn_from_fixed_weights() {
    let strategies: Vec<(Strategy, f64)> = vec![
        (Momentum::default().into(), 0.0005),
        (Elastic::default().into(), 0.01),
        (QuickProp::default().into(), 0.0),
    ];
    for (strategy, weight_decay) in strategies {
        let (before, after, net) = train_batch(fixed_net(), weight_decay, strategy, 300);
        assert!(after < before, "{}: error went from {} to {}", strategy, before, after);
        assert_sane(&net);
    }
}

#[test]
fn online_training_stays_sane() {
    let task = or_task();
    let mut rng = StdRng::seed_from_u64(7);
    let mut trainer =
        Trainer::random(&[2, 3, 1], -0.5, 0.5, &mut rng, 0.0, Elastic::default()).unwrap();
    for _ in 0..50 {
        let error = trainer.online_train(&task).unwrap();
        assert!(error.is_finite());
    }
    assert_eq!(trainer.statistics().propagations, 200);
    assert_eq!(trainer.statistics().updates, 200);
    assert_sane(&trainer.teardown());
}

#[test]
fn trained_net_reports_sensitivities() {
    let (_, _, net) = train_batch(fixed_net(), 0.0, simple(), 100);
    let sensitivities = net.sensitivities(&or_task()).unwrap();
    assert_eq!(sensitivities.len(), 2);
    assert!(sensitivities.iter().all(|s| s.is_finite()));
}
