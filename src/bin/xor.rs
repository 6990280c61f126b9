//! xor - trains a 2-2-1 perceptron on the inclusive-or truth table
//!
//! ```bash
//! cargo run --bin xor -- --strategy elastic --cycles 500 --seed 42
//! RUST_LOG=debug cargo run --bin xor -- --online
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use rand::{rngs::StdRng, SeedableRng};

use rpmlp::perceptron::{
    ConstantRate, Elastic, Manhattan, Momentum, Net, NetworkReport, QuickProp, ResultsReport,
    SensitivityReport, Strategy, Task,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyKind {
    /// Constant learn rate
    Simple,
    Momentum,
    Manhattan,
    Elastic,
    Quick,
}

impl StrategyKind {
    /// Suggested hyperparameters with their weight decay.
    fn defaults(self) -> (Strategy, f64) {
        match self {
            StrategyKind::Simple => (
                ConstantRate {
                    learn_rate: 1.0,
                    flat_spot: 0.1,
                }
                .into(),
                0.0,
            ),
            StrategyKind::Momentum => (Momentum::default().into(), 0.0005),
            StrategyKind::Manhattan => (Manhattan::default().into(), 0.0),
            StrategyKind::Elastic => (Elastic::default().into(), 0.01),
            StrategyKind::Quick => (QuickProp::default().into(), 0.0),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "xor", version, about = "Trains a 2-2-1 perceptron on the inclusive-or truth table")]
struct Cli {
    /// Weight-update strategy
    #[arg(long, value_enum, default_value_t = StrategyKind::Simple)]
    strategy: StrategyKind,

    /// Number of training cycles over the whole task
    #[arg(long, default_value_t = 100)]
    cycles: usize,

    /// Update weights after every example instead of once per cycle
    #[arg(long)]
    online: bool,

    /// Random seed (for reproducibility)
    #[arg(long)]
    seed: Option<u64>,

    /// Lower bound of the starting coefficients
    #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
    lower: f64,

    /// Upper bound of the starting coefficients
    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    upper: f64,

    /// Weight decay, overriding the strategy's suggested one
    #[arg(long)]
    weight_decay: Option<f64>,
}

fn or_task() -> Result<Task> {
    Ok(Task::from_pairs(
        2,
        1,
        vec![
            (vec![0.0, 0.0], vec![0.0]),
            (vec![0.0, 1.0], vec![1.0]),
            (vec![1.0, 0.0], vec![1.0]),
            (vec![1.0, 1.0], vec![1.0]),
        ],
    )?)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let task = or_task()?;
    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let (strategy, suggested_decay) = cli.strategy.defaults();
    let weight_decay = cli.weight_decay.unwrap_or(suggested_decay);

    let net = Net::random(&[2, 2, 1], cli.lower, cli.upper, &mut rng)
        .context("Failed to build network")?;
    let mut trainer = net
        .build_trainer(weight_decay, strategy)
        .context("Failed to build trainer")?;

    info!(
        "Training with {} strategy for {} {} cycle(s)",
        strategy,
        cli.cycles,
        if cli.online { "online" } else { "batch" }
    );
    let mut error = 0.0;
    for _ in 0..cli.cycles {
        error = if cli.online {
            trainer.online_train(&task)?
        } else {
            trainer.batch_train(&task)?
        };
    }
    info!("Error during the last cycle: {}", error);

    let net = trainer.teardown();
    println!("{}\n", task);
    println!("{}\n", ResultsReport::new(&net, &task)?);
    println!("{}", NetworkReport::new(&net));
    println!("{}", SensitivityReport::new(&net, &task)?);
    Ok(())
}
