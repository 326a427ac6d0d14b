//! CLI entry point for dynadojo-rs.

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dynadojo_rs::config::{
    ExperimentConfig, ExperimentKind, FixedErrorConfig, SampleSweepConfig,
};
use dynadojo_rs::models::LeastSquaresModel;
use dynadojo_rs::systems::LinearSystem;
use dynadojo_rs::{Challenge, FixedError, ModelSpec, Result, ResultTable, SampleSweep};

#[derive(Parser)]
#[command(name = "dynadojo")]
#[command(about = "Sample-complexity challenges for models of dynamical systems")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    FixedComplexity,
    FixedTrainSize,
    FixedError,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sample experiment file
    Init {
        /// Output path for the experiment file
        #[arg(default_value = "dynadojo.toml")]
        output: String,
        /// Challenge to configure
        #[arg(long, value_enum, default_value = "fixed-error")]
        kind: Kind,
    },
    /// Validate an experiment file
    Validate {
        /// Path to the experiment file
        config: String,
    },
    /// Run an experiment
    Run {
        /// Path to the experiment file
        config: String,
        /// Write the result table as JSON
        #[arg(long)]
        output: Option<String>,
        /// Override the master seed
        #[arg(long)]
        seed: Option<u64>,
        /// Worker threads for independent cells
        #[arg(long)]
        threads: Option<usize>,
        /// Show a progress bar
        #[arg(long)]
        progress: bool,
    },
}

fn sample_config(kind: Kind) -> ExperimentConfig {
    let experiment = match kind {
        Kind::FixedComplexity => {
            ExperimentKind::FixedComplexity(SampleSweepConfig::new(vec![5, 10, 20, 50]))
        }
        Kind::FixedTrainSize => ExperimentKind::FixedTrainSize(SampleSweepConfig::new(vec![20])),
        Kind::FixedError => ExperimentKind::FixedError(
            FixedErrorConfig::new(0.01).with_n_precision(1).with_n_max(200),
        ),
    };
    let mut config = ExperimentConfig::with_kind(experiment);
    config.challenge = config
        .challenge
        .with_timesteps(20)
        .with_test_set(20, 20);
    if !matches!(kind, Kind::FixedComplexity) {
        config.challenge.latent_dims = vec![2, 4];
    }
    config.evaluate.seed = Some(0);
    config
}

fn run(config: &ExperimentConfig) -> Result<ResultTable> {
    let spec = ModelSpec::<LeastSquaresModel>::new(config.model.clone())
        .with_fit(config.fit.clone())
        .with_act(config.act.clone());
    let challenge = config.challenge.clone();
    let system = config.system.clone();

    match &config.experiment {
        ExperimentKind::FixedComplexity(sweep) => {
            SampleSweep::<LinearSystem>::fixed_complexity(challenge, sweep.clone(), system)
                .evaluate(&spec, &config.evaluate)
        }
        ExperimentKind::FixedTrainSize(sweep) => {
            SampleSweep::<LinearSystem>::fixed_train_size(challenge, sweep.clone(), system)
                .evaluate(&spec, &config.evaluate)
        }
        ExperimentKind::FixedError(search) => {
            FixedError::<LinearSystem>::new(challenge, search.clone(), system)
                .evaluate(&spec, &config.evaluate)
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { output, kind } => {
            let config = sample_config(kind);
            config.to_file(&output)?;
            println!("✓ Experiment written to: {output}");
        }
        Commands::Validate { config } => {
            tracing::info!("Validating experiment: {}", config);
            let config = ExperimentConfig::from_file(&config)?;
            config.validate()?;
            println!("✓ Experiment is valid");
            println!("  Latent dims: {:?}", config.challenge.latent_dims);
            println!("  Timesteps: {}", config.challenge.timesteps);
            println!("  Reps: {}", config.challenge.reps);
        }
        Commands::Run {
            config,
            output,
            seed,
            threads,
            progress,
        } => {
            tracing::info!("Running experiment: {}", config);
            let mut config = ExperimentConfig::from_file(&config)?;
            if seed.is_some() {
                config.evaluate.seed = seed;
            }
            if threads.is_some() {
                config.evaluate.num_threads = threads;
            }
            config.evaluate.progress |= progress;
            config.validate()?;

            let results = run(&config)?;
            println!("{}", results.summary());
            if let Some(path) = output {
                std::fs::write(&path, results.to_json()?)?;
                println!("✓ Results written to: {path}");
            }
        }
    }

    Ok(())
}
