#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bayes_pref::evaluation::{evaluate_recovery, summarize, RecoveryCase};
use bayes_pref::{
    BeliefSnapshot, BeliefState, BeliefUpdater, JsonlTraceSink, PairSelector, PreferenceSession,
    SelectorConfig, SessionConfig,
};

const DEFAULT_EPSILON: f64 = 0.01;
const DEFAULT_EXPLORATION: f64 = 0.1;

#[derive(Parser)]
#[command(name = "bayes-pref", version, about = "Adaptive pairwise preference engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check ranking recovery against simulated ground truth
    Validate {
        #[arg(long, default_value_t = 8)]
        items: usize,
        #[arg(long, default_value_t = 50)]
        trials: usize,
        /// Probit noise of the simulated participant
        #[arg(long, default_value_t = 0.1)]
        noise: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 10)]
        repeats: u64,
        #[arg(long, default_value_t = DEFAULT_EPSILON)]
        epsilon: f64,
        #[arg(long, default_value_t = DEFAULT_EXPLORATION)]
        exploration_weight: f64,
        /// JSONL output; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run a demo session against a uniformly random chooser
    Simulate {
        #[arg(long)]
        items: usize,
        #[arg(long, default_value_t = 50)]
        max_trials: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long)]
        threshold: Option<f64>,
        /// Write session events as JSONL
        #[arg(long)]
        trace: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the next pair to present for a stored belief
    NextPair {
        #[arg(long)]
        state: PathBuf,
        #[arg(long, default_value_t = DEFAULT_EPSILON)]
        epsilon: f64,
        #[arg(long, default_value_t = DEFAULT_EXPLORATION)]
        exploration_weight: f64,
    },
    /// Apply one recorded choice to a stored belief
    Update {
        #[arg(long)]
        state: PathBuf,
        #[arg(long)]
        i: usize,
        #[arg(long)]
        j: usize,
        #[arg(long)]
        winner: usize,
        #[arg(long, default_value_t = DEFAULT_EPSILON)]
        epsilon: f64,
        /// Defaults to rewriting --state in place
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write a fresh prior belief
    Init {
        #[arg(long)]
        items: usize,
        #[arg(long, default_value_t = 0.0)]
        prior_mean: f64,
        #[arg(long, default_value_t = 1.0)]
        prior_variance: f64,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            items,
            trials,
            noise,
            seed,
            repeats,
            epsilon,
            exploration_weight,
            out,
        } => {
            let case = RecoveryCase {
                n_items: items,
                trials,
                noise,
                selector: SelectorConfig::new(epsilon, exploration_weight)?,
                truth: None,
            };
            let mut reports = Vec::new();
            for run in 0..repeats {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(run));
                reports.push(evaluate_recovery(&case, &mut rng)?);
            }
            let summary = summarize(&reports);
            tracing::info!(
                runs = summary.runs,
                mean_spearman = summary.mean_spearman,
                passing_fraction = summary.passing_fraction,
                "validation finished"
            );

            let mut sink: Box<dyn Write> = match out {
                Some(path) => Box::new(File::create(path)?),
                None => Box::new(io::stdout().lock()),
            };
            for report in &reports {
                writeln!(sink, "{}", serde_json::to_string(report)?)?;
            }
            writeln!(sink, "{}", serde_json::to_string(&summary)?)?;
        }
        Commands::Simulate {
            items,
            max_trials,
            seed,
            threshold,
            trace,
            out,
        } => {
            let mut config = SessionConfig::new(items).with_max_trials(max_trials);
            if let Some(threshold) = threshold {
                config = config.with_convergence_threshold(threshold);
            }

            let (mut session, worker) = match trace {
                Some(path) => {
                    let (sink, worker) = JsonlTraceSink::new(path)?;
                    (
                        PreferenceSession::with_observer(config, Arc::new(sink))?,
                        Some(worker),
                    )
                }
                None => (PreferenceSession::new(config)?, None),
            };

            let mut rng = StdRng::seed_from_u64(seed);
            let results = session.run_to_completion(|i, j| if rng.gen::<bool>() { i } else { j })?;
            // Closes the trace channel so the worker can drain and exit.
            drop(session);
            if let Some(worker) = worker {
                worker.join()?;
            }

            match out {
                Some(path) => write_json(&path, &results)?,
                None => println!("{}", serde_json::to_string_pretty(&results)?),
            }
        }
        Commands::NextPair {
            state,
            epsilon,
            exploration_weight,
        } => {
            let belief = load_belief(&state)?;
            let selector = PairSelector::new(SelectorConfig::new(epsilon, exploration_weight)?)?;
            let selection = selector.select(&belief);
            println!("{}", serde_json::to_string(&selection.best)?);
        }
        Commands::Update {
            state,
            i,
            j,
            winner,
            epsilon,
            out,
        } => {
            let mut belief = load_belief(&state)?;
            let outcome = BeliefUpdater::new(epsilon)?.update(&mut belief, i, j, winner)?;
            let target = out.unwrap_or(state);
            write_json(&target, &belief.snapshot())?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Commands::Init {
            items,
            prior_mean,
            prior_variance,
            out,
        } => {
            let belief = BeliefState::new(items, prior_mean, prior_variance)?;
            write_json(&out, &belief.snapshot())?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("BAYES_PREF_LOG").unwrap_or_else(|_| EnvFilter::new("bayes_pref=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(true))
        .with(filter)
        .init();
}

fn load_belief(path: &Path) -> Result<BeliefState, Box<dyn std::error::Error>> {
    let snapshot: BeliefSnapshot = read_json(path)?;
    Ok(BeliefState::from_snapshot(&snapshot)?)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, json)
}
