//! Mind CLI - deterministic scenario runner.
//!
//! - `mind run` - build a scenario's action groups and replay its script
//! - `mind check` - run a scenario twice and compare the traces

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod scenario;

use scenario::{Report, Scenario};

#[derive(Parser)]
#[command(name = "mind")]
#[command(about = "Deterministic mind kernel scenario runner", version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print the emitted actions
    Run {
        /// Scenario file (YAML)
        scenario: PathBuf,

        /// Override the scenario seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the number of ticks
        #[arg(long)]
        ticks: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a scenario twice and fail if the traces differ
    Check {
        /// Scenario file (YAML)
        scenario: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging on stderr so JSON reports stay clean
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            seed,
            ticks,
            json,
        } => run_scenario(&scenario, seed, ticks, json),
        Commands::Check { scenario } => check_scenario(&scenario),
    }
}

fn run_scenario(path: &Path, seed: Option<u64>, ticks: Option<u64>, json: bool) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let seed = seed.unwrap_or(scenario.seed);
    let ticks = ticks.unwrap_or(scenario.ticks);
    tracing::info!(scenario = %scenario.name, seed, ticks, "Running scenario");

    let report = scenario.run(seed, ticks)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn check_scenario(path: &Path) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let first = scenario.run(scenario.seed, scenario.ticks)?;
    let second = scenario.run(scenario.seed, scenario.ticks)?;

    if first != second {
        let diverged = first
            .actions
            .iter()
            .zip(&second.actions)
            .find(|(a, b)| a != b)
            .map(|(a, _)| a.tick);
        match diverged {
            Some(tick) => bail!("scenario '{}' diverged at tick {}", scenario.name, tick),
            None => bail!("scenario '{}' produced traces of different lengths", scenario.name),
        }
    }

    tracing::info!(scenario = %scenario.name, "Deterministic");
    println!(
        "ok: {} actions, {} selections over {} ticks (seed {})",
        first.actions.len(),
        first.selections.len(),
        first.ticks,
        first.seed
    );
    Ok(())
}

fn print_report(report: &Report) {
    println!("Scenario: {} (seed {})", report.scenario, report.seed);
    println!();
    for tick in 1..=report.ticks {
        let actions: Vec<_> = report.actions.iter().filter(|a| a.tick == tick).collect();
        if actions.is_empty() {
            println!("{tick:>4}  -");
            continue;
        }
        for action in actions {
            println!(
                "{tick:>4}  {:<24} {} {}",
                action.action, action.key, action.value
            );
        }
    }
    println!();
    println!("Selections: {}", report.selections.len());
}
