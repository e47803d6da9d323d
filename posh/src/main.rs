//! Plan tooling CLI.
//!
//! `check` parses a plan file and reports structural violations, `fmt`
//! prints the canonical serialization, and `run` executes a plan against a
//! scripted scenario (TOML) under the plan's own timing discipline.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use posh::agent::{Agent, RunOutcome};
use posh::build::{build, check_structure, PlanDescription};
use posh::config::{load_config, AgentConfig};
use posh::script::Scenario;
use posh::{lap, logging};

#[derive(Parser)]
#[command(name = "posh", version, about = "Reactive plan execution engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a plan file and report structural violations.
    Check {
        plan: PathBuf,
        /// Print a machine-readable summary instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Print the canonical serialization of a plan file.
    Fmt { plan: PathBuf },
    /// Execute a plan against a scripted scenario file.
    Run {
        plan: PathBuf,
        /// TOML file defining the scripted behaviors.
        #[arg(long)]
        scenario: PathBuf,
        /// Agent config TOML (defaults apply when omitted or missing).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Stop after this many ticks.
        #[arg(long, default_value_t = 100)]
        ticks: u64,
        /// Seed for deterministic drive-level shuffling.
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Check { plan, json } => cmd_check(&plan, json),
        Command::Fmt { plan } => cmd_fmt(&plan),
        Command::Run {
            plan,
            scenario,
            config,
            ticks,
            seed,
        } => cmd_run(&plan, &scenario, config.as_deref(), ticks, seed),
    }
}

fn load_plan(path: &Path) -> Result<PlanDescription> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let desc = lap::parse(&text).with_context(|| format!("parse {}", path.display()))?;
    Ok(desc)
}

#[derive(Serialize)]
struct CheckSummary {
    name: String,
    kind: String,
    drive_elements: usize,
    competences: usize,
    patterns: usize,
    violations: Vec<String>,
}

fn cmd_check(path: &Path, json: bool) -> Result<()> {
    let desc = load_plan(path)?;
    let violations = check_structure(&desc);
    let summary = CheckSummary {
        name: desc.collection.name.clone(),
        kind: desc.collection.kind.clone(),
        drive_elements: desc.collection.drives.iter().map(Vec::len).sum(),
        competences: desc.competences.len(),
        patterns: desc.patterns.len(),
        violations: violations.clone(),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{} ({}): {} drive elements, {} competences, {} patterns",
            summary.name, summary.kind, summary.drive_elements, summary.competences, summary.patterns
        );
    }
    if !violations.is_empty() {
        bail!("structural violations:\n- {}", violations.join("\n- "));
    }
    Ok(())
}

fn cmd_fmt(path: &Path) -> Result<()> {
    let desc = load_plan(path)?;
    print!("{}", lap::write(&desc));
    Ok(())
}

fn cmd_run(
    plan_path: &Path,
    scenario_path: &Path,
    config_path: Option<&Path>,
    ticks: u64,
    seed: Option<u64>,
) -> Result<()> {
    let desc = load_plan(plan_path)?;
    let scenario = Scenario::load(scenario_path)?;
    let registry = scenario
        .into_registry()
        .context("instantiate scenario behaviors")?;
    let mut plan = build(&desc, &registry)
        .with_context(|| format!("build plan {}", plan_path.display()))?;
    if let Some(seed) = seed {
        plan.reseed(seed);
    }

    let base = match config_path {
        Some(path) => load_config(path)?,
        None => AgentConfig::default(),
    };
    let config = AgentConfig {
        max_ticks: Some(ticks),
        ..base
    };

    let mut agent = Agent::new(plan, registry, config);
    agent.start().context("start agent")?;
    let outcome = agent.join().context("agent loop failed")?;
    match outcome {
        RunOutcome::GoalReached => println!("goal reached"),
        RunOutcome::PlanLost => println!("plan lost: no drive element was ready"),
        RunOutcome::Stopped { ticks } => println!("stopped after {ticks} ticks"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_check() {
        let cli = Cli::parse_from(["posh", "check", "plan.lap"]);
        assert!(matches!(cli.command, Command::Check { json: false, .. }));
    }

    #[test]
    fn parse_run_with_ticks() {
        let cli = Cli::parse_from([
            "posh",
            "run",
            "plan.lap",
            "--scenario",
            "world.toml",
            "--ticks",
            "7",
        ]);
        match cli.command {
            Command::Run { ticks, seed, .. } => {
                assert_eq!(ticks, 7);
                assert_eq!(seed, None);
            }
            _ => panic!("expected run"),
        }
    }
}
