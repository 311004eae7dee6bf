//! Binary entrypoint: one subcommand per pipeline stage, JSON files in and out.
//!
//! Exit codes:
//! - 0: stage completed (for `drift`: within tolerance)
//! - 1: processing failure (unreadable or malformed required input, bad config)
//! - 2: `drift` completed and the churn ratio reached the threshold

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;
use risk_register::input;
use risk_register::types::{ConsolidationInputs, GraphSnapshot, HotspotInputs};
use risk_register::{Config, Engine, GraphMode, Scanner};
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DRIFT_BREACH_EXIT: u8 = 2;

#[derive(Parser)]
#[command(name = "risk-register", version, about = "Aggregate code-quality signals into a ranked risk register")]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Rank files by weighted churn, complexity, coverage and criticality
  Hotspots(HotspotArgs),
  /// Flag directories whose changes are concentrated on few authors
  Ownership(OwnershipArgs),
  /// Diff two graph snapshots; exits 2 when drift breaches the threshold
  Drift(DriftArgs),
  /// Normalize Trivy JSON into findings
  Trivy(ScanArgs),
  /// Normalize Semgrep JSON into findings
  Semgrep(ScanArgs),
  /// Merge any subset of stage reports into the risk register
  Consolidate(ConsolidateArgs),
}

#[derive(Args)]
struct WeightArgs {
  #[arg(long, env = "RISK_W_CHURN", default_value_t = 0.4)]
  w_churn: f64,
  #[arg(long, env = "RISK_W_COMPLEXITY", default_value_t = 0.4)]
  w_complexity: f64,
  #[arg(long, env = "RISK_W_COVERAGE", default_value_t = 0.1)]
  w_coverage: f64,
  #[arg(long, env = "RISK_W_CRITICALITY", default_value_t = 0.1)]
  w_criticality: f64,
}

#[derive(Args)]
struct HotspotArgs {
  /// `<count> <path>` lines
  #[arg(long)]
  churn: PathBuf,
  /// Radon-style JSON: path -> [{"complexity": n}, ...]
  #[arg(long)]
  complexity: PathBuf,
  #[arg(long)]
  coverage: Option<PathBuf>,
  #[arg(long)]
  criticality: Option<PathBuf>,
  #[arg(long, default_value_t = 50)]
  top: usize,
  #[command(flatten)]
  weights: WeightArgs,
  #[arg(long)]
  out: PathBuf,
}

#[derive(Args)]
struct OwnershipArgs {
  /// Output of `git log --since=<days>.days --name-only --pretty=format:%ae`
  #[arg(long)]
  log: PathBuf,
  #[arg(long, default_value_t = 90)]
  days: u32,
  #[arg(long, default_value_t = 2)]
  depth: usize,
  #[arg(long, default_value_t = 0.6)]
  threshold: f64,
  #[arg(long)]
  criticality: Option<PathBuf>,
  #[arg(long)]
  out: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
  Deps,
  Services,
}

impl From<ModeArg> for GraphMode {
  fn from(m: ModeArg) -> Self {
    match m {
      ModeArg::Deps => GraphMode::Deps,
      ModeArg::Services => GraphMode::Services,
    }
  }
}

#[derive(Args)]
struct DriftArgs {
  #[arg(long)]
  current: PathBuf,
  #[arg(long)]
  previous: PathBuf,
  #[arg(long, default_value_t = 0.1)]
  threshold: f64,
  #[arg(long, value_enum, default_value_t = ModeArg::Deps)]
  mode: ModeArg,
  #[arg(long)]
  out: PathBuf,
}

#[derive(Args)]
struct ScanArgs {
  #[arg(long)]
  input: PathBuf,
  #[arg(long)]
  out: PathBuf,
}

#[derive(Args)]
struct ConsolidateArgs {
  #[arg(long)]
  hotspots: Option<PathBuf>,
  #[arg(long)]
  drift: Option<PathBuf>,
  #[arg(long)]
  ownership: Option<PathBuf>,
  #[arg(long)]
  security: Option<PathBuf>,
  #[arg(long)]
  out: PathBuf,
}

fn main() -> ExitCode {
  // Logs go to stderr; stdout carries only JSON summaries.
  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let cli = Cli::parse();
  match run(cli.command) {
    Ok(code) => code,
    Err(e) => {
      error!("{:#}", e);
      ExitCode::FAILURE
    }
  }
}

fn run(command: Command) -> Result<ExitCode> {
  match command {
    Command::Hotspots(args) => hotspots(args),
    Command::Ownership(args) => ownership(args),
    Command::Drift(args) => drift(args),
    Command::Trivy(args) => scan(Scanner::Trivy, args),
    Command::Semgrep(args) => scan(Scanner::Semgrep, args),
    Command::Consolidate(args) => consolidate(args),
  }
}

fn hotspots(args: HotspotArgs) -> Result<ExitCode> {
  let engine = Engine::new(Config {
    weight_churn: args.weights.w_churn,
    weight_complexity: args.weights.w_complexity,
    weight_coverage: args.weights.w_coverage,
    weight_criticality: args.weights.w_criticality,
    top_n: args.top,
    ..Config::default()
  })?;

  let churn = input::parse_churn(&input::read_text(&args.churn)?)
    .with_context(|| format!("loading churn from {}", args.churn.display()))?;
  let complexity = input::parse_complexity(&input::read_text(&args.complexity)?)
    .with_context(|| format!("loading complexity from {}", args.complexity.display()))?;
  let coverage = match &args.coverage {
    Some(p) => input::parse_coverage(&input::read_text(p)?)?,
    None => IndexMap::new(),
  };
  let criticality = match &args.criticality {
    Some(p) => input::parse_criticality(&input::read_text(p)?)?,
    None => IndexMap::new(),
  };

  let report = engine.rank_hotspots(&HotspotInputs {
    churn,
    complexity,
    coverage,
    criticality,
  })?;
  input::write_json(&args.out, &report)?;
  Ok(ExitCode::SUCCESS)
}

fn ownership(args: OwnershipArgs) -> Result<ExitCode> {
  let engine = Engine::new(Config {
    time_window_days: args.days,
    directory_depth: args.depth,
    concentration_threshold: args.threshold,
    ..Config::default()
  })?;

  let entries = risk_register::ownership::parse_log(&input::read_text(&args.log)?);
  let criticality = match &args.criticality {
    Some(p) => input::parse_criticality(&input::read_text(p)?)?,
    None => IndexMap::new(),
  };

  let report = engine.analyze_ownership(&entries, &criticality);
  input::write_json(&args.out, &report)?;
  println!("{}", serde_json::to_string_pretty(&report.summary)?);
  Ok(ExitCode::SUCCESS)
}

fn drift(args: DriftArgs) -> Result<ExitCode> {
  let engine = Engine::new(Config {
    drift_threshold: args.threshold,
    graph_mode: args.mode.into(),
    ..Config::default()
  })?;

  let previous: GraphSnapshot = input::read_json(&args.previous)?;
  let current: GraphSnapshot = input::read_json(&args.current)?;
  let outcome = engine.detect_drift(&previous, &current)?;

  input::write_json(&args.out, outcome.report())?;
  println!("{}", serde_json::to_string_pretty(&outcome.report().summary)?);
  if outcome.is_breach() {
    Ok(ExitCode::from(DRIFT_BREACH_EXIT))
  } else {
    Ok(ExitCode::SUCCESS)
  }
}

fn scan(scanner: Scanner, args: ScanArgs) -> Result<ExitCode> {
  let engine = Engine::with_defaults();
  let findings = match input::read_text(&args.input) {
    Ok(raw) => engine.normalize_findings(scanner, &raw),
    Err(e) => {
      warn!(scanner = scanner.name(), error = %e, "could not read scanner output; emitting no findings");
      Vec::new()
    }
  };
  input::write_json(&args.out, &findings)?;
  Ok(ExitCode::SUCCESS)
}

fn consolidate(args: ConsolidateArgs) -> Result<ExitCode> {
  let engine = Engine::with_defaults();
  let inputs = ConsolidationInputs {
    hotspots: input::read_optional_json(args.hotspots.as_deref())?,
    drift: input::read_optional_json(args.drift.as_deref())?,
    ownership: input::read_optional_json(args.ownership.as_deref())?,
    security: input::read_optional_json(args.security.as_deref())?,
  };
  let register = engine.consolidate(&inputs)?;
  input::write_json(&args.out, &register)?;
  Ok(ExitCode::SUCCESS)
}
