//! Seasonplan CLI
//!
//! The `seasonplan` command runs the planning engine over JSON inputs and
//! prints the resulting records as pretty JSON on stdout.
//!
//! ## Commands
//!
//! - `segment`: Cluster stores into performance tiers
//! - `allocate`: Build the manufacturing, DC and store allocation plan
//! - `replenish`: Plan next week's store top-ups from the DC
//! - `variance`: Compare actuals with the forecast and decide on a reforecast
//! - `reforecast`: Blend actuals into a revised forecast
//! - `reallocate`: Recommend mid-season transfers
//! - `markdown`: Markdown depth from the sell-through gap

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use seasonplan_core::{
    allocate, analyze_variance, calculate_markdown, plan_week, recommend_reallocation, reforecast,
    segment, AllocationPlan, ClusterAssignment, ClusterSummary, ClusterTier, DcPool,
    EngineWarning, ForecastVector, InventoryState, MarkdownResult, PosteriorReforecast,
    ReallocationAnalysis, ReallocationConfig, ReplenishmentPlan, SeasonPolicy, SegmenterConfig,
    StoreActuals, StoreId, StorePosition, StoreRecord, VarianceReport, VarianceThresholds,
    DEFAULT_ELASTICITY, METRICS,
};

#[derive(Parser)]
#[command(name = "seasonplan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Seasonal allocation and adaptive forecasting engine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by every command that needs the baseline plan.
#[derive(clap::Args, Debug, Clone)]
struct PlanArgs {
    /// Store records (JSON array)
    #[arg(long)]
    stores: PathBuf,

    /// Category forecast (JSON: {"weekly": [...], "error_estimate": 0.12})
    #[arg(long)]
    forecast: PathBuf,

    /// Season policy (.json or .toml); defaults apply when omitted
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Seed for store segmentation
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster stores into premium, mainstream and value tiers
    Segment {
        /// Store records (JSON array)
        #[arg(long)]
        stores: PathBuf,

        /// Seed for store segmentation
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Build the allocation plan for a season
    Allocate {
        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Plan DC top-ups for the week after --week
    Replenish {
        #[command(flatten)]
        plan: PlanArgs,

        /// Store inventories (JSON array)
        #[arg(long)]
        inventory: PathBuf,

        /// Current 0-based week
        #[arg(long)]
        week: usize,

        /// Uncommitted DC units (default: the plan's holdback)
        #[arg(long)]
        dc_available: Option<u64>,
    },

    /// Evaluate season-to-date variance and the reforecast decision
    Variance {
        /// Category forecast (JSON)
        #[arg(long)]
        forecast: PathBuf,

        /// Observed weekly demand (JSON array of numbers)
        #[arg(long)]
        actuals: PathBuf,

        /// Season policy (.json or .toml)
        #[arg(long)]
        policy: Option<PathBuf>,
    },

    /// Blend observed demand into a revised forecast
    Reforecast {
        /// Category forecast (JSON)
        #[arg(long)]
        forecast: PathBuf,

        /// Observed weekly demand (JSON array of numbers)
        #[arg(long)]
        actuals: PathBuf,
    },

    /// Recommend transfers toward fast-selling stores
    Reallocate {
        #[command(flatten)]
        plan: PlanArgs,

        /// Per-store sales and stock (JSON array)
        #[arg(long)]
        store_actuals: PathBuf,

        /// Completed weeks so far
        #[arg(long)]
        week: usize,

        /// Uncommitted DC units (default: the plan's holdback)
        #[arg(long)]
        dc_available: Option<u64>,
    },

    /// Markdown depth for the current sell-through
    Markdown {
        /// Season-to-date sell-through (0.0-1.0)
        #[arg(long)]
        current: f64,

        /// Target sell-through (default: the policy target)
        #[arg(long)]
        target: Option<f64>,

        /// Price elasticity
        #[arg(long, default_value_t = DEFAULT_ELASTICITY)]
        elasticity: f64,

        /// Season policy (.json or .toml)
        #[arg(long)]
        policy: Option<PathBuf>,
    },
}

/// Forecast file layout.
#[derive(Debug, Deserialize)]
struct ForecastInput {
    weekly: Vec<f64>,
    #[serde(default)]
    error_estimate: f64,
}

#[derive(Debug, Serialize)]
struct SegmentOutput<'a> {
    silhouette: f64,
    low_quality: bool,
    clusters: &'a [ClusterSummary],
    assignments: &'a BTreeMap<StoreId, ClusterTier>,
    warnings: &'a [EngineWarning],
}

impl<'a> From<&'a ClusterAssignment> for SegmentOutput<'a> {
    fn from(a: &'a ClusterAssignment) -> Self {
        Self {
            silhouette: a.silhouette,
            low_quality: a.low_quality,
            clusters: &a.clusters,
            assignments: &a.assignments,
            warnings: &a.warnings,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    seasonplan_core::init_tracing(cli.json, level);
    info!(version = seasonplan_core::VERSION, "seasonplan starting");

    let output = run(cli.command)?;
    println!("{output}");
    METRICS.flush();
    Ok(())
}

fn run(command: Commands) -> Result<String> {
    match command {
        Commands::Segment { stores, seed } => {
            let assignment = cmd_segment(&stores, seed)?;
            to_json(&SegmentOutput::from(&assignment))
        }
        Commands::Allocate { plan } => to_json(&cmd_allocate(&plan)?),
        Commands::Replenish {
            plan,
            inventory,
            week,
            dc_available,
        } => to_json(&cmd_replenish(&plan, &inventory, week, dc_available)?),
        Commands::Variance {
            forecast,
            actuals,
            policy,
        } => to_json(&cmd_variance(&forecast, &actuals, policy.as_deref())?),
        Commands::Reforecast { forecast, actuals } => {
            to_json(&cmd_reforecast(&forecast, &actuals)?)
        }
        Commands::Reallocate {
            plan,
            store_actuals,
            week,
            dc_available,
        } => to_json(&cmd_reallocate(&plan, &store_actuals, week, dc_available)?),
        Commands::Markdown {
            current,
            target,
            elasticity,
            policy,
        } => to_json(&cmd_markdown(current, target, elasticity, policy.as_deref())?),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

/// Load a policy from `.toml` or `.json`, falling back to defaults.
fn load_policy(path: Option<&Path>) -> Result<SeasonPolicy> {
    let policy: SeasonPolicy = match path {
        None => SeasonPolicy::default(),
        Some(path) if path.extension().is_some_and(|e| e == "toml") => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read policy file: {:?}", path))?;
            toml::from_str(&content).with_context(|| format!("Invalid TOML in {:?}", path))?
        }
        Some(path) => read_json_file(path)?,
    };
    policy.validate()?;
    Ok(policy)
}

fn load_forecast(path: &Path) -> Result<ForecastVector> {
    let input: ForecastInput = read_json_file(path)?;
    Ok(ForecastVector::new(input.weekly, input.error_estimate)?)
}

fn cmd_segment(stores: &Path, seed: u64) -> Result<ClusterAssignment> {
    let stores: Vec<StoreRecord> = read_json_file(stores)?;
    let config = SegmenterConfig {
        seed,
        ..SegmenterConfig::default()
    };
    Ok(segment(&stores, &config)?)
}

fn cmd_allocate(args: &PlanArgs) -> Result<AllocationPlan> {
    let policy = load_policy(args.policy.as_deref())?;
    let stores: Vec<StoreRecord> = read_json_file(&args.stores)?;
    let forecast = load_forecast(&args.forecast)?;
    let config = SegmenterConfig {
        seed: args.seed,
        ..SegmenterConfig::default()
    };
    let assignment = segment(&stores, &config)?;
    let plan = allocate(&forecast, &policy, &assignment, &stores)?;
    Ok(plan)
}

fn cmd_replenish(
    args: &PlanArgs,
    inventory: &Path,
    week: usize,
    dc_available: Option<u64>,
) -> Result<ReplenishmentPlan> {
    let policy = load_policy(args.policy.as_deref())?;
    let plan = cmd_allocate(args)?;
    let forecast = load_forecast(&args.forecast)?;
    let inventories: Vec<InventoryState> = read_json_file(inventory)?;
    let positions = StorePosition::from_plan(&plan, &inventories);
    let mut dc = DcPool::new(dc_available.unwrap_or(plan.dc_holdback_qty));
    Ok(plan_week(
        &positions,
        &forecast,
        week,
        &mut dc,
        policy.replenishment_strategy,
    )?)
}

fn cmd_variance(forecast: &Path, actuals: &Path, policy: Option<&Path>) -> Result<VarianceReport> {
    let policy = load_policy(policy)?;
    let forecast = load_forecast(forecast)?;
    let actuals: Vec<f64> = read_json_file(actuals)?;
    let weeks_remaining = forecast.horizon().saturating_sub(actuals.len());
    Ok(analyze_variance(
        &forecast,
        &actuals,
        weeks_remaining,
        &VarianceThresholds::from_policy(&policy),
    )?)
}

fn cmd_reforecast(forecast: &Path, actuals: &Path) -> Result<PosteriorReforecast> {
    let forecast = load_forecast(forecast)?;
    let actuals: Vec<f64> = read_json_file(actuals)?;
    Ok(reforecast(&forecast, &actuals)?)
}

fn cmd_reallocate(
    args: &PlanArgs,
    store_actuals: &Path,
    week: usize,
    dc_available: Option<u64>,
) -> Result<ReallocationAnalysis> {
    let plan = cmd_allocate(args)?;
    let actuals: Vec<StoreActuals> = read_json_file(store_actuals)?;
    let mut dc = DcPool::new(dc_available.unwrap_or(plan.dc_holdback_qty));
    Ok(recommend_reallocation(
        &plan,
        &actuals,
        &mut dc,
        week,
        &ReallocationConfig::default(),
    )?)
}

fn cmd_markdown(
    current: f64,
    target: Option<f64>,
    elasticity: f64,
    policy: Option<&Path>,
) -> Result<MarkdownResult> {
    let target = match target {
        Some(t) => t,
        None => load_policy(policy)?.markdown_target_sell_through,
    };
    Ok(calculate_markdown(current, target, elasticity)?)
}
