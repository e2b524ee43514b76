//! Structured events for the planning lifecycle.
//!
//! Every planner reports through the `emit_*` helpers below so the event
//! names stay in one place. Set `RUST_LOG=seasonplan_core=debug` for the
//! per-layer detail, or pass `--json` to the CLI for machine-readable lines.

use tracing::{info, warn};

use crate::domain::ClusterTier;
use crate::reallocate::ReallocationStrategy;
use crate::variance::{TrendDirection, VarianceSeverity};

/// RAII guard that tags every event of one season with its id.
///
/// ```ignore
/// let _span = SeasonSpan::enter("fw26-knitwear");
/// ```
pub struct SeasonSpan {
    _span: tracing::span::EnteredSpan,
}

impl SeasonSpan {
    pub fn enter(season_id: &str) -> Self {
        let span = tracing::info_span!("seasonplan.season", season_id = %season_id);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_season_opened(stores: usize, horizon: usize, forecast_total: f64) {
    info!(
        event = "season.opened",
        stores = stores,
        horizon = horizon,
        forecast_total = forecast_total,
    );
}

/// Emit event: allocation plan produced and conserved at every layer.
pub fn emit_allocation_completed(
    manufacturing_qty: u64,
    initial_total: u64,
    dc_holdback_qty: u64,
    stores: usize,
) {
    info!(
        event = "allocation.completed",
        manufacturing_qty = manufacturing_qty,
        initial_total = initial_total,
        dc_holdback_qty = dc_holdback_qty,
        stores = stores,
    );
}

/// Emit event: a cluster cannot cover the summed store minimums.
pub fn emit_minimum_shortfall(tier: ClusterTier, required: u64, cluster_total: u64) {
    warn!(
        event = "allocation.minimum_shortfall",
        tier = %tier,
        required = required,
        cluster_total = cluster_total,
    );
}

/// Emit event: the DC held less than a pass asked for.
pub fn emit_dc_shortfall(pass: &str, requested: u64, available: u64) {
    warn!(
        event = "dc.shortfall",
        pass = %pass,
        requested = requested,
        available = available,
    );
}

pub fn emit_variance_evaluated(
    weeks_observed: usize,
    variance_pct: f64,
    trend: TrendDirection,
    severity: VarianceSeverity,
    should_reforecast: bool,
) {
    info!(
        event = "variance.evaluated",
        weeks_observed = weeks_observed,
        variance_pct = variance_pct,
        trend = ?trend,
        severity = ?severity,
        should_reforecast = should_reforecast,
    );
}

/// Emit event: a new forecast revision was derived from actuals.
pub fn emit_reforecast_applied(revision: u32, ratio: f64, prior_weight: f64, confidence: f64) {
    info!(
        event = "reforecast.applied",
        revision = revision,
        adjustment_ratio = ratio,
        prior_weight = prior_weight,
        confidence = confidence,
    );
}

pub fn emit_forecast_rolled_back(restored_revision: u32, new_revision: u32) {
    info!(
        event = "forecast.rolled_back",
        restored_revision = restored_revision,
        new_revision = new_revision,
    );
}

pub fn emit_reallocation_recommended(
    current_week: usize,
    strategy: ReallocationStrategy,
    transfers: usize,
    units_moved: u64,
    unmet_need: u64,
) {
    info!(
        event = "reallocation.recommended",
        current_week = current_week,
        strategy = ?strategy,
        transfers = transfers,
        units_moved = units_moved,
        unmet_need = unmet_need,
    );
}

pub fn emit_markdown_recommended(week: usize, gap: f64, markdown_points: u8) {
    info!(
        event = "markdown.recommended",
        week = week,
        gap = gap,
        markdown_points = markdown_points,
    );
}
