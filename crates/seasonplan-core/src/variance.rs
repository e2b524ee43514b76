//! Forecast-versus-actual variance and the reforecast decision table.
//!
//! [`should_reforecast`] is a pure function of `(variance_pct, trend,
//! weeks_remaining)` plus thresholds. Identical inputs always give the same
//! verdict, and any narrative around the verdict is built from the returned
//! record afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EngineError, ForecastVector, Result};
use crate::obs;
use crate::policy::SeasonPolicy;

/// Direction of the per-week deviation over the trend window.
///
/// The deviation is oriented by the sign of the overall variance, so
/// `Increasing` means actuals are drifting further from the forecast in the
/// direction they already miss it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
    /// Fewer than two comparable weeks observed.
    Undetermined,
}

/// Qualitative size of the variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceSeverity {
    Low,
    Moderate,
    High,
    Critical,
}

impl VarianceSeverity {
    /// Bucket an absolute variance: <10% low, <20% moderate, <35% high.
    pub fn classify(variance_pct: f64) -> Self {
        let magnitude = variance_pct.abs();
        if magnitude < 0.10 {
            Self::Low
        } else if magnitude < 0.20 {
            Self::Moderate
        } else if magnitude < 0.35 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

/// Which row of the decision table produced the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Too few weeks left for a correction to matter.
    LateSeasonSuppressed,
    BelowThreshold,
    Triggered,
}

/// Verdict of the reforecast decision table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReforecastDecision {
    pub should_reforecast: bool,
    /// Magnitude threshold after the trend adjustment.
    pub effective_threshold: f64,
    pub reason: DecisionReason,
}

/// Thresholds for trend detection and the reforecast decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarianceThresholds {
    /// |variance| that triggers a reforecast when the trend is unknown.
    pub magnitude_baseline: f64,
    /// Slope (variance points per week) treated as flat.
    pub trend_dead_band: f64,
    /// Most recent weeks used for the trend slope.
    pub trend_window: usize,
    /// Reforecasts are suppressed when fewer weeks than this remain.
    pub min_weeks_remaining: usize,
    pub increasing_multiplier: f64,
    pub stable_multiplier: f64,
    pub decreasing_multiplier: f64,
}

impl Default for VarianceThresholds {
    fn default() -> Self {
        Self {
            magnitude_baseline: 0.20,
            trend_dead_band: 0.02,
            trend_window: 3,
            min_weeks_remaining: 3,
            increasing_multiplier: 0.75,
            stable_multiplier: 1.10,
            decreasing_multiplier: 1.25,
        }
    }
}

impl VarianceThresholds {
    pub fn from_policy(policy: &SeasonPolicy) -> Self {
        Self {
            magnitude_baseline: policy.variance_magnitude_baseline,
            ..Self::default()
        }
    }

    /// Magnitude threshold for a given trend.
    pub fn threshold_for(&self, trend: TrendDirection) -> f64 {
        let multiplier = match trend {
            TrendDirection::Increasing => self.increasing_multiplier,
            TrendDirection::Stable => self.stable_multiplier,
            TrendDirection::Decreasing => self.decreasing_multiplier,
            TrendDirection::Undetermined => 1.0,
        };
        self.magnitude_baseline * multiplier
    }
}

/// The reforecast decision table.
///
/// | weeks_remaining       | trend        | triggers when \|variance\| >= |
/// |-----------------------|--------------|-------------------------------|
/// | < min_weeks_remaining | any          | never                         |
/// | otherwise             | increasing   | baseline x 0.75               |
/// | otherwise             | undetermined | baseline                      |
/// | otherwise             | stable       | baseline x 1.10               |
/// | otherwise             | decreasing   | baseline x 1.25               |
pub fn should_reforecast(
    variance_pct: f64,
    trend: TrendDirection,
    weeks_remaining: usize,
    thresholds: &VarianceThresholds,
) -> ReforecastDecision {
    let effective_threshold = thresholds.threshold_for(trend);
    let reason = if weeks_remaining < thresholds.min_weeks_remaining {
        DecisionReason::LateSeasonSuppressed
    } else if variance_pct.is_finite() && variance_pct.abs() >= effective_threshold {
        DecisionReason::Triggered
    } else {
        DecisionReason::BelowThreshold
    };
    ReforecastDecision {
        should_reforecast: reason == DecisionReason::Triggered,
        effective_threshold,
        reason,
    }
}

/// Least-squares slope of `ys` against 0, 1, 2, ...
fn slope(ys: &[f64]) -> f64 {
    let n = ys.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = ys.iter().sum::<f64>() / n;
    let (num, den) = ys
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Classify the slope of the last `window` oriented per-week variances.
pub fn trend_direction(
    weekly_variance: &[f64],
    orientation: f64,
    thresholds: &VarianceThresholds,
) -> TrendDirection {
    let window = thresholds.trend_window.max(2);
    let start = weekly_variance.len().saturating_sub(window);
    let recent: Vec<f64> = weekly_variance[start..]
        .iter()
        .map(|v| v * orientation)
        .collect();
    if recent.len() < 2 {
        return TrendDirection::Undetermined;
    }
    let s = slope(&recent);
    if s > thresholds.trend_dead_band {
        TrendDirection::Increasing
    } else if s < -thresholds.trend_dead_band {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

/// Weekly variance verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceReport {
    pub forecast_revision: u32,
    pub weeks_observed: usize,
    pub weeks_remaining: usize,
    pub actual_total: f64,
    pub forecast_total: f64,
    /// `(actual - forecast) / forecast` over the observed weeks.
    pub variance_pct: f64,
    /// Per-week variance; `None` where the week's forecast is zero.
    pub weekly_variance: Vec<Option<f64>>,
    pub trend_direction: TrendDirection,
    pub severity: VarianceSeverity,
    pub should_reforecast: bool,
    pub decision: ReforecastDecision,
    /// Ratio of actuals to forecast, a first guess at the demand correction.
    pub adjustment_hint: f64,
    pub evaluated_at: DateTime<Utc>,
}

/// Compare `actuals` for the first weeks of the season with `forecast`.
pub fn analyze(
    forecast: &ForecastVector,
    actuals: &[f64],
    weeks_remaining: usize,
    thresholds: &VarianceThresholds,
) -> Result<VarianceReport> {
    validate_actuals(forecast, actuals)?;
    let weeks_observed = actuals.len();
    let forecast_total = forecast.sum_first(weeks_observed);
    if forecast_total <= 0.0 {
        return Err(EngineError::invalid(
            "forecast",
            format!("forecast for the first {weeks_observed} weeks sums to zero"),
        ));
    }
    let actual_total: f64 = actuals.iter().sum();
    let variance_pct = (actual_total - forecast_total) / forecast_total;

    let weekly_variance: Vec<Option<f64>> = forecast
        .weekly()
        .iter()
        .zip(actuals)
        .map(|(&f, &a)| (f > 0.0).then(|| (a - f) / f))
        .collect();
    let comparable: Vec<f64> = weekly_variance.iter().flatten().copied().collect();
    let orientation = if variance_pct < 0.0 { -1.0 } else { 1.0 };
    let trend = trend_direction(&comparable, orientation, thresholds);
    let decision = should_reforecast(variance_pct, trend, weeks_remaining, thresholds);
    let severity = VarianceSeverity::classify(variance_pct);
    obs::emit_variance_evaluated(
        weeks_observed,
        variance_pct,
        trend,
        severity,
        decision.should_reforecast,
    );

    Ok(VarianceReport {
        forecast_revision: forecast.revision,
        weeks_observed,
        weeks_remaining,
        actual_total,
        forecast_total,
        variance_pct,
        weekly_variance,
        trend_direction: trend,
        severity,
        should_reforecast: decision.should_reforecast,
        decision,
        adjustment_hint: actual_total / forecast_total,
        evaluated_at: Utc::now(),
    })
}

pub(crate) fn validate_actuals(forecast: &ForecastVector, actuals: &[f64]) -> Result<()> {
    if actuals.is_empty() {
        return Err(EngineError::invalid(
            "actuals",
            "at least one observed week is required",
        ));
    }
    if actuals.len() > forecast.horizon() {
        return Err(EngineError::invalid(
            "actuals",
            format!(
                "{} observed weeks exceed the {}-week horizon",
                actuals.len(),
                forecast.horizon()
            ),
        ));
    }
    if let Some((week, v)) = actuals
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        return Err(EngineError::invalid(
            "actuals",
            format!("week {week} has invalid sales {v}"),
        ));
    }
    Ok(())
}
