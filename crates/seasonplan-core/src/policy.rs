//! Season policy supplied by the surrounding planning layer.

use serde::{Deserialize, Serialize};

use crate::domain::{EngineError, Result};

/// Whether stores are topped up from the DC during the season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplenishmentStrategy {
    /// No ongoing replenishment; stores live off the initial allocation.
    None,
    /// Weekly top-ups against next week's forecast.
    #[default]
    Weekly,
}

/// Policy options recognized by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonPolicy {
    /// Manufacturing buffer above forecast (0.0-1.0).
    pub safety_stock_pct: f64,
    /// Fraction of manufactured units held back at the DC (0.0-1.0).
    pub dc_holdback_pct: f64,
    pub replenishment_strategy: ReplenishmentStrategy,
    /// 0-based week at which the markdown check runs.
    pub markdown_checkpoint_week: usize,
    /// Sell-through the season should reach by the checkpoint (0.0-1.0).
    pub markdown_target_sell_through: f64,
    /// Baseline |variance| that triggers a reforecast (0.0-1.0).
    pub variance_magnitude_baseline: f64,
}

impl Default for SeasonPolicy {
    fn default() -> Self {
        Self {
            safety_stock_pct: 0.20,
            dc_holdback_pct: 0.45,
            replenishment_strategy: ReplenishmentStrategy::Weekly,
            markdown_checkpoint_week: 6,
            markdown_target_sell_through: 0.60,
            variance_magnitude_baseline: 0.20,
        }
    }
}

impl SeasonPolicy {
    /// Reject values outside their documented ranges.
    pub fn validate(&self) -> Result<()> {
        check_unit_interval("safety_stock_pct", self.safety_stock_pct)?;
        check_unit_interval("dc_holdback_pct", self.dc_holdback_pct)?;
        check_unit_interval(
            "markdown_target_sell_through",
            self.markdown_target_sell_through,
        )?;
        check_unit_interval(
            "variance_magnitude_baseline",
            self.variance_magnitude_baseline,
        )?;
        if self.variance_magnitude_baseline == 0.0 {
            return Err(EngineError::invalid(
                "variance_magnitude_baseline",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Reject NaN and values outside [0, 1].
pub(crate) fn check_unit_interval(parameter: &'static str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(EngineError::invalid(
            parameter,
            format!("must be within [0, 1], got {value}"),
        ));
    }
    Ok(())
}
