//! Week-indexed demand forecast.
//!
//! A [`ForecastVector`] is immutable once built. A reforecast produces a new
//! vector with the next revision number; the previous one stays in the
//! season's history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::{EngineError, Result};

/// Where a forecast revision came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForecastSource {
    /// Supplied by the upstream ensemble forecaster.
    Upstream,
    /// Produced by the posterior reforecaster from an earlier revision.
    Reforecast { parent_revision: u32 },
    /// Copy of an earlier revision restored by a rollback.
    Rollback { restored_revision: u32 },
}

/// Per-week category demand with an uncertainty estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastVector {
    pub revision: u32,
    pub source: ForecastSource,
    weekly: Vec<f64>,
    total: f64,
    /// Relative error estimate, e.g. trailing MAPE (0.12 = 12%).
    pub error_estimate: f64,
    pub created_at: DateTime<Utc>,
}

impl ForecastVector {
    /// Build the initial upstream forecast (revision 0).
    pub fn new(weekly: Vec<f64>, error_estimate: f64) -> Result<Self> {
        Self::build(weekly, error_estimate, 0, ForecastSource::Upstream)
    }

    pub(crate) fn build(
        weekly: Vec<f64>,
        error_estimate: f64,
        revision: u32,
        source: ForecastSource,
    ) -> Result<Self> {
        if weekly.is_empty() {
            return Err(EngineError::invalid(
                "forecast.weekly",
                "horizon must contain at least one week",
            ));
        }
        if let Some((week, v)) = weekly
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(EngineError::invalid(
                "forecast.weekly",
                format!("week {week} has invalid demand {v}"),
            ));
        }
        if !error_estimate.is_finite() || error_estimate < 0.0 {
            return Err(EngineError::invalid(
                "forecast.error_estimate",
                format!("must be a non-negative finite number, got {error_estimate}"),
            ));
        }
        let total = weekly.iter().sum();
        Ok(Self {
            revision,
            source,
            weekly,
            total,
            error_estimate,
            created_at: Utc::now(),
        })
    }

    pub fn weekly(&self) -> &[f64] {
        &self.weekly
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn horizon(&self) -> usize {
        self.weekly.len()
    }

    /// Demand for a 0-based week, `None` past the horizon.
    pub fn week(&self, index: usize) -> Option<f64> {
        self.weekly.get(index).copied()
    }

    /// Sum of the first `weeks` weeks.
    pub fn sum_first(&self, weeks: usize) -> f64 {
        self.weekly.iter().take(weeks).sum()
    }

    /// Hex SHA-256 over the weekly values and the error estimate.
    ///
    /// Two revisions with identical numbers share a digest regardless of
    /// revision number or timestamp.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for v in &self.weekly {
            hasher.update(v.to_bits().to_le_bytes());
        }
        hasher.update(self.error_estimate.to_bits().to_le_bytes());
        hex::encode(hasher.finalize())
    }
}
