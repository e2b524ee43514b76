//! One season's planning state: baseline plan, forecast history and DC stock.
//!
//! The [`SeasonLedger`] is append-only. Reforecasts and rollbacks both add a
//! new revision, so every variance report can be traced back to the exact
//! forecast it was evaluated against.

use serde::{Deserialize, Serialize};

use crate::allocate::allocate;
use crate::domain::{
    AllocationPlan, DcPool, EngineError, ForecastSource, ForecastVector, InventoryState, Result,
    StoreRecord,
};
use crate::markdown::{self, MarkdownResult};
use crate::obs::{self, SeasonSpan};
use crate::policy::SeasonPolicy;
use crate::reallocate::{self, ReallocationAnalysis, ReallocationConfig, StoreActuals};
use crate::reforecast::{reforecast, PosteriorReforecast};
use crate::replenish::{plan_week, ReplenishmentPlan, StorePosition};
use crate::segment::{segment, ClusterAssignment, SegmenterConfig};
use crate::variance::{analyze, VarianceReport, VarianceThresholds};

/// Append-only forecast and variance history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonLedger {
    forecasts: Vec<ForecastVector>,
    variance_reports: Vec<VarianceReport>,
}

impl SeasonLedger {
    pub fn new(baseline: ForecastVector) -> Self {
        Self {
            forecasts: vec![baseline],
            variance_reports: Vec::new(),
        }
    }

    /// Latest forecast revision.
    pub fn current_forecast(&self) -> &ForecastVector {
        // `new` seeds one entry and nothing removes entries.
        &self.forecasts[self.forecasts.len() - 1]
    }

    pub fn forecast(&self, revision: u32) -> Option<&ForecastVector> {
        self.forecasts.iter().find(|f| f.revision == revision)
    }

    pub fn forecasts(&self) -> &[ForecastVector] {
        &self.forecasts
    }

    pub fn variance_reports(&self) -> &[VarianceReport] {
        &self.variance_reports
    }

    pub fn record_variance(&mut self, report: VarianceReport) {
        self.variance_reports.push(report);
    }

    /// Append the next revision.
    pub fn revise(&mut self, vector: ForecastVector) -> Result<u32> {
        let expected = self.current_forecast().revision + 1;
        if vector.revision != expected {
            return Err(EngineError::invalid(
                "revision",
                format!("expected revision {expected}, got {}", vector.revision),
            ));
        }
        self.forecasts.push(vector);
        Ok(expected)
    }

    /// Restore an earlier revision by appending a copy of it.
    pub fn rollback_to(&mut self, revision: u32) -> Result<&ForecastVector> {
        let target = self.forecast(revision).ok_or_else(|| {
            EngineError::invalid("revision", format!("revision {revision} is not in the ledger"))
        })?;
        let next = self.current_forecast().revision + 1;
        let restored = ForecastVector::build(
            target.weekly().to_vec(),
            target.error_estimate,
            next,
            ForecastSource::Rollback {
                restored_revision: revision,
            },
        )?;
        obs::emit_forecast_rolled_back(revision, next);
        self.forecasts.push(restored);
        Ok(self.current_forecast())
    }
}

/// Everything needed to open a season.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonInputs {
    pub season_id: String,
    #[serde(default)]
    pub policy: SeasonPolicy,
    pub stores: Vec<StoreRecord>,
    pub forecast: ForecastVector,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
}

/// Result of [`Season::evaluate_week`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekEvaluation {
    pub report: VarianceReport,
    /// Present when the report triggered a reforecast.
    pub reforecast: Option<PosteriorReforecast>,
}

#[derive(Debug, Clone)]
pub struct Season {
    id: String,
    policy: SeasonPolicy,
    thresholds: VarianceThresholds,
    assignment: ClusterAssignment,
    plan: AllocationPlan,
    ledger: SeasonLedger,
    dc: DcPool,
}

impl Season {
    /// Segment stores and allocate the baseline forecast.
    pub fn open(inputs: SeasonInputs) -> Result<Self> {
        let _span = SeasonSpan::enter(&inputs.season_id);
        inputs.policy.validate()?;
        let assignment = segment(&inputs.stores, &inputs.segmenter)?;
        let plan = allocate(&inputs.forecast, &inputs.policy, &assignment, &inputs.stores)?;
        obs::emit_season_opened(
            inputs.stores.len(),
            inputs.forecast.horizon(),
            inputs.forecast.total(),
        );
        Ok(Self {
            dc: DcPool::new(plan.dc_holdback_qty),
            thresholds: VarianceThresholds::from_policy(&inputs.policy),
            id: inputs.season_id,
            policy: inputs.policy,
            assignment,
            plan,
            ledger: SeasonLedger::new(inputs.forecast),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn policy(&self) -> &SeasonPolicy {
        &self.policy
    }

    pub fn assignment(&self) -> &ClusterAssignment {
        &self.assignment
    }

    pub fn plan(&self) -> &AllocationPlan {
        &self.plan
    }

    pub fn ledger(&self) -> &SeasonLedger {
        &self.ledger
    }

    pub fn dc(&self) -> &DcPool {
        &self.dc
    }

    pub fn current_forecast(&self) -> &ForecastVector {
        self.ledger.current_forecast()
    }

    /// Evaluate season-to-date `actuals` and reforecast when warranted.
    pub fn evaluate_week(&mut self, actuals: &[f64]) -> Result<WeekEvaluation> {
        let _span = SeasonSpan::enter(&self.id);
        let current = self.ledger.current_forecast();
        let weeks_remaining = current.horizon().saturating_sub(actuals.len());
        let report = analyze(current, actuals, weeks_remaining, &self.thresholds)?;

        let update = if report.should_reforecast {
            Some(reforecast(current, actuals)?)
        } else {
            None
        };
        if let Some(update) = &update {
            self.ledger.revise(update.new_vector.clone())?;
        }
        self.ledger.record_variance(report.clone());
        Ok(WeekEvaluation {
            report,
            reforecast: update,
        })
    }

    /// Top up stores from the DC for the week after `current_week`.
    pub fn plan_replenishment(
        &mut self,
        inventories: &[InventoryState],
        current_week: usize,
    ) -> Result<ReplenishmentPlan> {
        let _span = SeasonSpan::enter(&self.id);
        let positions = StorePosition::from_plan(&self.plan, inventories);
        plan_week(
            &positions,
            self.ledger.current_forecast(),
            current_week,
            &mut self.dc,
            self.policy.replenishment_strategy,
        )
    }

    pub fn recommend_reallocation(
        &mut self,
        actuals: &[StoreActuals],
        current_week: usize,
        config: &ReallocationConfig,
    ) -> Result<ReallocationAnalysis> {
        let _span = SeasonSpan::enter(&self.id);
        reallocate::recommend(&self.plan, actuals, &mut self.dc, current_week, config)
    }

    /// Markdown recommendation, only at the policy's checkpoint week.
    pub fn markdown_checkpoint(
        &self,
        current_week: usize,
        current_sell_through: f64,
    ) -> Result<Option<MarkdownResult>> {
        let _span = SeasonSpan::enter(&self.id);
        markdown::evaluate_checkpoint(
            &self.policy,
            current_week,
            current_sell_through,
            markdown::DEFAULT_ELASTICITY,
        )
    }

    /// Restore an earlier forecast revision.
    pub fn rollback_forecast(&mut self, revision: u32) -> Result<&ForecastVector> {
        let _span = SeasonSpan::enter(&self.id);
        self.ledger.rollback_to(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> SeasonLedger {
        SeasonLedger::new(ForecastVector::new(vec![100.0, 100.0, 100.0], 0.2).unwrap())
    }

    #[test]
    fn test_revise_requires_next_revision() {
        let mut ledger = ledger();
        let skip = ForecastVector::build(
            vec![1.0],
            0.1,
            5,
            ForecastSource::Reforecast { parent_revision: 0 },
        )
        .unwrap();
        assert!(ledger.revise(skip).is_err());

        let next = reforecast(ledger.current_forecast(), &[150.0]).unwrap();
        assert_eq!(ledger.revise(next.new_vector).unwrap(), 1);
        assert_eq!(ledger.forecasts().len(), 2);
    }

    #[test]
    fn test_rollback_appends_copy() {
        let mut ledger = ledger();
        let next = reforecast(ledger.current_forecast(), &[150.0]).unwrap();
        ledger.revise(next.new_vector).unwrap();

        let restored = ledger.rollback_to(0).unwrap().clone();
        assert_eq!(restored.revision, 2);
        assert_eq!(
            restored.source,
            ForecastSource::Rollback {
                restored_revision: 0
            }
        );
        assert_eq!(restored.digest(), ledger.forecast(0).unwrap().digest());
        assert_eq!(ledger.forecasts().len(), 3);
    }

    #[test]
    fn test_rollback_unknown_revision() {
        let mut ledger = ledger();
        assert!(ledger.rollback_to(9).is_err());
        assert_eq!(ledger.forecasts().len(), 1);
    }
}
