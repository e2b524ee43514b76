//! Markdown depth from the sell-through gap at the mid-season checkpoint.

use serde::{Deserialize, Serialize};

use crate::domain::{EngineError, Result};
use crate::obs;
use crate::policy::{check_unit_interval, SeasonPolicy};

pub const DEFAULT_ELASTICITY: f64 = 2.0;
/// Markdowns are quoted in steps of this many percentage points.
pub const MARKDOWN_STEP_POINTS: u8 = 5;
pub const MAX_MARKDOWN_POINTS: u8 = 40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownResult {
    pub current_sell_through: f64,
    pub target_sell_through: f64,
    pub elasticity: f64,
    /// `max(0, target - current)`.
    pub gap: f64,
    /// `gap * elasticity` before rounding and capping.
    pub raw_markdown: f64,
    /// Recommended markdown in whole percentage points, one of 0, 5, ..., 40.
    pub markdown_points: u8,
}

impl MarkdownResult {
    /// Recommended markdown as a fraction (0.15 for 15%).
    pub fn markdown_pct(&self) -> f64 {
        f64::from(self.markdown_points) / 100.0
    }
}

pub fn calculate(
    current_sell_through: f64,
    target_sell_through: f64,
    elasticity: f64,
) -> Result<MarkdownResult> {
    check_unit_interval("current_sell_through", current_sell_through)?;
    check_unit_interval("target_sell_through", target_sell_through)?;
    if !elasticity.is_finite() || elasticity < 0.0 {
        return Err(EngineError::invalid(
            "elasticity",
            format!("must be finite and non-negative, got {elasticity}"),
        ));
    }

    let gap = (target_sell_through - current_sell_through).max(0.0);
    let raw_markdown = gap * elasticity;
    let step = f64::from(MARKDOWN_STEP_POINTS);
    let rounded = ((raw_markdown * 100.0) / step).round() * step;
    let markdown_points = rounded.min(f64::from(MAX_MARKDOWN_POINTS)) as u8;

    Ok(MarkdownResult {
        current_sell_through,
        target_sell_through,
        elasticity,
        gap,
        raw_markdown,
        markdown_points,
    })
}

/// Run [`calculate`] against the policy target, but only at the checkpoint week.
pub fn evaluate_checkpoint(
    policy: &SeasonPolicy,
    current_week: usize,
    current_sell_through: f64,
    elasticity: f64,
) -> Result<Option<MarkdownResult>> {
    if current_week != policy.markdown_checkpoint_week {
        return Ok(None);
    }
    let result = calculate(
        current_sell_through,
        policy.markdown_target_sell_through,
        elasticity,
    )?;
    obs::emit_markdown_recommended(current_week, result.gap, result.markdown_points);
    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mid_season_gap() {
        let r = calculate(0.52, 0.60, DEFAULT_ELASTICITY).unwrap();
        assert!((r.gap - 0.08).abs() < 1e-12);
        assert_eq!(r.markdown_points, 15);
        assert!((r.markdown_pct() - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_ahead_of_target_is_zero() {
        let r = calculate(0.75, 0.60, DEFAULT_ELASTICITY).unwrap();
        assert_eq!(r.gap, 0.0);
        assert_eq!(r.markdown_points, 0);
    }

    #[test]
    fn test_capped_at_forty() {
        let r = calculate(0.0, 1.0, 5.0).unwrap();
        assert_eq!(r.markdown_points, MAX_MARKDOWN_POINTS);
    }

    #[test]
    fn test_rejects_negative_elasticity() {
        assert!(calculate(0.5, 0.6, -1.0).is_err());
        assert!(calculate(1.5, 0.6, 2.0).is_err());
    }

    #[test]
    fn test_checkpoint_only_fires_on_its_week() {
        let policy = SeasonPolicy::default();
        assert!(evaluate_checkpoint(&policy, 5, 0.4, DEFAULT_ELASTICITY)
            .unwrap()
            .is_none());
        let fired = evaluate_checkpoint(&policy, 6, 0.4, DEFAULT_ELASTICITY)
            .unwrap()
            .unwrap();
        assert_eq!(fired.markdown_points, 40);
    }
}
