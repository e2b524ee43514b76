//! Variance decision table and posterior reforecasting.

use seasonplan_core::{
    analyze_variance, reforecast, should_reforecast, DecisionReason, ForecastSource,
    ForecastVector, TrendDirection, VarianceSeverity, VarianceThresholds,
};

const TRENDS: [TrendDirection; 4] = [
    TrendDirection::Increasing,
    TrendDirection::Stable,
    TrendDirection::Decreasing,
    TrendDirection::Undetermined,
];

#[test]
fn decision_table_is_deterministic() {
    let thresholds = VarianceThresholds::default();
    for trend in TRENDS {
        for weeks_remaining in 0..12 {
            for step in -40..=40 {
                let variance = f64::from(step) / 100.0;
                let a = should_reforecast(variance, trend, weeks_remaining, &thresholds);
                let b = should_reforecast(variance, trend, weeks_remaining, &thresholds);
                assert_eq!(a, b);
            }
        }
    }
}

#[test]
fn late_season_never_reforecasts() {
    let thresholds = VarianceThresholds::default();
    for trend in TRENDS {
        for weeks_remaining in 0..=2 {
            let d = should_reforecast(0.9, trend, weeks_remaining, &thresholds);
            assert!(!d.should_reforecast);
            assert_eq!(d.reason, DecisionReason::LateSeasonSuppressed);
        }
    }
}

#[test]
fn trend_shifts_the_threshold() {
    let thresholds = VarianceThresholds::default();
    // 0.17 clears the increasing threshold (0.15) but not the baseline.
    assert!(should_reforecast(0.17, TrendDirection::Increasing, 6, &thresholds).should_reforecast);
    assert!(!should_reforecast(0.17, TrendDirection::Undetermined, 6, &thresholds).should_reforecast);
    // 0.23 clears the stable threshold (0.22) but not the decreasing one (0.25).
    assert!(should_reforecast(-0.23, TrendDirection::Stable, 6, &thresholds).should_reforecast);
    assert!(!should_reforecast(-0.23, TrendDirection::Decreasing, 6, &thresholds).should_reforecast);
}

#[test]
fn threshold_is_monotone_in_trend() {
    let t = VarianceThresholds::default();
    assert!(t.threshold_for(TrendDirection::Increasing) < t.threshold_for(TrendDirection::Undetermined));
    assert!(t.threshold_for(TrendDirection::Undetermined) < t.threshold_for(TrendDirection::Stable));
    assert!(t.threshold_for(TrendDirection::Stable) < t.threshold_for(TrendDirection::Decreasing));
}

#[test]
fn widening_shortfall_triggers_reforecast() {
    let forecast = ForecastVector::new(vec![100.0; 10], 0.15).unwrap();
    let report = analyze_variance(
        &forecast,
        &[90.0, 80.0, 70.0],
        7,
        &VarianceThresholds::default(),
    )
    .unwrap();
    assert!((report.variance_pct + 0.20).abs() < 1e-12);
    assert_eq!(report.trend_direction, TrendDirection::Increasing);
    assert_eq!(report.severity, VarianceSeverity::High);
    assert!(report.should_reforecast);
    assert!((report.adjustment_hint - 0.8).abs() < 1e-12);
}

#[test]
fn single_week_trend_is_undetermined() {
    let forecast = ForecastVector::new(vec![100.0; 10], 0.15).unwrap();
    let report =
        analyze_variance(&forecast, &[125.0], 9, &VarianceThresholds::default()).unwrap();
    assert_eq!(report.trend_direction, TrendDirection::Undetermined);
    assert_eq!(report.decision.reason, DecisionReason::Triggered);
}

#[test]
fn rejects_actuals_beyond_horizon() {
    let forecast = ForecastVector::new(vec![100.0; 2], 0.15).unwrap();
    assert!(analyze_variance(
        &forecast,
        &[1.0, 2.0, 3.0],
        0,
        &VarianceThresholds::default()
    )
    .is_err());
}

#[test]
fn zero_surprise_leaves_future_weeks_unchanged() {
    let prior = ForecastVector::new(vec![120.0, 90.0, 110.0, 100.0, 80.0], 0.2).unwrap();
    let out = reforecast(&prior, &[120.0, 90.0, 110.0]).unwrap();
    assert_eq!(out.adjustment_ratio, 1.0);
    assert_eq!(out.new_vector.weekly(), prior.weekly());
    assert_eq!(out.new_vector.revision, 1);
    assert_eq!(
        out.new_vector.source,
        ForecastSource::Reforecast { parent_revision: 0 }
    );
}

#[test]
fn posterior_sits_between_prior_and_actuals() {
    let prior = ForecastVector::new(vec![100.0; 8], 0.25).unwrap();
    let out = reforecast(&prior, &[130.0, 140.0, 135.0]).unwrap();
    assert!(out.posterior_mean > out.prior_mean);
    assert!(out.posterior_mean < out.likelihood_mean);
    assert!((out.prior_weight + out.likelihood_weight - 1.0).abs() < 1e-12);
    assert!(out.posterior_confidence > 0.0 && out.posterior_confidence <= 1.0);
    // Observed weeks become actuals, the rest scale by the ratio.
    assert_eq!(out.new_vector.weekly()[1], 140.0);
    assert!((out.new_vector.weekly()[5] - 100.0 * out.adjustment_ratio).abs() < 1e-9);
}

#[test]
fn tight_prior_resists_noisy_actuals() {
    let confident = ForecastVector::new(vec![100.0; 8], 0.01).unwrap();
    let vague = ForecastVector::new(vec![100.0; 8], 0.5).unwrap();
    let actuals = [150.0, 110.0, 170.0];
    let a = reforecast(&confident, &actuals).unwrap();
    let b = reforecast(&vague, &actuals).unwrap();
    assert!(a.prior_weight > b.prior_weight);
    assert!(a.adjustment_ratio < b.adjustment_ratio);
}

#[test]
fn error_estimate_and_weeks_observed_come_from_the_inputs() {
    // Only the first actuals.len() weeks feed the prior mean.
    let prior = ForecastVector::new(vec![100.0, 100.0, 300.0, 300.0], 0.2).unwrap();
    let out = reforecast(&prior, &[120.0, 80.0]).unwrap();
    assert!((out.prior_mean - 100.0).abs() < 1e-12);
    assert!((out.likelihood_mean - 100.0).abs() < 1e-12);

    // Prior variance (0.2 * 100)^2 equals the likelihood variance 800 / 2.
    assert!((out.prior_weight - 0.5).abs() < 1e-9);
    assert_eq!(out.new_vector.weekly()[..2], [120.0, 80.0]);
    assert_eq!(out.new_vector.revision, prior.revision + 1);
}
