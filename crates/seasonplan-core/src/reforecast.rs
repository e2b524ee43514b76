//! Gaussian posterior update of the remaining-season forecast.
//!
//! The prior is the forecast's mean weekly demand over the observed weeks,
//! with variance `(error_estimate * prior_mean)^2`. The likelihood is the
//! observed weekly mean with the variance of that mean. The conjugate update
//! gives a posterior mean whose ratio to the prior mean rescales every
//! unobserved week; observed weeks are replaced by actuals.

use serde::{Deserialize, Serialize};

use crate::domain::{EngineError, ForecastSource, ForecastVector, Result};
use crate::metrics::METRICS;
use crate::obs;
use crate::variance::validate_actuals;

/// Output of [`reforecast`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorReforecast {
    pub new_vector: ForecastVector,
    /// Weight of the prior in the posterior mean (0.0-1.0).
    pub prior_weight: f64,
    /// Weight of the observed actuals (`1 - prior_weight`).
    pub likelihood_weight: f64,
    /// `1 / (1 + cv)` of the posterior, in [0, 1].
    pub posterior_confidence: f64,
    /// `posterior_mean / prior_mean`, applied to every unobserved week.
    pub adjustment_ratio: f64,
    pub prior_mean: f64,
    pub likelihood_mean: f64,
    pub posterior_mean: f64,
    pub posterior_variance: f64,
}

/// `(mean, variance of the mean)` of the observed weeks.
///
/// A single observation carries no spread information; the caller substitutes
/// the prior variance in that case.
fn likelihood_moments(actuals: &[f64]) -> (f64, Option<f64>) {
    let n = actuals.len() as f64;
    let mean = actuals.iter().sum::<f64>() / n;
    if actuals.len() < 2 {
        return (mean, None);
    }
    let sample_var = actuals.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, Some(sample_var / n))
}

/// Blend the prior forecast with observed actuals.
///
/// `actuals[i]` is the observed demand for week `i`. The reforecast inputs
/// are carried by the arguments rather than passed separately:
///
/// * prior forecast: `prior.weekly()`
/// * prior error estimate: `prior.error_estimate`
/// * weeks observed: `actuals.len()`, which must not exceed the horizon
///
/// The returned vector is `prior.revision + 1` with a `Reforecast` source
/// pointing back at `prior`.
pub fn reforecast(prior: &ForecastVector, actuals: &[f64]) -> Result<PosteriorReforecast> {
    validate_actuals(prior, actuals)?;
    let weeks_observed = actuals.len();
    let prior_mean = prior.sum_first(weeks_observed) / weeks_observed as f64;
    if prior_mean <= 0.0 {
        return Err(EngineError::invalid(
            "prior",
            format!("prior forecast for the first {weeks_observed} weeks is zero"),
        ));
    }

    let prior_var = (prior.error_estimate * prior_mean).powi(2);
    let (likelihood_mean, spread) = likelihood_moments(actuals);
    let likelihood_var = spread.unwrap_or(prior_var);

    let total_var = prior_var + likelihood_var;
    let (prior_weight, posterior_var) = if total_var > 0.0 {
        (likelihood_var / total_var, prior_var * likelihood_var / total_var)
    } else {
        (0.5, 0.0)
    };
    let likelihood_weight = 1.0 - prior_weight;
    // Same as (prior_var * likelihood_mean + likelihood_var * prior_mean) / total_var,
    // but exact when the actuals match the prior.
    let posterior_mean = prior_mean + likelihood_weight * (likelihood_mean - prior_mean);
    let adjustment_ratio = posterior_mean / prior_mean;

    let posterior_sd = posterior_var.sqrt();
    let (posterior_confidence, posterior_error) = if posterior_mean > 0.0 {
        let cv = posterior_sd / posterior_mean;
        (1.0 / (1.0 + cv), cv)
    } else {
        (0.0, prior.error_estimate)
    };

    let weekly: Vec<f64> = prior
        .weekly()
        .iter()
        .enumerate()
        .map(|(i, &f)| actuals.get(i).copied().unwrap_or(f * adjustment_ratio))
        .collect();
    let new_vector = ForecastVector::build(
        weekly,
        posterior_error,
        prior.revision + 1,
        ForecastSource::Reforecast {
            parent_revision: prior.revision,
        },
    )?;

    METRICS.inc_reforecasts();
    obs::emit_reforecast_applied(
        new_vector.revision,
        adjustment_ratio,
        prior_weight,
        posterior_confidence,
    );

    Ok(PosteriorReforecast {
        new_vector,
        prior_weight,
        likelihood_weight,
        posterior_confidence,
        adjustment_ratio,
        prior_mean,
        likelihood_mean,
        posterior_mean,
        posterior_variance: posterior_var,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_likelihood_moments() {
        let (mean, var) = likelihood_moments(&[90.0, 110.0]);
        assert_eq!(mean, 100.0);
        // sample variance 200, divided by n = 2
        assert_eq!(var, Some(100.0));
        assert_eq!(likelihood_moments(&[42.0]), (42.0, None));
    }

    #[test]
    fn test_single_week_weights_prior_and_actual_equally() {
        let prior = ForecastVector::new(vec![100.0, 100.0, 100.0], 0.2).unwrap();
        let out = reforecast(&prior, &[140.0]).unwrap();
        assert!((out.prior_weight - 0.5).abs() < 1e-12);
        assert!((out.posterior_mean - 120.0).abs() < 1e-9);
        assert!((out.adjustment_ratio - 1.2).abs() < 1e-12);
        assert_eq!(out.new_vector.weekly()[0], 140.0);
        assert!((out.new_vector.weekly()[2] - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_error_prior_with_exact_actuals() {
        let prior = ForecastVector::new(vec![50.0, 50.0, 50.0], 0.0).unwrap();
        let out = reforecast(&prior, &[50.0, 50.0]).unwrap();
        assert_eq!(out.adjustment_ratio, 1.0);
        assert_eq!(out.posterior_confidence, 1.0);
    }
}
