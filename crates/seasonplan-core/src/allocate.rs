//! Hierarchical allocation: manufacturing -> DC holdback -> cluster -> store.
//!
//! Every layer is unit-conserving. Rounding residuals are pushed onto the
//! largest child, and the sum of each layer is checked against its parent
//! before the next layer runs; any mismatch aborts with
//! [`EngineError::Conservation`].

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::error::ensure_conserved;
use crate::domain::{
    AllocationLayer, AllocationPlan, ClusterAllocation, ClusterTier, EngineError, EngineWarning,
    ForecastVector, Result, StoreAllocation, StoreRecord,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::policy::{check_unit_interval, SeasonPolicy};
use crate::segment::ClusterAssignment;

/// Weight of trailing sales in the hybrid store factor.
const HISTORICAL_WEIGHT: f64 = 0.7;
/// Weight of static attributes in the hybrid store factor.
const ATTRIBUTE_WEIGHT: f64 = 0.3;
const SIZE_WEIGHT: f64 = 0.5;
const INCOME_WEIGHT: f64 = 0.3;
const LOCATION_WEIGHT: f64 = 0.2;
const MAX_LOCATION_TIER: f64 = 3.0;
/// Weeks of demand every store must open with.
const MINIMUM_WEEKS_OF_COVER: f64 = 2.0;

/// `round(forecast_total * (1 + safety_stock_pct))`.
pub fn manufacturing_quantity(forecast_total: f64, safety_stock_pct: f64) -> u64 {
    (forecast_total * (1.0 + safety_stock_pct)).round() as u64
}

/// Split manufacturing into `(initial_store_total, dc_holdback_total)`.
///
/// The holdback is derived by subtraction so the two always sum to
/// `manufacturing_qty`.
pub fn split_dc_holdback(manufacturing_qty: u64, dc_holdback_pct: f64) -> (u64, u64) {
    let initial = ((manufacturing_qty as f64) * (1.0 - dc_holdback_pct)).round() as u64;
    let initial = initial.min(manufacturing_qty);
    (initial, manufacturing_qty - initial)
}

/// Split `total` proportionally to `weights`, rounding each part.
///
/// The rounding residual is added to (or taken from) the largest part, lowest
/// index first on ties; parts never go below zero. Non-positive weight sums
/// fall back to an equal split.
pub fn apportion(total: u64, weights: &[f64]) -> Vec<u64> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let usable = |w: f64| w.is_finite() && w > 0.0;
    let sum: f64 = weights.iter().copied().filter(|w| usable(*w)).sum();
    if sum <= 0.0 {
        return apportion(total, &vec![1.0; n]);
    }

    let mut parts: Vec<u64> = weights
        .iter()
        .map(|&w| {
            if usable(w) {
                ((total as f64) * w / sum).round() as u64
            } else {
                0
            }
        })
        .collect();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| parts[b].cmp(&parts[a]).then(a.cmp(&b)));

    let assigned: u64 = parts.iter().sum();
    if assigned < total {
        parts[order[0]] += total - assigned;
    } else {
        let mut excess = assigned - total;
        for &i in &order {
            let take = excess.min(parts[i]);
            parts[i] -= take;
            excess -= take;
            if excess == 0 {
                break;
            }
        }
    }
    parts
}

#[derive(Debug, Default)]
struct TierMeans {
    sales: f64,
    size: f64,
    income: f64,
}

fn valid(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

fn mean_of(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .filter(|v| valid(*v))
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

impl TierMeans {
    fn of(stores: &[&StoreRecord]) -> Self {
        Self {
            sales: mean_of(stores.iter().map(|s| s.avg_weekly_sales)),
            size: mean_of(stores.iter().map(|s| s.size_sqft)),
            income: mean_of(stores.iter().map(|s| s.median_income)),
        }
    }
}

/// Ratio to the cluster mean; invalid values and zero means count as average.
fn relative(value: f64, mean: f64) -> f64 {
    if valid(value) && mean > 0.0 {
        value / mean
    } else {
        1.0
    }
}

/// `0.7 * historical_score + 0.3 * attribute_score` before normalization.
fn hybrid_factor(store: &StoreRecord, means: &TierMeans) -> f64 {
    let historical = relative(store.avg_weekly_sales, means.sales);
    let attribute = SIZE_WEIGHT * relative(store.size_sqft, means.size)
        + INCOME_WEIGHT * relative(store.median_income, means.income)
        + LOCATION_WEIGHT * (f64::from(store.location_tier) / MAX_LOCATION_TIER);
    HISTORICAL_WEIGHT * historical + ATTRIBUTE_WEIGHT * attribute
}

fn normalized_factors(stores: &[&StoreRecord]) -> Vec<f64> {
    let means = TierMeans::of(stores);
    let raw: Vec<f64> = stores.iter().map(|s| hybrid_factor(s, &means)).collect();
    let sum: f64 = raw.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        raw.iter().map(|f| f / sum).collect()
    } else {
        vec![1.0 / stores.len() as f64; stores.len()]
    }
}

/// Result of raising allocations to their minimums inside one cluster.
#[derive(Debug)]
struct MinimumOutcome {
    allocations: Vec<u64>,
    /// Sum of minimums when the cluster total could not cover them.
    shortfall_required: Option<u64>,
}

/// Raise every allocation to its minimum and take the excess back from the
/// largest allocations, never pushing a donor below its own minimum.
///
/// When the minimums together exceed `cluster_total`, the cluster total is
/// instead split in proportion to the minimums and the shortfall reported.
fn enforce_minimums(cluster_total: u64, mut allocations: Vec<u64>, minimums: &[u64]) -> MinimumOutcome {
    let required: u64 = minimums.iter().sum();
    if required > cluster_total {
        let weights: Vec<f64> = minimums.iter().map(|&m| m as f64).collect();
        return MinimumOutcome {
            allocations: apportion(cluster_total, &weights),
            shortfall_required: Some(required),
        };
    }

    let mut excess = 0u64;
    for (alloc, &min) in allocations.iter_mut().zip(minimums) {
        if *alloc < min {
            excess += min - *alloc;
            *alloc = min;
        }
    }

    let mut donors: Vec<usize> = (0..allocations.len()).collect();
    donors.sort_by(|&a, &b| allocations[b].cmp(&allocations[a]).then(a.cmp(&b)));
    for i in donors {
        if excess == 0 {
            break;
        }
        let spare = allocations[i] - minimums[i];
        let take = spare.min(excess);
        allocations[i] -= take;
        excess -= take;
    }

    MinimumOutcome {
        allocations,
        shortfall_required: None,
    }
}

/// Build the season's allocation plan.
///
/// Fails with [`EngineError::InvalidParameter`] when the policy percentages
/// fall outside [0, 1], the forecast total is not positive, or a store has no
/// tier in `assignment`.
pub fn allocate(
    forecast: &ForecastVector,
    policy: &SeasonPolicy,
    assignment: &ClusterAssignment,
    stores: &[StoreRecord],
) -> Result<AllocationPlan> {
    check_unit_interval("safety_stock_pct", policy.safety_stock_pct)?;
    check_unit_interval("dc_holdback_pct", policy.dc_holdback_pct)?;
    let forecast_total = forecast.total();
    if !forecast_total.is_finite() || forecast_total <= 0.0 {
        return Err(EngineError::invalid(
            "forecast_total",
            format!("must be positive, got {forecast_total}"),
        ));
    }

    let mut by_tier: BTreeMap<ClusterTier, Vec<&StoreRecord>> = BTreeMap::new();
    for store in stores {
        let tier = assignment.tier_of(&store.store_id).ok_or_else(|| {
            EngineError::invalid(
                "cluster_assignment",
                format!("store {} has no cluster", store.store_id),
            )
        })?;
        by_tier.entry(tier).or_default().push(store);
    }
    for members in by_tier.values_mut() {
        members.sort_by(|a, b| a.store_id.cmp(&b.store_id));
    }

    let tiers: Vec<(ClusterTier, f64)> = assignment
        .clusters
        .iter()
        .map(|c| (c.tier, c.allocation_share()))
        .collect();
    if let Some((tier, _)) = tiers
        .iter()
        .find(|(tier, share)| *share > 0.0 && !by_tier.contains_key(tier))
    {
        return Err(EngineError::invalid(
            "stores",
            format!("cluster {tier} has a positive share but no stores"),
        ));
    }

    // Layers 1-2: manufacturing and DC split.
    let manufacturing_qty = manufacturing_quantity(forecast_total, policy.safety_stock_pct);
    let (initial_total, dc_holdback_qty) =
        split_dc_holdback(manufacturing_qty, policy.dc_holdback_pct);
    ensure_conserved(
        AllocationLayer::DcSplit,
        manufacturing_qty,
        [initial_total, dc_holdback_qty],
        || format!("initial {initial_total} + holdback {dc_holdback_qty}"),
    )?;
    tracing::debug!(manufacturing_qty, initial_total, dc_holdback_qty, "dc split");

    // Layer 3: cluster split.
    let shares: Vec<f64> = tiers.iter().map(|(_, s)| *s).collect();
    let cluster_totals = apportion(initial_total, &shares);
    let cluster_holdbacks = apportion(dc_holdback_qty, &shares);
    ensure_conserved(
        AllocationLayer::Cluster,
        initial_total,
        cluster_totals.iter().copied(),
        || format!("cluster totals {cluster_totals:?} for shares {shares:?}"),
    )?;
    tracing::debug!(?cluster_totals, ?cluster_holdbacks, "cluster split");

    // Layer 4: store split within each cluster.
    let week_one = forecast.week(0).unwrap_or(0.0);
    let mut clusters = Vec::with_capacity(tiers.len());
    let mut store_allocations = Vec::with_capacity(stores.len());
    let mut warnings = Vec::new();

    for (i, &(tier, share)) in tiers.iter().enumerate() {
        let cluster_total = cluster_totals[i];
        let cluster_holdback = cluster_holdbacks[i];
        clusters.push(ClusterAllocation {
            tier,
            share,
            cluster_total,
            dc_holdback: cluster_holdback,
        });
        let Some(members) = by_tier.get(&tier) else {
            continue;
        };

        let factors = normalized_factors(members);
        let proportional = apportion(cluster_total, &factors);
        let minimums: Vec<u64> = factors
            .iter()
            .map(|f| (MINIMUM_WEEKS_OF_COVER * share * f * week_one).ceil() as u64)
            .collect();
        let outcome = enforce_minimums(cluster_total, proportional, &minimums);
        ensure_conserved(
            AllocationLayer::Store { tier },
            cluster_total,
            outcome.allocations.iter().copied(),
            || format!("{} stores after minimum enforcement", members.len()),
        )?;

        if let Some(required) = outcome.shortfall_required {
            let affected = members
                .iter()
                .zip(outcome.allocations.iter().zip(&minimums))
                .filter(|(_, (alloc, min))| alloc < min)
                .map(|(s, _)| s.store_id.clone())
                .collect();
            obs::emit_minimum_shortfall(tier, required, cluster_total);
            warnings.push(EngineWarning::MinimumShortfall {
                tier,
                required,
                cluster_total,
                affected_stores: affected,
            });
        }

        let reserves = apportion(cluster_holdback, &factors);
        for (j, store) in members.iter().enumerate() {
            store_allocations.push(StoreAllocation {
                store_id: store.store_id.clone(),
                tier,
                allocation_factor: factors[j],
                minimum_allocation: minimums[j],
                initial_allocation: outcome.allocations[j],
                dc_reserve: reserves[j],
            });
        }
    }

    // Layer 5: reserves against the DC holdback.
    ensure_conserved(
        AllocationLayer::DcReserve,
        dc_holdback_qty,
        store_allocations.iter().map(|s| s.dc_reserve),
        || format!("{} store reserves", store_allocations.len()),
    )?;

    METRICS.inc_allocations();
    obs::emit_allocation_completed(manufacturing_qty, initial_total, dc_holdback_qty, stores.len());

    Ok(AllocationPlan {
        plan_id: Uuid::new_v4(),
        manufacturing_qty,
        dc_holdback_qty,
        initial_store_allocation_total: initial_total,
        clusters,
        stores: store_allocations,
        warnings,
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manufacturing_and_dc_split() {
        let m = manufacturing_quantity(8000.0, 0.20);
        assert_eq!(m, 9600);
        assert_eq!(split_dc_holdback(m, 0.45), (5280, 4320));
        assert_eq!(split_dc_holdback(m, 0.0), (9600, 0));
        assert_eq!(split_dc_holdback(m, 1.0), (0, 9600));
    }

    #[test]
    fn test_apportion_cluster_scenario() {
        assert_eq!(apportion(5280, &[0.40, 0.35, 0.25]), vec![2112, 1848, 1320]);
    }

    #[test]
    fn test_apportion_residual_goes_to_largest() {
        // 100 / 3 rounds to 33 each; the spare unit lands on the first.
        assert_eq!(apportion(100, &[1.0, 1.0, 1.0]), vec![34, 33, 33]);
        // 5 * 0.5 rounds up twice; the extra unit comes off the first largest.
        assert_eq!(apportion(5, &[0.5, 0.5]), vec![2, 3]);
    }

    #[test]
    fn test_apportion_degenerate_weights() {
        assert_eq!(apportion(9, &[0.0, 0.0, 0.0]), vec![3, 3, 3]);
        assert_eq!(apportion(7, &[f64::NAN, 1.0]), vec![0, 7]);
        assert!(apportion(7, &[]).is_empty());
    }

    #[test]
    fn test_enforce_minimums_takes_from_largest() {
        let out = enforce_minimums(100, vec![70, 20, 10], &[10, 25, 15]);
        assert_eq!(out.allocations, vec![60, 25, 15]);
        assert!(out.shortfall_required.is_none());
    }

    #[test]
    fn test_enforce_minimums_cascades_past_donor_floor() {
        // Largest can only give 5 before hitting its own minimum of 45.
        let out = enforce_minimums(100, vec![50, 40, 10], &[45, 38, 17]);
        assert_eq!(out.allocations.iter().sum::<u64>(), 100);
        assert_eq!(out.allocations, vec![45, 38, 17]);
    }

    #[test]
    fn test_enforce_minimums_shortfall_conserves() {
        let out = enforce_minimums(30, vec![15, 10, 5], &[20, 20, 20]);
        assert_eq!(out.shortfall_required, Some(60));
        assert_eq!(out.allocations.iter().sum::<u64>(), 30);
        assert_eq!(out.allocations, vec![10, 10, 10]);
    }
}
