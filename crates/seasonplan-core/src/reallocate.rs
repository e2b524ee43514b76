//! Mid-season reallocation: classify stores by velocity and sell-through,
//! then move DC stock and unshipped allocation toward the fastest sellers.
//!
//! Only uncommitted DC units and allocation that has not yet left the DC
//! are moved. Stock already shipped to a store stays where it is.
//!
//! A store's unshipped allocation is its DC reserve, so it sits in the same
//! [`DcPool`] as the uncommitted slack. Releasing it draws the pool down too,
//! and the slack pass never spends units a released reserve will cover.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{
    AllocationPlan, ClusterTier, DcPool, EngineError, EngineWarning, Result, StoreId,
};
use crate::metrics::METRICS;
use crate::obs;

/// Tuning for [`recommend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReallocationConfig {
    /// Most recent weeks averaged into velocity.
    pub velocity_window: usize,
    /// Velocity at or above this multiple of the cluster mean is high.
    pub high_velocity_ratio: f64,
    /// Velocity at or below this multiple of the cluster mean is low.
    pub low_velocity_ratio: f64,
    /// Sell-through below this multiple of the cluster mean is "well below".
    pub sell_through_gap_ratio: f64,
    /// Stores with fewer weeks of supply than this are about to stock out.
    pub stockout_horizon_weeks: f64,
    /// Weeks of demand a high performer should hold after the transfer.
    pub cover_weeks: f64,
}

impl Default for ReallocationConfig {
    fn default() -> Self {
        Self {
            velocity_window: 3,
            high_velocity_ratio: 1.3,
            low_velocity_ratio: 0.7,
            sell_through_gap_ratio: 0.8,
            stockout_horizon_weeks: 2.0,
            cover_weeks: 3.0,
        }
    }
}

/// Observed sales and stock for one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreActuals {
    pub store_id: StoreId,
    /// Units sold per completed week, week 0 first.
    pub weekly_sales: Vec<u64>,
    pub on_hand: u64,
    /// Units shipped to the store so far, initial shipment included.
    pub cumulative_shipped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceClass {
    HighPerformer,
    OnTarget,
    Underperformer,
}

/// Per-store metrics behind the classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorePerformance {
    pub store_id: StoreId,
    pub tier: ClusterTier,
    /// Mean units per week over the velocity window.
    pub velocity: f64,
    /// Cumulative units sold over the initial allocation.
    pub sell_through: f64,
    /// On-hand divided by velocity; `None` when nothing is selling.
    pub weeks_of_supply: Option<f64>,
    pub class: PerformanceClass,
    /// Units needed to reach the cover target (high performers only).
    pub projected_need: u64,
    /// Unshipped allocation that can be released (underperformers only).
    pub transferable_surplus: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReallocationStrategy {
    /// Uncommitted DC slack covers every high performer.
    DcOnly,
    /// DC slack plus unshipped allocation released by underperformers.
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "store_id", rename_all = "snake_case")]
pub enum TransferSource {
    Dc,
    Store(StoreId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferReason {
    /// Uncommitted DC stock sent to a fast seller.
    DcReplenishment,
    /// An underperformer's unshipped allocation redirected to a fast seller.
    UnshippedReallocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOrder {
    pub from: TransferSource,
    pub to: StoreId,
    pub units: u64,
    pub reason_code: TransferReason,
}

/// Output of one reallocation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReallocationAnalysis {
    pub current_week: usize,
    pub strategy: ReallocationStrategy,
    pub stores: Vec<StorePerformance>,
    pub transfers: Vec<TransferOrder>,
    pub total_need: u64,
    pub units_from_dc: u64,
    pub units_from_stores: u64,
    pub unmet_need: u64,
    /// Unit-weighted mean of recipients' projected sell-through gain.
    pub expected_sell_through_improvement: f64,
    pub warnings: Vec<EngineWarning>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

struct Observed<'a> {
    actuals: &'a StoreActuals,
    tier: ClusterTier,
    season_allocation: u64,
    velocity: f64,
    sell_through: f64,
    weeks_of_supply: Option<f64>,
}

fn observe<'a>(
    plan: &AllocationPlan,
    actuals: &'a StoreActuals,
    current_week: usize,
    config: &ReallocationConfig,
) -> Result<Observed<'a>> {
    let allocation = plan.store(&actuals.store_id).ok_or_else(|| {
        EngineError::invalid(
            "store_actuals",
            format!("store {} is not in the allocation plan", actuals.store_id),
        )
    })?;
    let weeks = actuals.weekly_sales.len().min(current_week);
    let observed = &actuals.weekly_sales[..weeks];
    let recent: Vec<f64> = observed[weeks.saturating_sub(config.velocity_window.max(1))..]
        .iter()
        .map(|&u| u as f64)
        .collect();
    let velocity = mean(&recent);
    let sold: u64 = observed.iter().sum();
    let sell_through = if allocation.initial_allocation > 0 {
        sold as f64 / allocation.initial_allocation as f64
    } else {
        0.0
    };
    Ok(Observed {
        actuals,
        tier: allocation.tier,
        season_allocation: allocation.season_allocation(),
        velocity,
        sell_through,
        weeks_of_supply: (velocity > 0.0).then(|| actuals.on_hand as f64 / velocity),
    })
}

fn classify(
    o: &Observed<'_>,
    tier_velocity: f64,
    tier_sell_through: f64,
    config: &ReallocationConfig,
) -> PerformanceClass {
    let fast = o.velocity > 0.0 && o.velocity >= config.high_velocity_ratio * tier_velocity;
    let stockout = o
        .weeks_of_supply
        .is_some_and(|w| w < config.stockout_horizon_weeks);
    if fast || stockout {
        return PerformanceClass::HighPerformer;
    }
    let slow = o.velocity <= config.low_velocity_ratio * tier_velocity;
    let lagging = o.sell_through < config.sell_through_gap_ratio * tier_sell_through;
    if slow && lagging {
        PerformanceClass::Underperformer
    } else {
        PerformanceClass::OnTarget
    }
}

/// Recommend transfers for the week after `current_week` completed weeks.
pub fn recommend(
    plan: &AllocationPlan,
    store_actuals: &[StoreActuals],
    dc: &mut DcPool,
    current_week: usize,
    config: &ReallocationConfig,
) -> Result<ReallocationAnalysis> {
    if current_week == 0 {
        return Err(EngineError::invalid(
            "current_week",
            "at least one completed week is required",
        ));
    }
    let observed = store_actuals
        .iter()
        .map(|a| observe(plan, a, current_week, config))
        .collect::<Result<Vec<_>>>()?;

    let mut tier_metrics: BTreeMap<ClusterTier, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for o in &observed {
        let entry = tier_metrics.entry(o.tier).or_default();
        entry.0.push(o.velocity);
        entry.1.push(o.sell_through);
    }
    let tier_means: BTreeMap<ClusterTier, (f64, f64)> = tier_metrics
        .into_iter()
        .map(|(tier, (v, st))| (tier, (mean(&v), mean(&st))))
        .collect();

    let mut stores: Vec<StorePerformance> = observed
        .iter()
        .map(|o| {
            let (tier_velocity, tier_sell_through) = tier_means[&o.tier];
            let class = classify(o, tier_velocity, tier_sell_through, config);
            let cover_target = (o.velocity * config.cover_weeks).ceil() as u64;
            let own_need = cover_target.saturating_sub(o.actuals.on_hand);
            let unshipped = o
                .season_allocation
                .saturating_sub(o.actuals.cumulative_shipped);
            StorePerformance {
                store_id: o.actuals.store_id.clone(),
                tier: o.tier,
                velocity: o.velocity,
                sell_through: o.sell_through,
                weeks_of_supply: o.weeks_of_supply,
                class,
                projected_need: match class {
                    PerformanceClass::HighPerformer => own_need,
                    _ => 0,
                },
                transferable_surplus: match class {
                    PerformanceClass::Underperformer => unshipped.saturating_sub(own_need),
                    _ => 0,
                },
            }
        })
        .collect();
    stores.sort_by(|a, b| a.store_id.cmp(&b.store_id));

    let total_need: u64 = stores.iter().map(|s| s.projected_need).sum();
    // Released reserves are physically in the pool, never on top of it.
    let releasable = stores
        .iter()
        .map(|s| s.transferable_surplus)
        .sum::<u64>()
        .min(dc.available());
    let mut slack = dc.available() - releasable;
    let strategy = if slack >= total_need {
        ReallocationStrategy::DcOnly
    } else {
        ReallocationStrategy::Hybrid
    };

    let mut recipients: Vec<(&StoreId, u64)> = stores
        .iter()
        .filter(|s| s.projected_need > 0)
        .map(|s| (&s.store_id, s.projected_need))
        .collect();
    recipients.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut transfers = Vec::new();
    let mut received: BTreeMap<&StoreId, u64> = BTreeMap::new();

    for (store_id, need) in recipients.iter_mut() {
        let units = dc.withdraw((*need).min(slack));
        if units > 0 {
            slack -= units;
            *need -= units;
            *received.entry(*store_id).or_default() += units;
            transfers.push(TransferOrder {
                from: TransferSource::Dc,
                to: (*store_id).clone(),
                units,
                reason_code: TransferReason::DcReplenishment,
            });
        }
    }
    let units_from_dc: u64 = transfers.iter().map(|t| t.units).sum();

    if strategy == ReallocationStrategy::Hybrid {
        let mut sources: Vec<(&StoreId, u64)> = stores
            .iter()
            .filter(|s| s.transferable_surplus > 0)
            .map(|s| (&s.store_id, s.transferable_surplus))
            .collect();
        sources.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        for (store_id, need) in recipients.iter_mut().filter(|(_, n)| *n > 0) {
            for (source_id, surplus) in sources.iter_mut().filter(|(_, s)| *s > 0) {
                let units = dc.withdraw((*need).min(*surplus));
                if units == 0 {
                    break;
                }
                *need -= units;
                *surplus -= units;
                *received.entry(*store_id).or_default() += units;
                transfers.push(TransferOrder {
                    from: TransferSource::Store((*source_id).clone()),
                    to: (*store_id).clone(),
                    units,
                    reason_code: TransferReason::UnshippedReallocation,
                });
                if *need == 0 {
                    break;
                }
            }
        }
    }

    let moved: u64 = transfers.iter().map(|t| t.units).sum();
    let units_from_stores = moved - units_from_dc;
    let unmet_need = total_need - moved;

    let (weighted_gain, weight) = received
        .iter()
        .filter_map(|(store_id, &units)| {
            let initial = plan.store(store_id)?.initial_allocation;
            (initial > 0).then(|| (units as f64 * (units as f64 / initial as f64), units as f64))
        })
        .fold((0.0, 0.0), |(g, w), (dg, dw)| (g + dg, w + dw));
    let expected_sell_through_improvement = if weight > 0.0 {
        weighted_gain / weight
    } else {
        0.0
    };

    let mut warnings = Vec::new();
    if unmet_need > 0 {
        obs::emit_dc_shortfall("reallocation", total_need, moved);
        warnings.push(EngineWarning::InsufficientInventory {
            requested: total_need,
            available: moved,
        });
    }

    METRICS.add_transfers(transfers.len() as u64);
    obs::emit_reallocation_recommended(current_week, strategy, transfers.len(), moved, unmet_need);

    Ok(ReallocationAnalysis {
        current_week,
        strategy,
        stores,
        transfers,
        total_need,
        units_from_dc,
        units_from_stores,
        unmet_need,
        expected_sell_through_improvement,
        warnings,
    })
}
