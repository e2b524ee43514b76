//! Weekly store top-ups from DC stock.

use serde::{Deserialize, Serialize};

use crate::domain::{
    AllocationPlan, DcPool, EngineError, EngineWarning, ForecastVector, InventoryState, Result,
    StoreId,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::policy::ReplenishmentStrategy;

/// A store's inventory together with its share of category demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorePosition {
    pub inventory: InventoryState,
    /// Fraction of category demand this store serves (0.0-1.0).
    pub demand_share: f64,
}

impl StorePosition {
    /// Pair inventories with demand shares from the allocation plan.
    pub fn from_plan(plan: &AllocationPlan, inventories: &[InventoryState]) -> Vec<Self> {
        inventories
            .iter()
            .map(|inv| Self {
                demand_share: plan.demand_share(&inv.store_id),
                inventory: inv.clone(),
            })
            .collect()
    }
}

/// How much of a store's need was covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    Full,
    Partial,
    Unfulfilled,
}

/// Units to ship to one store this week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplenishOrder {
    pub store_id: StoreId,
    pub need: u64,
    pub units: u64,
    pub status: FulfillmentStatus,
}

/// Output of one weekly replenishment pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplenishmentPlan {
    pub week: usize,
    /// Orders in fulfillment priority order.
    pub orders: Vec<ReplenishOrder>,
    pub total_need: u64,
    pub total_units: u64,
    pub dc_remaining: u64,
    pub warnings: Vec<EngineWarning>,
}

impl ReplenishmentPlan {
    fn empty(week: usize, dc_remaining: u64) -> Self {
        Self {
            week,
            orders: Vec::new(),
            total_need: 0,
            total_units: 0,
            dc_remaining,
            warnings: Vec::new(),
        }
    }

    /// Receive every order into the matching store inventory.
    pub fn apply_to(&self, inventories: &mut [InventoryState]) {
        for order in self.orders.iter().filter(|o| o.units > 0) {
            if let Some(inv) = inventories.iter_mut().find(|i| i.store_id == order.store_id) {
                inv.receive(order.units);
            }
        }
    }
}

/// Plan top-ups for the week after `current_week` (0-based).
///
/// Each store needs `max(0, next_week_demand * demand_share - on_hand)`. When
/// the DC covers the summed need, every store is filled; otherwise the
/// largest needs are served first until the DC runs dry and an
/// [`EngineWarning::InsufficientInventory`] is attached.
pub fn plan_week(
    positions: &[StorePosition],
    forecast: &ForecastVector,
    current_week: usize,
    dc: &mut DcPool,
    strategy: ReplenishmentStrategy,
) -> Result<ReplenishmentPlan> {
    if strategy == ReplenishmentStrategy::None {
        return Ok(ReplenishmentPlan::empty(current_week, dc.available()));
    }
    if let Some(p) = positions
        .iter()
        .find(|p| !p.demand_share.is_finite() || !(0.0..=1.0).contains(&p.demand_share))
    {
        return Err(EngineError::invalid(
            "demand_share",
            format!(
                "store {} has share {}, expected [0, 1]",
                p.inventory.store_id, p.demand_share
            ),
        ));
    }
    let Some(next_week) = forecast.week(current_week + 1) else {
        tracing::debug!(current_week, "no forecast beyond horizon; nothing to replenish");
        return Ok(ReplenishmentPlan::empty(current_week, dc.available()));
    };

    let mut needs: Vec<(&StoreId, u64)> = positions
        .iter()
        .map(|p| {
            let demand = (next_week * p.demand_share).round() as u64;
            (
                &p.inventory.store_id,
                demand.saturating_sub(p.inventory.on_hand),
            )
        })
        .filter(|(_, need)| *need > 0)
        .collect();
    needs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let total_need: u64 = needs.iter().map(|(_, n)| n).sum();
    let available = dc.available();
    let mut warnings = Vec::new();
    if total_need > available {
        METRICS.inc_replenishment_shortfalls();
        obs::emit_dc_shortfall("replenishment", total_need, available);
        warnings.push(EngineWarning::InsufficientInventory {
            requested: total_need,
            available,
        });
    }

    let orders: Vec<ReplenishOrder> = needs
        .into_iter()
        .map(|(store_id, need)| {
            let units = dc.withdraw(need);
            let status = if units == need {
                FulfillmentStatus::Full
            } else if units > 0 {
                FulfillmentStatus::Partial
            } else {
                FulfillmentStatus::Unfulfilled
            };
            ReplenishOrder {
                store_id: store_id.clone(),
                need,
                units,
                status,
            }
        })
        .collect();
    let total_units = orders.iter().map(|o| o.units).sum();

    tracing::info!(
        event = "replenishment.planned",
        week = current_week,
        orders = orders.len(),
        total_need,
        total_units,
        dc_remaining = dc.available(),
    );

    Ok(ReplenishmentPlan {
        week: current_week,
        orders,
        total_need,
        total_units,
        dc_remaining: dc.available(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(id: &str, on_hand: u64, share: f64) -> StorePosition {
        StorePosition {
            inventory: InventoryState {
                store_id: StoreId::new(id),
                on_hand,
                cumulative_shipped: on_hand,
                cumulative_sold: 0,
            },
            demand_share: share,
        }
    }

    #[test]
    fn test_disabled_strategy_returns_nothing() {
        let forecast = ForecastVector::new(vec![100.0, 100.0], 0.1).unwrap();
        let mut dc = DcPool::new(500);
        let plan = plan_week(
            &[position("A", 0, 1.0)],
            &forecast,
            0,
            &mut dc,
            ReplenishmentStrategy::None,
        )
        .unwrap();
        assert!(plan.orders.is_empty());
        assert_eq!(dc.available(), 500);
    }

    #[test]
    fn test_past_horizon_returns_nothing() {
        let forecast = ForecastVector::new(vec![100.0, 100.0], 0.1).unwrap();
        let mut dc = DcPool::new(500);
        let plan = plan_week(
            &[position("A", 0, 1.0)],
            &forecast,
            1,
            &mut dc,
            ReplenishmentStrategy::Weekly,
        )
        .unwrap();
        assert!(plan.orders.is_empty());
    }

    #[test]
    fn test_apply_to_updates_inventory() {
        let forecast = ForecastVector::new(vec![100.0, 100.0], 0.1).unwrap();
        let mut dc = DcPool::new(500);
        let positions = [position("A", 10, 0.5)];
        let plan = plan_week(&positions, &forecast, 0, &mut dc, ReplenishmentStrategy::Weekly)
            .unwrap();
        let mut inventories = vec![positions[0].inventory.clone()];
        plan.apply_to(&mut inventories);
        assert_eq!(inventories[0].on_hand, 50);
        assert_eq!(dc.available(), 460);
    }

    #[test]
    fn test_rejects_bad_share() {
        let forecast = ForecastVector::new(vec![100.0, 100.0], 0.1).unwrap();
        let mut dc = DcPool::new(5);
        let res = plan_week(
            &[position("A", 0, f64::NAN)],
            &forecast,
            0,
            &mut dc,
            ReplenishmentStrategy::Weekly,
        );
        assert!(res.is_err());
    }
}
