//! Season allocation plan produced by the hierarchical allocator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::EngineWarning;
use super::store::{ClusterTier, StoreId};

/// Units assigned to one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAllocation {
    pub tier: ClusterTier,
    /// Cluster share of the initial store total (0.0-1.0).
    pub share: f64,
    /// Units shipped to the cluster's stores up front.
    pub cluster_total: u64,
    /// Units of the DC holdback earmarked for the cluster.
    pub dc_holdback: u64,
}

/// Units assigned to one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreAllocation {
    pub store_id: StoreId,
    pub tier: ClusterTier,
    /// Normalized hybrid factor within the cluster (sums to 1 per cluster).
    pub allocation_factor: f64,
    /// Two-week minimum derived from the week-1 forecast.
    pub minimum_allocation: u64,
    /// Units shipped before the season starts.
    pub initial_allocation: u64,
    /// Units held at the DC on the store's behalf.
    pub dc_reserve: u64,
}

impl StoreAllocation {
    /// Store's share of category demand: cluster share times in-cluster factor.
    pub fn demand_share(&self, cluster_share: f64) -> f64 {
        cluster_share * self.allocation_factor
    }

    /// Season entitlement: initial plus reserve.
    pub fn season_allocation(&self) -> u64 {
        self.initial_allocation + self.dc_reserve
    }
}

/// The season's baseline allocation.
///
/// # Invariants
///
/// - `initial_store_allocation_total + dc_holdback_qty == manufacturing_qty`
/// - cluster totals sum to `initial_store_allocation_total`
/// - store initial allocations in a cluster sum to its `cluster_total`
/// - store reserves sum to `dc_holdback_qty`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub plan_id: Uuid,
    pub manufacturing_qty: u64,
    pub dc_holdback_qty: u64,
    pub initial_store_allocation_total: u64,
    pub clusters: Vec<ClusterAllocation>,
    pub stores: Vec<StoreAllocation>,
    pub warnings: Vec<EngineWarning>,
    pub created_at: DateTime<Utc>,
}

impl AllocationPlan {
    pub fn cluster(&self, tier: ClusterTier) -> Option<&ClusterAllocation> {
        self.clusters.iter().find(|c| c.tier == tier)
    }

    pub fn store(&self, store_id: &StoreId) -> Option<&StoreAllocation> {
        self.stores.iter().find(|s| &s.store_id == store_id)
    }

    pub fn stores_in(&self, tier: ClusterTier) -> impl Iterator<Item = &StoreAllocation> {
        self.stores.iter().filter(move |s| s.tier == tier)
    }

    /// Store's share of category demand, 0.0 for unknown stores.
    pub fn demand_share(&self, store_id: &StoreId) -> f64 {
        self.store(store_id)
            .and_then(|s| self.cluster(s.tier).map(|c| s.demand_share(c.share)))
            .unwrap_or(0.0)
    }
}
