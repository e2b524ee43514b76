//! Domain models for the engine.
//!
//! Canonical definitions for the core entities:
//! - `StoreRecord`: static store attributes for one season
//! - `ForecastVector`: immutable week-indexed demand forecast
//! - `AllocationPlan`: manufacturing, DC and store commitments
//! - `InventoryState` / `DcPool`: weekly stock positions

pub mod error;
pub mod forecast;
pub mod inventory;
pub mod plan;
pub mod store;

pub use error::{AllocationLayer, EngineError, EngineWarning, Result};
pub use forecast::{ForecastSource, ForecastVector};
pub use inventory::{DcPool, InventoryState, SharedDcPool};
pub use plan::{AllocationPlan, ClusterAllocation, StoreAllocation};
pub use store::{ClusterTier, StoreId, StoreRecord, FEATURE_COUNT};
