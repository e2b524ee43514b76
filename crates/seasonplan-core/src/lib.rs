//! Seasonal allocation and adaptive forecasting engine.
//!
//! Turns one category-level demand forecast into manufacturing, DC and
//! per-store commitments, decides when the forecast must be revised, and
//! recommends mid-season transfers and markdowns.

pub mod allocate;
pub mod batch;
pub mod domain;
pub mod markdown;
pub mod metrics;
pub mod obs;
pub mod policy;
pub mod reallocate;
pub mod reforecast;
pub mod replenish;
pub mod season;
pub mod segment;
pub mod telemetry;
pub mod variance;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use domain::{
    AllocationLayer, AllocationPlan, ClusterAllocation, ClusterTier, DcPool, EngineError,
    EngineWarning, ForecastSource, ForecastVector, InventoryState, Result, SharedDcPool,
    StoreAllocation, StoreId, StoreRecord,
};

pub use allocate::{allocate, apportion, manufacturing_quantity, split_dc_holdback};
pub use batch::open_seasons;
pub use markdown::{calculate as calculate_markdown, MarkdownResult, DEFAULT_ELASTICITY};
pub use metrics::METRICS;
pub use obs::SeasonSpan;
pub use policy::{ReplenishmentStrategy, SeasonPolicy};
pub use reallocate::{
    recommend as recommend_reallocation, PerformanceClass, ReallocationAnalysis,
    ReallocationConfig, ReallocationStrategy, StoreActuals, StorePerformance, TransferOrder,
    TransferReason, TransferSource,
};
pub use reforecast::{reforecast, PosteriorReforecast};
pub use replenish::{plan_week, FulfillmentStatus, ReplenishOrder, ReplenishmentPlan, StorePosition};
pub use season::{Season, SeasonInputs, SeasonLedger, WeekEvaluation};
pub use segment::{segment, ClusterAssignment, ClusterSummary, SegmenterConfig};
pub use telemetry::init_tracing;
pub use variance::{
    analyze as analyze_variance, should_reforecast, trend_direction, DecisionReason,
    ReforecastDecision, TrendDirection, VarianceReport, VarianceSeverity, VarianceThresholds,
};
