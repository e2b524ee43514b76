//! Error and warning taxonomy for the engine.
//!
//! Hard failures are [`EngineError`] values returned through [`Result`].
//! Soft conditions are [`EngineWarning`] values attached to the result record
//! next to a usable output.

use serde::{Deserialize, Serialize};

use super::store::{ClusterTier, StoreId};

/// Allocation layer at which a conservation check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layer", rename_all = "snake_case")]
pub enum AllocationLayer {
    /// Initial store total plus DC holdback against manufacturing quantity.
    DcSplit,
    /// Cluster totals against the initial store total.
    Cluster,
    /// Store initial allocations against their cluster total.
    Store { tier: ClusterTier },
    /// Per-store DC reserves against the DC holdback total.
    DcReserve,
}

impl std::fmt::Display for AllocationLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DcSplit => write!(f, "dc split"),
            Self::Cluster => write!(f, "cluster split"),
            Self::Store { tier } => write!(f, "store split ({tier})"),
            Self::DcReserve => write!(f, "dc reserve split"),
        }
    }
}

/// Engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Caller supplied an out-of-range or inconsistent input.
    #[error("invalid parameter {parameter}: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },

    /// Units were gained or lost between two allocation layers.
    #[error("conservation violated at {layer}: expected {expected} units, got {actual} ({context})")]
    Conservation {
        layer: AllocationLayer,
        expected: u64,
        actual: u64,
        context: String,
    },
}

impl EngineError {
    pub(crate) fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter,
            reason: reason.into(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Soft condition reported alongside a usable result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineWarning {
    /// Input or output quality is questionable, e.g. weak cluster separation.
    DataQuality { subject: String, detail: String },
    /// DC stock could not cover every requested unit.
    InsufficientInventory { requested: u64, available: u64 },
    /// A cluster total could not cover every store's two-week minimum.
    MinimumShortfall {
        tier: ClusterTier,
        required: u64,
        cluster_total: u64,
        affected_stores: Vec<StoreId>,
    },
}

/// Check that `children` sums to `parent` exactly.
pub(crate) fn ensure_conserved(
    layer: AllocationLayer,
    parent: u64,
    children: impl IntoIterator<Item = u64>,
    context: impl FnOnce() -> String,
) -> Result<()> {
    let actual: u64 = children.into_iter().sum();
    if actual != parent {
        tracing::error!(
            event = "allocation.conservation_violated",
            layer = %layer,
            expected = parent,
            actual = actual,
        );
        return Err(EngineError::Conservation {
            layer,
            expected: parent,
            actual,
            context: context(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_display() {
        let err = EngineError::invalid("safety_stock_pct", "must be within [0, 1], got 1.5");
        let msg = err.to_string();
        assert!(msg.contains("safety_stock_pct"));
        assert!(msg.contains("1.5"));
    }

    #[test]
    fn test_conservation_error_names_layer_and_numbers() {
        let err = ensure_conserved(AllocationLayer::Cluster, 5280, [2112, 1848, 1319], || {
            "3 clusters".to_string()
        })
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cluster split"));
        assert!(msg.contains("5280"));
        assert!(msg.contains("5279"));
    }

    #[test]
    fn test_conserved_passes() {
        assert!(ensure_conserved(AllocationLayer::DcSplit, 9600, [5280, 4320], String::new).is_ok());
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let w = EngineWarning::InsufficientInventory {
            requested: 120,
            available: 80,
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["kind"], "insufficient_inventory");
    }
}
