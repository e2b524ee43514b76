//! Store records and performance tiers.

use serde::{Deserialize, Serialize};

/// Number of static features used for segmentation.
pub const FEATURE_COUNT: usize = 7;

/// Store identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(pub String);

impl StoreId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static store attributes, fixed for a season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub store_id: StoreId,
    /// Trailing-12-month average weekly unit sales.
    pub avg_weekly_sales: f64,
    /// Selling area in square feet.
    pub size_sqft: f64,
    /// Area median household income.
    pub median_income: f64,
    /// Location tier, 1 (weakest) to 3 (strongest).
    pub location_tier: u8,
    /// Fashion-positioning tier, higher is more fashion-forward.
    pub fashion_tier: u8,
    /// Store format code.
    pub format: u8,
    /// Region code.
    pub region: u8,
}

impl StoreRecord {
    /// Feature vector in a fixed order, used by the segmenter.
    pub fn features(&self) -> [f64; FEATURE_COUNT] {
        [
            self.avg_weekly_sales,
            self.size_sqft,
            self.median_income,
            f64::from(self.location_tier),
            f64::from(self.fashion_tier),
            f64::from(self.format),
            f64::from(self.region),
        ]
    }

    /// Name of the first non-finite or negative numeric feature, if any.
    pub(crate) fn invalid_feature(&self) -> Option<&'static str> {
        [
            ("avg_weekly_sales", self.avg_weekly_sales),
            ("size_sqft", self.size_sqft),
            ("median_income", self.median_income),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite() || *v < 0.0)
        .map(|(name, _)| name)
    }
}

/// Performance tier of a store cluster.
///
/// Tiers are ranked by descending mean trailing sales: the best-selling
/// cluster is `Premium`, the weakest is `Value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterTier {
    /// Premium / fast-growth stores.
    Premium,
    /// Mainstream stores.
    Mainstream,
    /// Value stores.
    Value,
}

impl ClusterTier {
    /// All tiers in rank order.
    pub const ALL: [ClusterTier; 3] = [Self::Premium, Self::Mainstream, Self::Value];

    /// Tier for a 0-based rank (0 = highest sales).
    pub fn from_rank(rank: usize) -> Option<Self> {
        Self::ALL.get(rank).copied()
    }

    pub fn rank(self) -> usize {
        match self {
            Self::Premium => 0,
            Self::Mainstream => 1,
            Self::Value => 2,
        }
    }
}

impl std::fmt::Display for ClusterTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Premium => write!(f, "premium"),
            Self::Mainstream => write!(f, "mainstream"),
            Self::Value => write!(f, "value"),
        }
    }
}
