//! Store segmentation into performance tiers.
//!
//! Stores are standardized on their seven static features, clustered with
//! k-means (k-means++ seeding, best of several restarts by inertia), scored
//! with the silhouette coefficient, and labelled by descending mean trailing
//! sales. Each tier's allocation share is its summed trailing sales over the
//! population total, kept in basis points so the shares sum to exactly one.

mod kmeans;
mod scaler;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use scaler::FeatureScaler;

use crate::domain::{
    ClusterTier, EngineError, EngineWarning, Result, StoreId, StoreRecord, FEATURE_COUNT,
};

/// Basis points in a whole share.
pub const SHARE_SCALE: u32 = 10_000;

/// Tuning for [`segment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Number of clusters. Tier labels exist for exactly three.
    pub k: usize,
    pub restarts: usize,
    pub max_iterations: usize,
    /// Convergence threshold on the largest centroid shift.
    pub tolerance: f64,
    pub seed: u64,
    /// Silhouette below this flags the assignment as low quality.
    pub min_silhouette: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            k: 3,
            restarts: 10,
            max_iterations: 300,
            tolerance: 1e-6,
            seed: 42,
            min_silhouette: 0.4,
        }
    }
}

/// Metadata for one labelled cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub tier: ClusterTier,
    pub member_count: usize,
    pub mean_trailing_sales: f64,
    pub total_trailing_sales: f64,
    /// Share of total trailing sales in basis points.
    pub share_bps: u32,
    /// Centroid in scaled feature space.
    pub centroid: [f64; FEATURE_COUNT],
}

impl ClusterSummary {
    /// Allocation share as a fraction (0.0-1.0).
    pub fn allocation_share(&self) -> f64 {
        f64::from(self.share_bps) / f64::from(SHARE_SCALE)
    }
}

/// Store-to-tier mapping for a season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub assignments: BTreeMap<StoreId, ClusterTier>,
    /// One summary per tier, in tier order.
    pub clusters: Vec<ClusterSummary>,
    pub silhouette: f64,
    pub inertia: f64,
    /// Set when the silhouette falls below the configured floor.
    pub low_quality: bool,
    pub scaler: FeatureScaler,
    pub warnings: Vec<EngineWarning>,
}

impl ClusterAssignment {
    pub fn tier_of(&self, store_id: &StoreId) -> Option<ClusterTier> {
        self.assignments.get(store_id).copied()
    }

    pub fn cluster(&self, tier: ClusterTier) -> Option<&ClusterSummary> {
        self.clusters.iter().find(|c| c.tier == tier)
    }

    /// Nearest-centroid tier for a store outside the fitted population,
    /// scaled with the season's scaler.
    pub fn assign_new_store(&self, store: &StoreRecord) -> Option<ClusterTier> {
        let scaled = self.scaler.transform(store);
        self.clusters
            .iter()
            .map(|c| (c.tier, kmeans::squared_distance(&scaled, &c.centroid)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(tier, _)| tier)
    }
}

/// Replace invalid numeric features with the mean of the valid values.
fn impute_features(
    stores: &[StoreRecord],
    warnings: &mut Vec<EngineWarning>,
) -> Vec<[f64; FEATURE_COUNT]> {
    let rows: Vec<[f64; FEATURE_COUNT]> = stores.iter().map(StoreRecord::features).collect();
    let valid = |v: f64| v.is_finite() && v >= 0.0;
    let mut means = [0.0; FEATURE_COUNT];
    for (j, mean) in means.iter_mut().enumerate() {
        let vals: Vec<f64> = rows.iter().map(|r| r[j]).filter(|v| valid(*v)).collect();
        if !vals.is_empty() {
            *mean = vals.iter().sum::<f64>() / vals.len() as f64;
        }
    }

    for store in stores {
        if let Some(feature) = store.invalid_feature() {
            tracing::warn!(store_id = %store.store_id, feature, "store feature imputed");
            warnings.push(EngineWarning::DataQuality {
                subject: store.store_id.to_string(),
                detail: format!("feature {feature} missing or invalid; imputed with population mean"),
            });
        }
    }

    rows.into_iter()
        .map(|mut row| {
            for (v, mean) in row.iter_mut().zip(&means) {
                if !valid(*v) {
                    *v = *mean;
                }
            }
            row
        })
        .collect()
}

/// Split `SHARE_SCALE` basis points by weight; the residual goes to the
/// largest share (lowest index on ties).
fn shares_in_bps(weights: &[f64]) -> Vec<u32> {
    let total: f64 = weights.iter().sum();
    let mut bps: Vec<u32> = if total > 0.0 {
        weights
            .iter()
            .map(|w| (w / total * f64::from(SHARE_SCALE)).round() as u32)
            .collect()
    } else {
        vec![0; weights.len()]
    };
    let assigned: i64 = bps.iter().map(|&b| i64::from(b)).sum();
    let residual = i64::from(SHARE_SCALE) - assigned;
    if let Some(largest) = (0..bps.len()).max_by(|&a, &b| bps[a].cmp(&bps[b]).then(b.cmp(&a))) {
        bps[largest] = (i64::from(bps[largest]) + residual).max(0) as u32;
    }
    bps
}

/// Partition `stores` into `config.k` performance tiers.
pub fn segment(stores: &[StoreRecord], config: &SegmenterConfig) -> Result<ClusterAssignment> {
    if config.k != ClusterTier::ALL.len() {
        return Err(EngineError::invalid(
            "k",
            format!(
                "tier labels are defined for exactly {} clusters, got {}",
                ClusterTier::ALL.len(),
                config.k
            ),
        ));
    }
    if stores.len() < config.k {
        return Err(EngineError::invalid(
            "stores",
            format!("need at least {} stores, got {}", config.k, stores.len()),
        ));
    }
    let mut seen = BTreeSet::new();
    if let Some(dup) = stores.iter().find(|s| !seen.insert(&s.store_id)) {
        return Err(EngineError::invalid(
            "stores",
            format!("duplicate store id {}", dup.store_id),
        ));
    }

    let mut warnings = Vec::new();
    let rows = impute_features(stores, &mut warnings);
    let scaler = FeatureScaler::fit(&rows);
    let points: Vec<_> = rows.iter().map(|r| scaler.transform_row(r)).collect();

    let fit = kmeans::fit(
        &points,
        config.k,
        config.restarts,
        config.max_iterations,
        config.tolerance,
        config.seed,
    );
    let silhouette = kmeans::silhouette(&points, &fit.labels, config.k);

    // Per raw cluster: (summed sales, summed fashion tier, member count).
    let mut stats = vec![(0.0f64, 0.0f64, 0usize); config.k];
    for (row, &label) in rows.iter().zip(&fit.labels) {
        stats[label].0 += row[0];
        stats[label].1 += row[4];
        stats[label].2 += 1;
    }
    let mean = |sum: f64, n: usize| if n == 0 { 0.0 } else { sum / n as f64 };

    let mut order: Vec<usize> = (0..config.k).collect();
    order.sort_by(|&a, &b| {
        let (sa, fa, na) = stats[a];
        let (sb, fb, nb) = stats[b];
        mean(sb, nb)
            .total_cmp(&mean(sa, na))
            .then(mean(fb, nb).total_cmp(&mean(fa, na)))
            .then(a.cmp(&b))
    });

    let weights: Vec<f64> = order.iter().map(|&c| stats[c].0).collect();
    let bps = shares_in_bps(&weights);

    let mut tier_of_raw = vec![ClusterTier::Value; config.k];
    let mut clusters = Vec::with_capacity(config.k);
    for (rank, &raw) in order.iter().enumerate() {
        let tier = ClusterTier::ALL[rank];
        tier_of_raw[raw] = tier;
        let (sales, _, n) = stats[raw];
        clusters.push(ClusterSummary {
            tier,
            member_count: n,
            mean_trailing_sales: mean(sales, n),
            total_trailing_sales: sales,
            share_bps: bps[rank],
            centroid: fit.centroids[raw],
        });
    }

    let assignments = stores
        .iter()
        .zip(&fit.labels)
        .map(|(s, &l)| (s.store_id.clone(), tier_of_raw[l]))
        .collect();

    let low_quality = silhouette < config.min_silhouette;
    if low_quality {
        tracing::warn!(
            event = "segment.low_silhouette",
            silhouette,
            floor = config.min_silhouette,
        );
        warnings.push(EngineWarning::DataQuality {
            subject: "cluster_assignment".to_string(),
            detail: format!(
                "silhouette {silhouette:.3} below {:.2}; tiers are weakly separated",
                config.min_silhouette
            ),
        });
    }

    tracing::info!(
        event = "segment.completed",
        stores = stores.len(),
        silhouette,
        inertia = fit.inertia,
    );

    Ok(ClusterAssignment {
        assignments,
        clusters,
        silhouette,
        inertia: fit.inertia,
        low_quality,
        scaler,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shares_in_bps_sum_exactly() {
        let bps = shares_in_bps(&[1.0, 1.0, 1.0]);
        assert_eq!(bps.iter().sum::<u32>(), SHARE_SCALE);
        assert_eq!(bps, vec![3334, 3333, 3333]);
    }

    #[test]
    fn test_shares_in_bps_exact_fractions() {
        assert_eq!(shares_in_bps(&[40.0, 35.0, 25.0]), vec![4000, 3500, 2500]);
    }

    #[test]
    fn test_shares_with_zero_sales_still_sum() {
        let bps = shares_in_bps(&[0.0, 0.0, 0.0]);
        assert_eq!(bps.iter().sum::<u32>(), SHARE_SCALE);
    }

    #[test]
    fn test_rejects_k_other_than_three() {
        let config = SegmenterConfig {
            k: 4,
            ..SegmenterConfig::default()
        };
        let err = segment(&[], &config).unwrap_err();
        assert!(err.to_string().contains("exactly 3"));
    }
}
