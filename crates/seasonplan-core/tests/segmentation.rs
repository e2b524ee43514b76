//! Store segmentation into performance tiers.

mod common;

use seasonplan_core::segment::SHARE_SCALE;
use seasonplan_core::{segment, ClusterTier, EngineError, EngineWarning, SegmenterConfig, StoreId};

#[test]
fn separated_groups_map_to_tiers() {
    let assignment = segment(&common::stores(), &common::segmenter()).unwrap();
    for (prefix, tier) in [
        ("P", ClusterTier::Premium),
        ("M", ClusterTier::Mainstream),
        ("V", ClusterTier::Value),
    ] {
        for i in 1..=3 {
            let id = StoreId::new(format!("{prefix}{i}"));
            assert_eq!(assignment.tier_of(&id), Some(tier), "store {id}");
        }
    }
    assert!(!assignment.low_quality);
    assert!(assignment.silhouette > 0.4);
}

#[test]
fn shares_sum_to_one_exactly() {
    let assignment = segment(&common::stores(), &common::segmenter()).unwrap();
    let bps: u32 = assignment.clusters.iter().map(|c| c.share_bps).sum();
    assert_eq!(bps, SHARE_SCALE);
    let premium = assignment.cluster(ClusterTier::Premium).unwrap();
    // 600 of 1140 trailing units.
    assert!((premium.allocation_share() - 600.0 / 1140.0).abs() < 1e-3);
}

#[test]
fn fixed_seed_is_deterministic() {
    let a = segment(&common::stores(), &common::segmenter()).unwrap();
    let b = segment(&common::stores(), &common::segmenter()).unwrap();
    assert_eq!(a.assignments, b.assignments);
    assert_eq!(a.clusters, b.clusters);
}

#[test]
fn rejects_unsupported_k() {
    let config = SegmenterConfig {
        k: 4,
        ..SegmenterConfig::default()
    };
    let err = segment(&common::stores(), &config).unwrap_err();
    assert!(matches!(err, EngineError::InvalidParameter { parameter: "k", .. }));
}

#[test]
fn rejects_too_few_stores() {
    let stores = common::stores()[..2].to_vec();
    assert!(segment(&stores, &common::segmenter()).is_err());
}

#[test]
fn rejects_duplicate_store_ids() {
    let mut stores = common::stores();
    stores[1].store_id = StoreId::new("P1");
    assert!(segment(&stores, &common::segmenter()).is_err());
}

#[test]
fn invalid_feature_is_imputed_with_warning() {
    let mut stores = common::stores();
    stores[4].median_income = f64::NAN;
    let assignment = segment(&stores, &common::segmenter()).unwrap();
    assert_eq!(assignment.assignments.len(), stores.len());
    assert!(assignment.warnings.iter().any(|w| matches!(
        w,
        EngineWarning::DataQuality { subject, .. } if subject == "M2"
    )));
}

#[test]
fn new_store_joins_nearest_tier() {
    let assignment = segment(&common::stores(), &common::segmenter()).unwrap();
    let newcomer = common::store("P9", 205.0, 20_500.0, 91_000.0, 3);
    assert_eq!(
        assignment.assign_new_store(&newcomer),
        Some(ClusterTier::Premium)
    );
    let small = common::store("V9", 58.0, 7_900.0, 39_500.0, 1);
    assert_eq!(assignment.assign_new_store(&small), Some(ClusterTier::Value));
}
