//! Shared fixtures: nine stores in three clearly separated groups.

#![allow(dead_code)]

use seasonplan_core::{ForecastVector, SegmenterConfig, StoreId, StoreRecord};

pub fn store(id: &str, sales: f64, sqft: f64, income: f64, tier: u8) -> StoreRecord {
    StoreRecord {
        store_id: StoreId::new(id),
        avg_weekly_sales: sales,
        size_sqft: sqft,
        median_income: income,
        location_tier: tier,
        fashion_tier: tier,
        format: 4 - tier,
        region: 4 - tier,
    }
}

/// P* stores sell the most, V* the least.
pub fn stores() -> Vec<StoreRecord> {
    vec![
        store("P1", 210.0, 21_000.0, 92_000.0, 3),
        store("P2", 200.0, 20_000.0, 90_000.0, 3),
        store("P3", 190.0, 19_500.0, 88_000.0, 3),
        store("M1", 125.0, 14_500.0, 66_000.0, 2),
        store("M2", 120.0, 14_000.0, 65_000.0, 2),
        store("M3", 115.0, 13_500.0, 64_000.0, 2),
        store("V1", 65.0, 8_200.0, 41_000.0, 1),
        store("V2", 60.0, 8_000.0, 40_000.0, 1),
        store("V3", 55.0, 7_800.0, 39_000.0, 1),
    ]
}

/// Eight weeks of 1000 units: forecast total 8000.
pub fn flat_forecast() -> ForecastVector {
    ForecastVector::new(vec![1000.0; 8], 0.15).unwrap()
}

pub fn segmenter() -> SegmenterConfig {
    SegmenterConfig::default()
}
