//! Z-score feature scaling fitted on the season's store population.

use serde::{Deserialize, Serialize};

use crate::domain::{StoreRecord, FEATURE_COUNT};

/// Per-feature mean and standard deviation.
///
/// Kept on the cluster assignment so stores added later are scaled with the
/// same parameters as the population the clusters were fitted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub means: [f64; FEATURE_COUNT],
    /// Population standard deviations; constant features store 1.0.
    pub std_devs: [f64; FEATURE_COUNT],
}

impl FeatureScaler {
    /// Fit on raw feature rows. `rows` must not be empty.
    pub fn fit(rows: &[[f64; FEATURE_COUNT]]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut means = [0.0; FEATURE_COUNT];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let mut std_devs = [0.0; FEATURE_COUNT];
        for row in rows {
            for j in 0..FEATURE_COUNT {
                std_devs[j] += (row[j] - means[j]).powi(2) / n;
            }
        }
        for sd in &mut std_devs {
            *sd = sd.sqrt();
            if *sd < f64::EPSILON {
                *sd = 1.0;
            }
        }
        Self { means, std_devs }
    }

    pub fn transform_row(&self, row: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            out[j] = (row[j] - self.means[j]) / self.std_devs[j];
        }
        out
    }

    /// Scale a store's features. Invalid numeric features map to the mean.
    pub fn transform(&self, store: &StoreRecord) -> [f64; FEATURE_COUNT] {
        let mut row = store.features();
        for (j, v) in row.iter_mut().enumerate() {
            if !v.is_finite() || *v < 0.0 {
                *v = self.means[j];
            }
        }
        self.transform_row(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_columns_have_zero_mean_unit_variance() {
        let rows = vec![
            [1.0, 10.0, 5.0, 1.0, 1.0, 1.0, 1.0],
            [2.0, 20.0, 5.0, 2.0, 1.0, 1.0, 1.0],
            [3.0, 30.0, 5.0, 3.0, 1.0, 1.0, 1.0],
        ];
        let scaler = FeatureScaler::fit(&rows);
        let scaled: Vec<_> = rows.iter().map(|r| scaler.transform_row(r)).collect();
        for j in 0..2 {
            let mean: f64 = scaled.iter().map(|r| r[j]).sum::<f64>() / 3.0;
            let var: f64 = scaled.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
        // Constant column scales to zero instead of dividing by zero.
        assert!(scaled.iter().all(|r| r[2] == 0.0));
    }
}
