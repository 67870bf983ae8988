//! Per-column standardizer, fitted once at training time and persisted
//! alongside the isolation-forest ensemble.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Standardizer {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Standardizer {
    pub fn fit(rows: &[Vec<f64>], dim: usize) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mean = vec![0.0; dim];
        for row in rows {
            for (i, v) in row.iter().enumerate() {
                mean[i] += v;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut variance = vec![0.0; dim];
        for row in rows {
            for (i, v) in row.iter().enumerate() {
                variance[i] += (v - mean[i]).powi(2);
            }
        }
        let std: Vec<f64> = variance
            .into_iter()
            .map(|v| {
                let s = (v / n).sqrt();
                // a zero-variance column would divide by zero at transform
                // time; treat it as already-standardized (std=1).
                if s < 1e-9 { 1.0 } else { s }
            })
            .collect();

        Standardizer { mean, std }
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(i, v)| (v - self.mean[i]) / self.std[i])
            .collect()
    }
}
