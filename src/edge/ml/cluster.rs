//! Density-based (DBSCAN-shaped) clusterer for the C6 pattern sub-model.
//!
//! Runs over the last 50 samples' 7-dim rows; outlier fraction is
//! count(label == noise) / len(labels). Rows are standardized before
//! clustering so the configured `eps` is meaningful across features with
//! very different natural scales (dBm vs. TA units vs. seconds).

use super::scaler::Standardizer;

const NOISE: i32 = -1;

/// Runs DBSCAN over `rows` and returns the fraction labeled noise.
pub fn outlier_fraction(rows: &[Vec<f64>], eps: f64, min_points: usize) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let dim = rows[0].len();
    let scaler = Standardizer::fit(rows, dim);
    let scaled: Vec<Vec<f64>> = rows.iter().map(|r| scaler.transform(r)).collect();

    let labels = dbscan(&scaled, eps, min_points);
    let noise_count = labels.iter().filter(|&&l| l == NOISE).count();
    noise_count as f64 / labels.len() as f64
}

fn dbscan(points: &[Vec<f64>], eps: f64, min_points: usize) -> Vec<i32> {
    let n = points.len();
    let mut labels = vec![0; n]; // 0 = unvisited
    let mut cluster_id = 0;

    for i in 0..n {
        if labels[i] != 0 {
            continue;
        }
        let neighbors = region_query(points, i, eps);
        if neighbors.len() < min_points {
            labels[i] = NOISE;
            continue;
        }
        cluster_id += 1;
        labels[i] = cluster_id;
        let mut seeds = neighbors;
        let mut idx = 0;
        while idx < seeds.len() {
            let q = seeds[idx];
            if labels[q] == NOISE {
                labels[q] = cluster_id;
            }
            if labels[q] == 0 {
                labels[q] = cluster_id;
                let q_neighbors = region_query(points, q, eps);
                if q_neighbors.len() >= min_points {
                    for n_idx in q_neighbors {
                        if !seeds.contains(&n_idx) {
                            seeds.push(n_idx);
                        }
                    }
                }
            }
            idx += 1;
        }
    }

    labels
}

fn region_query(points: &[Vec<f64>], i: usize, eps: f64) -> Vec<usize> {
    (0..points.len()).filter(|&j| euclidean(&points[i], &points[j]) <= eps).collect()
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tight_cluster_has_no_outliers() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64 * 0.001, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).collect();
        let frac = outlier_fraction(&rows, 0.5, 5);
        assert!(frac < 0.5);
    }

    #[test]
    fn empty_rows_yield_zero_fraction() {
        assert_eq!(outlier_fraction(&[], 0.5, 5), 0.0);
    }
}
