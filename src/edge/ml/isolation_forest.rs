//! Isolation-forest-shaped outlier scorer: a direct implementation of Liu
//! et al.'s isolation-forest algorithm over the standardized feature
//! vector. Decision score convention matches the usual one: positive or
//! near-zero for normal points, decreasing toward negative for outliers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const DEFAULT_SUBSAMPLE: usize = 256;

/// Fixed seed so training is reproducible across runs given the same
/// input rows.
const TRAINING_SEED: u64 = 0xCE11_5EED;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IsolationTree {
    Leaf { size: usize },
    Node { split_dim: usize, split_value: f64, left: Box<IsolationTree>, right: Box<IsolationTree> },
}

impl IsolationTree {
    fn build(rows: &[Vec<f64>], depth: usize, max_depth: usize, rng: &mut StdRng) -> Self {
        if rows.len() <= 1 || depth >= max_depth {
            return IsolationTree::Leaf { size: rows.len() };
        }

        let dim = rows[0].len();
        // try a few times to find a dimension with actual spread
        for _ in 0..dim.max(1) {
            let split_dim = rng.gen_range(0..dim);
            let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
            for row in rows {
                min = min.min(row[split_dim]);
                max = max.max(row[split_dim]);
            }
            if max > min {
                let split_value = rng.gen_range(min..max);
                let (left, right): (Vec<_>, Vec<_>) =
                    rows.iter().cloned().partition(|r| r[split_dim] < split_value);
                if !left.is_empty() && !right.is_empty() {
                    return IsolationTree::Node {
                        split_dim,
                        split_value,
                        left: Box::new(IsolationTree::build(&left, depth + 1, max_depth, rng)),
                        right: Box::new(IsolationTree::build(&right, depth + 1, max_depth, rng)),
                    };
                }
            }
        }
        IsolationTree::Leaf { size: rows.len() }
    }

    fn path_length(&self, row: &[f64], depth: usize) -> f64 {
        match self {
            IsolationTree::Leaf { size } => depth as f64 + average_path_adjustment(*size),
            IsolationTree::Node { split_dim, split_value, left, right } => {
                if row[*split_dim] < *split_value {
                    left.path_length(row, depth + 1)
                } else {
                    right.path_length(row, depth + 1)
                }
            }
        }
    }
}

/// `c(n)`: average path length of an unsuccessful search in a binary search
/// tree of `n` points (the isolation-forest normalization constant).
fn average_path_adjustment(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * (harmonic(n - 1.0)) - (2.0 * (n - 1.0) / n)
}

fn harmonic(n: f64) -> f64 {
    // H(n) ~= ln(n) + Euler-Mascheroni constant, accurate enough for the
    // subsample sizes used here (<= 256).
    if n <= 0.0 {
        0.0
    } else {
        n.ln() + 0.5772156649
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IsolationForest {
    pub trees: Vec<IsolationTree>,
    pub subsample_size: usize,
    /// Decision-score cutoff derived from the training data at the
    /// configured contamination rate; rows scoring below this are outliers.
    pub anomaly_threshold: f64,
}

impl IsolationForest {
    pub fn fit(rows: &[Vec<f64>], tree_count: usize, contamination: f64) -> Self {
        let subsample_size = rows.len().min(DEFAULT_SUBSAMPLE).max(1);
        let max_depth = (subsample_size as f64).log2().ceil().max(1.0) as usize;
        let mut rng = StdRng::seed_from_u64(TRAINING_SEED);

        let mut trees = Vec::with_capacity(tree_count);
        for _ in 0..tree_count {
            let sample: Vec<Vec<f64>> = if rows.len() > subsample_size {
                (0..subsample_size).map(|_| rows[rng.gen_range(0..rows.len())].clone()).collect()
            } else {
                rows.to_vec()
            };
            trees.push(IsolationTree::build(&sample, 0, max_depth, &mut rng));
        }

        let mut forest = IsolationForest { trees, subsample_size, anomaly_threshold: 0.0 };
        let mut scores: Vec<f64> = rows.iter().map(|r| forest.decision_score(r)).collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let idx = ((contamination * scores.len() as f64).round() as usize).min(scores.len().saturating_sub(1));
        forest.anomaly_threshold = scores.get(idx).copied().unwrap_or(0.0);
        forest
    }

    fn avg_path_length(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.path_length(row, 0)).sum::<f64>() / self.trees.len() as f64
    }

    /// Decision score `s`: positive/near-zero for normal points, decreasing
    /// toward negative for outliers (mirrors sklearn's `decision_function`
    /// convention, which the original system's severity/confidence mapping
    /// in spec.md §4.5 is written against).
    pub fn decision_score(&self, row: &[f64]) -> f64 {
        let c = average_path_adjustment(self.subsample_size).max(1e-9);
        let raw = 2f64.powf(-self.avg_path_length(row) / c);
        0.5 - raw
    }

    pub fn is_outlier(&self, row: &[f64]) -> bool {
        self.decision_score(row) < self.anomaly_threshold
    }
}
