//! Local anomaly detectors: univariate z-score and isolation forest.

use gridsmith_core::{GridError, GridResult};
use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};

use crate::provider::AnomalyOutput;

/// Z-score anomalies: `score = |x - mean| / std`, anomalous if `score > threshold`.
///
/// Mean and sample standard deviation come from `fit_rows` (all rows when
/// `None`). A zero standard deviation scores every row 0. Missing values get
/// a NaN score and are never labelled anomalous.
pub fn zscore_anomalies(
    values: &[f64],
    fit_rows: Option<&[usize]>,
    threshold: f64,
) -> GridResult<AnomalyOutput> {
    let fit: Vec<f64> = match fit_rows {
        Some(rows) => rows
            .iter()
            .filter_map(|&i| values.get(i).copied())
            .filter(|v| v.is_finite())
            .collect(),
        None => values.iter().copied().filter(|v| v.is_finite()).collect(),
    };
    if fit.len() < 2 {
        return Err(GridError::Validation(format!(
            "z-score needs at least 2 observed values, got {}",
            fit.len()
        )));
    }

    let n = fit.len() as f64;
    let mean = fit.iter().sum::<f64>() / n;
    let std = (fit.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();

    let scores: Vec<f64> = values
        .iter()
        .map(|v| {
            if !v.is_finite() {
                f64::NAN
            } else if std == 0.0 {
                0.0
            } else {
                (v - mean).abs() / std
            }
        })
        .collect();
    let labels = scores.iter().map(|s| *s > threshold).collect();
    Ok(AnomalyOutput {
        scores: Some(scores),
        labels,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsolationForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub random_state: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            random_state: 42,
        }
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            let harmonic = (n - 1.0).ln() + 0.577_215_664_901_532_9;
            2.0 * harmonic - 2.0 * (n - 1.0) / n
        }
    }
}

fn build_tree(
    data: &[Vec<f64>],
    indices: &mut [usize],
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= height_limit || indices.len() <= 1 {
        return Node::Leaf { size: indices.len() };
    }

    let n_features = data[indices[0]].len();
    let spread: Vec<(usize, f64, f64)> = (0..n_features)
        .filter_map(|f| {
            let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(data[i][f]), hi.max(data[i][f]))
            });
            (hi > lo).then_some((f, lo, hi))
        })
        .collect();
    if spread.is_empty() {
        return Node::Leaf { size: indices.len() };
    }

    let (feature, lo, hi) = spread[rng.gen_range(0..spread.len())];
    let threshold = rng.gen_range(lo..hi);

    let mut split = 0;
    for k in 0..indices.len() {
        if data[indices[k]][feature] < threshold {
            indices.swap(k, split);
            split += 1;
        }
    }
    let (left, right) = indices.split_at_mut(split);
    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(data, left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(data, right, depth + 1, height_limit, rng)),
    }
}

fn path_length(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] < *threshold {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// An ensemble of random isolation trees.
#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
    n_features: usize,
}

impl IsolationForest {
    /// Fit on `data`, one row per observation. Rows must be complete and equally wide.
    pub fn fit(data: &[Vec<f64>], params: &IsolationForestParams) -> GridResult<Self> {
        if data.len() < 2 {
            return Err(GridError::Validation(format!(
                "isolation forest needs at least 2 rows, got {}",
                data.len()
            )));
        }
        let n_features = data[0].len();
        if n_features == 0 {
            return Err(GridError::Validation("isolation forest needs at least one feature".into()));
        }
        if data
            .iter()
            .any(|row| row.len() != n_features || row.iter().any(|v| !v.is_finite()))
        {
            return Err(GridError::Validation(
                "isolation forest input must be complete numeric rows".into(),
            ));
        }
        if params.n_estimators == 0 || params.max_samples < 2 {
            return Err(GridError::Config(
                "n_estimators must be >= 1 and max_samples >= 2".into(),
            ));
        }

        let sample_size = params.max_samples.min(data.len());
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.random_state);

        let trees = (0..params.n_estimators)
            .map(|_| {
                let mut indices = index::sample(&mut rng, data.len(), sample_size).into_vec();
                build_tree(data, &mut indices, 0, height_limit, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            sample_size,
            n_features,
        })
    }

    /// Isolation score `2^(-E[h(x)] / c(ψ))` in (0, 1]; higher is more anomalous.
    pub fn score_samples(&self, data: &[Vec<f64>]) -> GridResult<Vec<f64>> {
        let norm = average_path_length(self.sample_size);
        data.iter()
            .map(|row| {
                if row.len() != self.n_features {
                    return Err(GridError::Validation(format!(
                        "row has {} features, forest was fitted on {}",
                        row.len(),
                        self.n_features
                    )));
                }
                let mean_depth = self
                    .trees
                    .iter()
                    .map(|tree| path_length(tree, row, 0))
                    .sum::<f64>()
                    / self.trees.len() as f64;
                Ok(2f64.powf(-mean_depth / norm))
            })
            .collect()
    }
}

/// Linear-interpolated quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Fit a forest and label the top `contamination` fraction of scores as anomalies.
pub fn isolation_forest_anomalies(
    data: &[Vec<f64>],
    params: &IsolationForestParams,
) -> GridResult<AnomalyOutput> {
    if !(params.contamination > 0.0 && params.contamination <= 0.5) {
        return Err(GridError::Config(format!(
            "contamination must be in (0, 0.5], got {}",
            params.contamination
        )));
    }
    let forest = IsolationForest::fit(data, params)?;
    let scores = forest.score_samples(data)?;

    let mut sorted = scores.clone();
    sorted.sort_by(f64::total_cmp);
    let cutoff = quantile(&sorted, 1.0 - params.contamination);
    let labels = scores.iter().map(|s| *s > cutoff).collect();

    Ok(AnomalyOutput {
        scores: Some(scores),
        labels,
    })
}
