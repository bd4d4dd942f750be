//! Isolation forest outlier model
//!
//! Points that are isolated by few random axis-aligned splits are
//! outliers. Scores follow the convention `-2^(-E[h(x)] / c(n))`, so a
//! lower score means a more anomalous point.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Number of trees in the ensemble
const DEFAULT_NUM_TREES: usize = 100;

/// Upper bound on the sub-sample each tree is grown on
const DEFAULT_MAX_SAMPLES: usize = 256;

/// Euler-Mascheroni constant for the harmonic number approximation
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful BST search over `n` points
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Point in `[min, max)` at fraction `t` of the way from `min`
///
/// Interpolates instead of scaling `max - min`, which overflows for
/// columns spanning most of the f64 range.
fn split_point(min: f64, max: f64, t: f64) -> f64 {
    let point = min * (1.0 - t) + max * t;
    if point.is_finite() && point >= min && point < max {
        point
    } else {
        min
    }
}

/// Node of an isolation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IsolationNode {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
}

/// A single randomly grown isolation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    fn grow(data: &[Vec<f64>], rows: Vec<usize>, height_limit: usize, rng: &mut StdRng) -> Self {
        Self {
            root: Self::grow_node(data, rows, 0, height_limit, rng),
        }
    }

    fn grow_node(
        data: &[Vec<f64>],
        rows: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> IsolationNode {
        if depth >= height_limit || rows.len() <= 1 {
            return IsolationNode::Leaf { size: rows.len() };
        }

        // Only features that still vary inside this node can split it
        let num_features = data[rows[0]].len();
        let candidates: Vec<(usize, f64, f64)> = (0..num_features)
            .filter_map(|feature| {
                let (min, max) = rows.iter().fold((f64::MAX, f64::MIN), |(lo, hi), &r| {
                    let v = data[r][feature];
                    (lo.min(v), hi.max(v))
                });
                (max > min).then_some((feature, min, max))
            })
            .collect();

        if candidates.is_empty() {
            return IsolationNode::Leaf { size: rows.len() };
        }

        let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = split_point(min, max, rng.gen());

        let (left, right): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| data[r][feature] < threshold);

        IsolationNode::Split {
            feature,
            threshold,
            left: Box::new(Self::grow_node(data, left, depth + 1, height_limit, rng)),
            right: Box::new(Self::grow_node(data, right, depth + 1, height_limit, rng)),
        }
    }

    /// Path length of `point`, corrected for unexpanded leaves
    pub fn path_length(&self, point: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;
        loop {
            match node {
                IsolationNode::Leaf { size } => return depth + average_path_length(*size),
                IsolationNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if point[*feature] < *threshold {
                        &**left
                    } else {
                        &**right
                    };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Ensemble of isolation trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    pub num_trees: usize,
    pub max_samples: usize,
    pub seed: u64,
    trees: Vec<IsolationTree>,
    /// Sub-sample size actually used during fit
    sample_size: usize,
}

impl IsolationForest {
    /// Create an unfitted forest with default parameters
    pub fn new(seed: u64) -> Self {
        Self {
            num_trees: DEFAULT_NUM_TREES,
            max_samples: DEFAULT_MAX_SAMPLES,
            seed,
            trees: Vec::new(),
            sample_size: 0,
        }
    }

    pub fn with_num_trees(mut self, num_trees: usize) -> Self {
        self.num_trees = num_trees.max(1);
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples.max(1);
        self
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Grow the ensemble over `data` (rows of equal length)
    ///
    /// All randomness is drawn from a single generator seeded with
    /// `self.seed`, so equal inputs give equal forests.
    pub fn fit(&mut self, data: &[Vec<f64>]) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let sample_size = self.max_samples.min(data.len());
        let height_limit = (sample_size.max(2) as f64).log2().ceil() as usize;

        self.sample_size = sample_size;
        self.trees = (0..self.num_trees)
            .map(|_| {
                let rows = index::sample(&mut rng, data.len(), sample_size).into_vec();
                IsolationTree::grow(data, rows, height_limit, &mut rng)
            })
            .collect();
    }

    /// Raw scores in [-1, 0], lower is more anomalous
    pub fn score_samples(&self, data: &[Vec<f64>]) -> Vec<f64> {
        let norm = average_path_length(self.sample_size);
        data.iter()
            .map(|point| {
                if self.trees.is_empty() || norm <= 0.0 {
                    return -0.5;
                }
                let mean_depth = self
                    .trees
                    .iter()
                    .map(|tree| tree.path_length(point))
                    .sum::<f64>()
                    / self.trees.len() as f64;
                -(2f64.powf(-mean_depth / norm))
            })
            .collect()
    }
}

/// Percentile with linear interpolation between closest ranks
pub(crate) fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
