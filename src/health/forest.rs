//! Isolation-forest outlier scoring.
//!
//! Points that random axis-aligned splits isolate in fewer steps are more
//! anomalous. The model is fitted and applied to the same window in one call;
//! nothing is retained between calls.

use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};

// ---

pub const FEATURES: usize = 3;

pub type Sample = [f64; FEATURES];

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Per-point decision scores for a fitted window.
///
/// Higher means more normal. The scores are shifted so the contamination
/// quantile sits at zero; points below zero are classified as outliers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutlierScores {
    pub decision: Vec<f64>,
}

impl OutlierScores {
    pub fn outlier_count(&self) -> usize {
        self.decision.iter().filter(|s| **s < 0.0).count()
    }
}

/// Fits a model over `samples` and scores each of them. The same input must
/// always produce the same scores.
pub trait OutlierScorer {
    fn fit_score(&self, samples: &[Sample]) -> OutlierScores;
}

#[derive(Debug, Clone, Copy)]
pub struct IsolationForest {
    pub trees: usize,
    pub max_samples: usize,
    /// Expected share of outliers in the window.
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self {
            trees: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
        }
    }
}

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

impl Node {
    fn grow(
        samples: &[Sample],
        members: Vec<usize>,
        depth: usize,
        limit: usize,
        rng: &mut StdRng,
    ) -> Node {
        // ---
        if depth >= limit || members.len() <= 1 {
            return Node::Leaf {
                size: members.len(),
            };
        }

        // Only features that still vary inside this node can split it.
        let spans: Vec<(usize, f64, f64)> = (0..FEATURES)
            .filter_map(|feature| {
                let (lo, hi) = members
                    .iter()
                    .map(|&i| samples[i][feature])
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                        (lo.min(v), hi.max(v))
                    });
                (hi > lo).then_some((feature, lo, hi))
            })
            .collect();
        if spans.is_empty() {
            return Node::Leaf {
                size: members.len(),
            };
        }

        let (feature, lo, hi) = spans[rng.gen_range(0..spans.len())];
        let threshold = rng.gen_range(lo..hi);
        let (left, right): (Vec<usize>, Vec<usize>) = members
            .into_iter()
            .partition(|&i| samples[i][feature] <= threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(Node::grow(samples, left, depth + 1, limit, rng)),
            right: Box::new(Node::grow(samples, right, depth + 1, limit, rng)),
        }
    }

    fn path_length(&self, sample: &Sample) -> f64 {
        // ---
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold { &**left } else { &**right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile, `q` in `[0, 100]`.
fn percentile(values: &[f64], q: f64) -> f64 {
    // ---
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

impl OutlierScorer for IsolationForest {
    fn fit_score(&self, samples: &[Sample]) -> OutlierScores {
        // ---
        let n = samples.len();
        if n == 0 || self.trees == 0 {
            return OutlierScores::default();
        }

        let subsample = self.max_samples.clamp(1, n);
        let depth_limit = (subsample as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let forest: Vec<Node> = (0..self.trees)
            .map(|_| {
                let members = index::sample(&mut rng, n, subsample).into_vec();
                Node::grow(samples, members, 0, depth_limit, &mut rng)
            })
            .collect();

        let norm = average_path_length(subsample).max(f64::EPSILON);
        let raw: Vec<f64> = samples
            .iter()
            .map(|sample| {
                let total: f64 = forest.iter().map(|tree| tree.path_length(sample)).sum();
                let mean_depth = total / forest.len() as f64;
                // Negated so that larger means more normal.
                -(2f64.powf(-mean_depth / norm))
            })
            .collect();

        let offset = percentile(&raw, self.contamination * 100.0);
        OutlierScores {
            decision: raw.iter().map(|s| s - offset).collect(),
        }
    }
}
