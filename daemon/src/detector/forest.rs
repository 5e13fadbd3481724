//! Isolation forest over dense rows

use rand::rngs::StdRng;
use rand::seq::index::sample as sample_indices;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_9;

#[derive(Debug, Clone, Copy)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            seed: 0,
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

#[derive(Debug)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn build(rows: &[&[f64]], height_limit: usize, rng: &mut StdRng) -> Self {
        Self {
            root: grow(rows, 0, height_limit, rng),
        }
    }

    fn path_length(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
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
                    node = if row[*feature] <= *threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

fn grow(rows: &[&[f64]], depth: usize, height_limit: usize, rng: &mut StdRng) -> Node {
    if depth >= height_limit || rows.len() <= 1 {
        return Node::Leaf { size: rows.len() };
    }

    let width = rows[0].len();
    let splittable: Vec<(usize, f64, f64)> = (0..width)
        .filter_map(|feature| {
            let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                (lo.min(r[feature]), hi.max(r[feature]))
            });
            (max > min).then_some((feature, min, max))
        })
        .collect();

    if splittable.is_empty() {
        return Node::Leaf { size: rows.len() };
    }

    let (feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
    let threshold = rng.gen_range(min..max);
    let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
        rows.iter().copied().partition(|r| r[feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(&left, depth + 1, height_limit, rng)),
        right: Box::new(grow(&right, depth + 1, height_limit, rng)),
    }
}

/// Expected path length of an unsuccessful BST search over `n` points
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

/// Linear-interpolated percentile, `q` in [0, 100]; 0 for no values
fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Per-row outcome of fitting and scoring a batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    /// Higher is more normal; negative means outlier
    pub decision: f64,
    pub outlier: bool,
}

#[derive(Debug)]
pub struct IsolationForest {
    config: ForestConfig,
    trees: Vec<IsolationTree>,
    psi: usize,
    offset: f64,
}

impl IsolationForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            psi: 0,
            offset: 0.0,
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Fit on `rows` and place the decision offset at the contamination quantile.
    /// `rows` must be non-empty and rectangular.
    pub fn fit(&mut self, rows: &[Vec<f64>], contamination: f64) {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.psi = self.config.max_samples.min(rows.len()).max(1);
        let height_limit = (self.psi.max(2) as f64).log2().ceil() as usize;

        self.trees = (0..self.config.n_estimators.max(1))
            .map(|_| {
                let picked: Vec<&[f64]> = sample_indices(&mut rng, rows.len(), self.psi)
                    .into_iter()
                    .map(|i| rows[i].as_slice())
                    .collect();
                IsolationTree::build(&picked, height_limit, &mut rng)
            })
            .collect();

        let scores: Vec<f64> = rows.iter().map(|r| self.score_sample(r)).collect();
        self.offset = percentile(&scores, contamination * 100.0);
    }

    /// Opposite of the anomaly score: in [-1, 0), lower is more abnormal
    pub fn score_sample(&self, row: &[f64]) -> f64 {
        let mean_path = self.trees.iter().map(|t| t.path_length(row)).sum::<f64>()
            / self.trees.len() as f64;
        let norm = average_path_length(self.psi);
        if norm == 0.0 {
            return -1.0;
        }
        -(2f64.powf(-mean_path / norm))
    }

    pub fn decision(&self, row: &[f64]) -> f64 {
        self.score_sample(row) - self.offset
    }

    pub fn predict(&self, row: &[f64]) -> Verdict {
        let decision = self.decision(row);
        Verdict {
            decision,
            outlier: decision < 0.0,
        }
    }
}
