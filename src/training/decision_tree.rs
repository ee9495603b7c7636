//! CART regression tree
//!
//! Squared-error splits found by a sort-and-sweep over each candidate
//! feature, or by a single random threshold per feature for extremely
//! randomized trees. Reused as the base learner of the forests and of
//! gradient boosting.

use crate::error::{ResaleError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Minimum SSE reduction for a split to count
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// How split thresholds are chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    /// Best threshold over all midpoints
    #[default]
    Best,
    /// One uniform threshold between the node's min and max
    Random,
}

/// Features considered at each split
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    Fraction(f64),
    Fixed(usize),
    #[default]
    All,
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        match *self {
            MaxFeatures::Sqrt => n.sqrt().ceil() as usize,
            MaxFeatures::Log2 => n.log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n * f).ceil() as usize,
            MaxFeatures::Fixed(k) => k,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }
}

/// Growth limits shared by every tree learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub splitter: SplitStrategy,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            splitter: SplitStrategy::Best,
        }
    }
}

/// Running sums for squared error
#[derive(Clone, Copy, Default)]
struct Moments {
    n: f64,
    sum: f64,
    sq_sum: f64,
}

impl Moments {
    fn push(&mut self, y: f64) {
        self.n += 1.0;
        self.sum += y;
        self.sq_sum += y * y;
    }

    fn sse(&self) -> f64 {
        if self.n == 0.0 {
            0.0
        } else {
            (self.sq_sum - self.sum * self.sum / self.n).max(0.0)
        }
    }
}

struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub params: TreeParams,
    pub random_state: u64,
    root: Option<TreeNode>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new(TreeParams::default())
    }
}

impl DecisionTree {
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            random_state: 42,
            root: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.params.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.params.min_samples_leaf = n;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &indices)
    }

    /// Fit on a subset (or bootstrap multiset) of rows
    pub fn fit_indices(&mut self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(ResaleError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if indices.is_empty() {
            return Err(ResaleError::InvalidInput("cannot fit a tree on zero samples".to_string()));
        }

        self.n_features = x.ncols();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);
        let mut importances = vec![0.0; self.n_features];
        let root = self.build(x, y, indices.to_vec(), 0, &mut importances, &mut rng);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }
        self.root = Some(root);
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        importances: &mut [f64],
        rng: &mut Xoshiro256PlusPlus,
    ) -> TreeNode {
        let n_samples = indices.len();
        let mut moments = Moments::default();
        indices.iter().for_each(|&i| moments.push(y[i]));
        let value = moments.sum / moments.n;

        let stop = n_samples < self.params.min_samples_split
            || n_samples < 2 * self.params.min_samples_leaf
            || self.params.max_depth.is_some_and(|d| depth >= d)
            || moments.sse() <= MIN_GAIN;
        if stop {
            return TreeNode::Leaf { value, n_samples };
        }

        let features = self.candidate_features(rng);
        let best = match self.params.splitter {
            SplitStrategy::Best => self.best_split(x, y, &indices, &features, moments),
            SplitStrategy::Random => self.random_split(x, y, &indices, &features, moments, rng),
        };
        let Some(best) = best else {
            return TreeNode::Leaf { value, n_samples };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature]] <= best.threshold);
        importances[best.feature] += best.gain;

        TreeNode::Split {
            feature_idx: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build(x, y, left, depth + 1, importances, rng)),
            right: Box::new(self.build(x, y, right, depth + 1, importances, rng)),
            n_samples,
        }
    }

    /// All features, or a random subset drawn by partial Fisher-Yates
    fn candidate_features(&self, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let k = self.params.max_features.resolve(self.n_features);
        let mut features: Vec<usize> = (0..self.n_features).collect();
        if k < self.n_features {
            for i in 0..k {
                let j = rng.gen_range(i..self.n_features);
                features.swap(i, j);
            }
            features.truncate(k);
        }
        features
    }

    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent: Moments,
    ) -> Option<Candidate> {
        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent_sse = parent.sse();

        let per_feature: Vec<Option<Candidate>> = features
            .par_iter()
            .map(|&feature| {
                let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature]], y[i])).collect();
                pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut left = Moments::default();
                let mut best: Option<Candidate> = None;
                for k in 0..pairs.len() - 1 {
                    left.push(pairs[k].1);
                    let n_left = k + 1;
                    if n_left < min_leaf || pairs.len() - n_left < min_leaf {
                        continue;
                    }
                    if pairs[k].0 == pairs[k + 1].0 {
                        continue;
                    }
                    let right = Moments {
                        n: parent.n - left.n,
                        sum: parent.sum - left.sum,
                        sq_sum: parent.sq_sum - left.sq_sum,
                    };
                    let gain = parent_sse - left.sse() - right.sse();
                    if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                        best = Some(Candidate {
                            feature,
                            threshold: (pairs[k].0 + pairs[k + 1].0) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        pick_best(per_feature)
    }

    fn random_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent: Moments,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Option<Candidate> {
        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent_sse = parent.sse();

        let mut candidates = Vec::with_capacity(features.len());
        for &feature in features {
            let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(x[[i, feature]]), hi.max(x[[i, feature]]))
            });
            if lo >= hi {
                candidates.push(None);
                continue;
            }
            let threshold = rng.gen_range(lo..hi);

            let mut left = Moments::default();
            let mut right = Moments::default();
            for &i in indices {
                if x[[i, feature]] <= threshold {
                    left.push(y[i]);
                } else {
                    right.push(y[i]);
                }
            }
            if (left.n as usize) < min_leaf || (right.n as usize) < min_leaf {
                candidates.push(None);
                continue;
            }
            let gain = parent_sse - left.sse() - right.sse();
            candidates.push((gain > MIN_GAIN).then_some(Candidate { feature, threshold, gain }));
        }

        pick_best(candidates)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(ResaleError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(ResaleError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows().into_iter().map(|row| predict_row(root, row)).collect())
    }
}

/// Highest gain; the earliest candidate wins ties
fn pick_best(candidates: Vec<Option<Candidate>>) -> Option<Candidate> {
    candidates.into_iter().flatten().fold(None, |best, c| match best {
        Some(b) if b.gain >= c.gain => Some(b),
        _ => Some(c),
    })
}

pub(crate) fn predict_row(root: &TreeNode, row: ArrayView1<f64>) -> f64 {
    let mut node = root;
    loop {
        match node {
            TreeNode::Leaf { value, .. } => return *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                node = if row[*feature_idx] <= *threshold { left } else { right };
            }
        }
    }
}
