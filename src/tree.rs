//! CART regression tree.
//!
//! Splits minimise the summed squared error of the two children. Nodes live in
//! a flat vector, root at index 0, children referenced by index.

use rand::{rngs::StdRng, seq::index::sample};
use serde::{Deserialize, Serialize};

use crate::error::{FareError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split; `None` tries all of them.
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

struct Builder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: TreeParams,
    n_features: usize,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fits on the rows selected by `sample_idx` (repeats allowed, as in a bootstrap).
    /// `x` must be non-empty and rectangular; the forest checks that.
    pub fn fit(
        params: TreeParams,
        x: &[Vec<f64>],
        y: &[f64],
        sample_idx: &[usize],
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map_or(0, |r| r.len());
        let mut b = Builder {
            x,
            y,
            params,
            n_features,
            rng,
            nodes: Vec::new(),
        };
        b.grow(sample_idx.to_vec(), 0);
        Self { nodes: b.nodes }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match self.nodes[i] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    /// Structural check for trees that did not come from `fit`. Children must
    /// sit after their parent, which rules out cycles and keeps every walk finite.
    pub fn validate(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(FareError::MalformedModel("tree has no nodes".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = *node
            {
                if feature >= n_features {
                    return Err(FareError::MalformedModel(format!(
                        "node {i} splits on feature {feature}, model has {n_features}"
                    )));
                }
                for child in [left, right] {
                    if child <= i || child >= self.nodes.len() {
                        return Err(FareError::MalformedModel(format!(
                            "node {i} has invalid child {child} ({} nodes)",
                            self.nodes.len()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], i: usize) -> usize {
            match nodes[i] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

impl Builder<'_> {
    fn grow(&mut self, idx: Vec<usize>, depth: usize) -> usize {
        let id = self.nodes.len();
        let n = idx.len();
        let (sum, sum_sq) = idx.iter().fold((0.0, 0.0), |(s, q), &i| {
            let v = self.y[i];
            (s + v, q + v * v)
        });
        let mean = if n == 0 { 0.0 } else { sum / n as f64 };
        self.nodes.push(Node::Leaf { value: mean });

        let parent_sse = sum_sq - sum * sum / n.max(1) as f64;
        let depth_exhausted = self.params.max_depth.is_some_and(|d| depth >= d);
        if depth_exhausted
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf.max(1)
            || parent_sse <= f64::EPSILON * sum_sq.max(1.0)
        {
            return id;
        }

        let best = match self.best_split(&idx) {
            Some(b) if b.sse < parent_sse => b,
            _ => return id,
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = idx
            .into_iter()
            .partition(|&i| self.x[i][best.feature] <= best.threshold);

        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        match self.params.max_features {
            Some(k) if k > 0 && k < self.n_features => {
                sample(&mut *self.rng, self.n_features, k).into_vec()
            }
            _ => (0..self.n_features).collect(),
        }
    }

    fn best_split(&mut self, idx: &[usize]) -> Option<BestSplit> {
        let n = idx.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let total_sum: f64 = idx.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = idx.iter().map(|&i| self.y[i] * self.y[i]).sum();

        let mut best: Option<BestSplit> = None;
        let mut sorted = idx.to_vec();

        for f in self.candidate_features() {
            let x = self.x;
            sorted.sort_by(|&a, &b| x[a][f].total_cmp(&x[b][f]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 1..n {
                let prev = sorted[k - 1];
                let v = self.y[prev];
                left_sum += v;
                left_sq += v * v;

                let lo = x[prev][f];
                let hi = x[sorted[k]][f];
                if lo == hi || k < min_leaf || n - k < min_leaf {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / k as f64)
                    + (right_sq - right_sum * right_sum / (n - k) as f64);

                if best.as_ref().map_or(true, |b| sse < b.sse) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(BestSplit {
                        feature: f,
                        threshold,
                        sse,
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn fit_all(params: TreeParams, x: &[Vec<f64>], y: &[f64]) -> RegressionTree {
        let idx: Vec<usize> = (0..y.len()).collect();
        let mut rng = StdRng::seed_from_u64(0);
        RegressionTree::fit(params, x, y, &idx, &mut rng)
    }

    #[test]
    fn learns_step_function() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();
        let tree = fit_all(TreeParams::default(), &x, &y);

        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.predict_row(&[3.0]), 1.0);
        assert_eq!(tree.predict_row(&[9.4]), 1.0);
        assert_eq!(tree.predict_row(&[9.6]), 5.0);
        assert_eq!(tree.predict_row(&[100.0]), 5.0);
    }

    #[test]
    fn picks_the_informative_feature() {
        let x: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![((i * 7) % 11) as f64, (i % 2) as f64])
            .collect();
        let y: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { -3.0 } else { 3.0 }).collect();
        let tree = fit_all(TreeParams::default(), &x, &y);
        match tree.nodes[0] {
            Node::Split { feature, .. } => assert_eq!(feature, 1),
            ref n => panic!("expected split at root, got {n:?}"),
        }
        assert_eq!(tree.predict_row(&[5.0, 0.0]), -3.0);
        assert_eq!(tree.predict_row(&[5.0, 1.0]), 3.0);
    }

    #[test]
    fn respects_max_depth() {
        let x: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..64).map(|i| (i * i) as f64).collect();
        let params = TreeParams {
            max_depth: Some(3),
            ..Default::default()
        };
        let tree = fit_all(params, &x, &y);
        assert!(tree.depth() <= 3);
        assert!(tree.n_nodes() <= 15);
    }

    #[test]
    fn min_samples_split_stops_growth() {
        let x: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let params = TreeParams {
            min_samples_split: 5,
            ..Default::default()
        };
        let tree = fit_all(params, &x, &y);
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict_row(&[0.0]), 2.5);
    }

    #[test]
    fn fitted_trees_pass_validation() {
        let x: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64, (i % 5) as f64]).collect();
        let y: Vec<f64> = (0..64).map(|i| (i * i % 17) as f64).collect();
        let tree = fit_all(TreeParams::default(), &x, &y);
        assert!(tree.n_nodes() > 3);
        tree.validate(2).unwrap();
    }

    #[test]
    fn validation_rejects_broken_structure() {
        let split = |feature, left, right| Node::Split {
            feature,
            threshold: 1.0,
            left,
            right,
        };
        let leaf = Node::Leaf { value: 1.0 };

        let empty = RegressionTree { nodes: vec![] };
        let out_of_range = RegressionTree {
            nodes: vec![split(0, 5, 6)],
        };
        let self_loop = RegressionTree {
            nodes: vec![split(0, 0, 0)],
        };
        let back_edge = RegressionTree {
            nodes: vec![split(0, 1, 2), split(0, 0, 2), leaf.clone()],
        };
        let bad_feature = RegressionTree {
            nodes: vec![split(3, 1, 2), leaf.clone(), leaf.clone()],
        };
        for t in [empty, out_of_range, self_loop, back_edge, bad_feature] {
            assert!(matches!(t.validate(2), Err(FareError::MalformedModel(_))), "{t:?}");
        }

        let ok = RegressionTree {
            nodes: vec![split(1, 1, 2), leaf.clone(), leaf],
        };
        ok.validate(2).unwrap();
    }

    #[test]
    fn constant_target_is_a_single_leaf() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y = vec![7.5; 10];
        let tree = fit_all(TreeParams::default(), &x, &y);
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict_row(&[42.0]), 7.5);
    }
}
