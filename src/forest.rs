use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FareError, Result};
use crate::tree::{RegressionTree, TreeParams};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(10),
            min_samples_split: 5,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
        }
    }
}

/// Bagged ensemble of regression trees; predictions are the tree mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    params: ForestParams,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(params: ForestParams, x: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        if x.is_empty() || params.n_estimators == 0 {
            return Err(FareError::EmptyDataset);
        }
        if x.len() != y.len() {
            return Err(FareError::InvalidInput(format!(
                "{} feature rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if let Some(bad) = x.iter().find(|r| r.len() != n_features) {
            return Err(FareError::FeatureMismatch {
                got: bad.len(),
                expected: n_features,
            });
        }

        let n = x.len();
        let tree_params = params.tree_params();
        let trees: Vec<RegressionTree> = (0..params.n_estimators)
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
                let idx: Vec<usize> = if params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(tree_params, x, y, &idx, &mut rng)
            })
            .collect();

        debug!(
            "fitted {} trees on {}x{}, avg nodes {:.1}",
            trees.len(),
            n,
            n_features,
            trees.iter().map(|t| t.n_nodes()).sum::<usize>() as f64 / trees.len() as f64
        );

        Ok(Self {
            n_features,
            params,
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Checks a deserialized forest before it is used for prediction.
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(FareError::MalformedModel("forest has no trees".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features).map_err(|e| match e {
                FareError::MalformedModel(msg) => FareError::MalformedModel(format!("tree {i}: {msg}")),
                other => other,
            })?;
        }
        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(FareError::FeatureMismatch {
                got: row.len(),
                expected: self.n_features,
            });
        }
        if self.trees.is_empty() {
            return Err(FareError::MalformedModel("forest has no trees".into()));
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<f64> = (0..n).map(|i| 2.0 * i as f64 + 1.0).collect();
        (x, y)
    }

    #[test]
    fn fit_is_reproducible_for_a_seed() {
        let (x, y) = linear_data(60);
        let p = ForestParams {
            n_estimators: 10,
            ..Default::default()
        };
        let a = RandomForest::fit(p, &x, &y).unwrap();
        let b = RandomForest::fit(p, &x, &y).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.n_trees(), 10);
    }

    #[test]
    fn predictions_stay_within_target_range() {
        let (x, y) = linear_data(80);
        let f = RandomForest::fit(
            ForestParams {
                n_estimators: 15,
                ..Default::default()
            },
            &x,
            &y,
        )
        .unwrap();
        for p in f.predict(&[vec![-100.0, 0.0], vec![40.0, 1.0], vec![1e6, 2.0]]).unwrap() {
            assert!((1.0..=159.0).contains(&p), "prediction {p}");
        }
        let mid = f.predict_row(&[40.0, 1.0]).unwrap();
        assert!((mid - 81.0).abs() < 10.0, "mid {mid}");
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(matches!(
            RandomForest::fit(ForestParams::default(), &[], &[]),
            Err(FareError::EmptyDataset)
        ));
        let x = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(matches!(
            RandomForest::fit(ForestParams::default(), &x, &[1.0, 2.0]),
            Err(FareError::FeatureMismatch { got: 1, expected: 2 })
        ));
        assert!(RandomForest::fit(ForestParams::default(), &[vec![1.0]], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn predict_checks_width() {
        let (x, y) = linear_data(20);
        let f = RandomForest::fit(
            ForestParams {
                n_estimators: 3,
                ..Default::default()
            },
            &x,
            &y,
        )
        .unwrap();
        assert!(matches!(
            f.predict_row(&[1.0]),
            Err(FareError::FeatureMismatch { got: 1, expected: 2 })
        ));
    }
}
