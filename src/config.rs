use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::error::{FareError, Result};
use crate::forest::ForestParams;
use crate::model::{DEFAULT_META_PATH, DEFAULT_MODEL_PATH};

/// Training run settings. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub n_samples: usize,
    /// Seeds both data synthesis and the train/test shuffle.
    pub seed: u64,
    pub test_size: f64,
    pub forest: ForestParams,
    pub model_path: PathBuf,
    pub meta_path: PathBuf,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            n_samples: 2000,
            seed: 42,
            test_size: 0.2,
            forest: ForestParams::default(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            meta_path: PathBuf::from(DEFAULT_META_PATH),
        }
    }
}

impl TrainConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| FareError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| FareError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}
