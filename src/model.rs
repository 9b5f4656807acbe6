use serde::{de::DeserializeOwned, Serialize};
use std::{fs, io, path::Path};
use tracing::{debug, warn};

use crate::error::{FareError, Result};
use crate::features::FeatureInfo;
use crate::forest::RandomForest;
use crate::types::{round_to, PredictionOut};

pub const DEFAULT_MODEL_PATH: &str = "model.json";
pub const DEFAULT_META_PATH: &str = "model_features.json";

/// A fitted forest plus the feature layout it was trained on.
#[derive(Debug, Clone)]
pub struct FarePredictor {
    forest: RandomForest,
    info: FeatureInfo,
}

impl FarePredictor {
    pub fn new(forest: RandomForest, info: FeatureInfo) -> Result<Self> {
        info.validate()?;
        forest.validate()?;
        if forest.n_features() != info.width() {
            return Err(FareError::FeatureMismatch {
                got: forest.n_features(),
                expected: info.width(),
            });
        }
        Ok(Self { forest, info })
    }

    /// Loads both blobs. A missing file is reported as [`FareError::ModelNotFound`].
    pub fn load(model_path: impl AsRef<Path>, meta_path: impl AsRef<Path>) -> Result<Self> {
        let model_path = model_path.as_ref();
        let meta_path = meta_path.as_ref();

        let forest: RandomForest = read_blob(model_path)?;
        let info: FeatureInfo = read_blob(meta_path)?;
        let params = forest.params();
        debug!(
            "loaded {} trees (max_depth={:?}, min_samples_split={}, seed={}); feature_columns[{}]: {:?}",
            forest.n_trees(),
            params.max_depth,
            params.min_samples_split,
            params.seed,
            info.width(),
            info.feature_columns
        );
        Self::new(forest, info)
    }

    pub fn save(&self, model_path: impl AsRef<Path>, meta_path: impl AsRef<Path>) -> Result<()> {
        write_blob(model_path.as_ref(), &self.forest)?;
        write_blob(meta_path.as_ref(), &self.info)
    }

    pub fn feature_info(&self) -> &FeatureInfo {
        &self.info
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Predicted fare in DT, rounded to 2 decimals and never negative.
    pub fn predict_fare(
        &self,
        distance_km: f64,
        duration_min: f64,
        city: &str,
        time_of_day: &str,
    ) -> Result<f64> {
        if !distance_km.is_finite() || !duration_min.is_finite() {
            return Err(FareError::InvalidInput(format!(
                "distance_km and duration_min must be finite (got {distance_km}, {duration_min})"
            )));
        }
        if !self.info.knows_city(city) {
            warn!("city `{city}` not in training vocabulary; city columns left at zero");
        }
        if !self.info.knows_time(time_of_day) {
            warn!("time_of_day `{time_of_day}` not in training vocabulary; time columns left at zero");
        }

        let features = self.info.encode(distance_km, duration_min, city, time_of_day);
        let raw = self.forest.predict_row(&features)?;
        Ok(round_to(raw, 2).max(0.0))
    }

    pub fn predict(
        &self,
        distance_km: f64,
        duration_min: f64,
        city: &str,
        time_of_day: &str,
    ) -> Result<PredictionOut> {
        let predicted_price = self.predict_fare(distance_km, duration_min, city, time_of_day)?;
        Ok(PredictionOut {
            distance_km,
            duration_min,
            city: city.to_string(),
            time_of_day: time_of_day.to_string(),
            predicted_price,
        })
    }
}

fn read_blob<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let txt = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => FareError::ModelNotFound {
            path: path.to_path_buf(),
        },
        _ => FareError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    serde_json::from_str(&txt).map_err(|source| FareError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_blob<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| FareError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let txt = serde_json::to_string(value).map_err(|source| FareError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, txt).map_err(|source| FareError::Io {
        path: path.to_path_buf(),
        source,
    })
}
