use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::config::TrainConfig;
use crate::dataset::{generate_synthetic_data, train_test_split, DatasetSummary};
use crate::features::FeatureInfo;
use crate::forest::RandomForest;
use crate::metrics::{mean_absolute_error, r2_score};
use crate::model::FarePredictor;

#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub n_samples: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub mae: f64,
    pub r2: f64,
    pub model_path: PathBuf,
    pub meta_path: PathBuf,
}

/// Generate, fit, evaluate on the held-out split, then persist both blobs.
pub fn train(cfg: &TrainConfig) -> Result<(FarePredictor, TrainReport)> {
    info!("generating {} synthetic rides (seed {})", cfg.n_samples, cfg.seed);
    let rows = generate_synthetic_data(cfg.n_samples, cfg.seed);

    let summary = DatasetSummary::describe(&rows);
    info!(
        "distance_km mean={:.2} std={:.2} min={:.2} max={:.2}",
        summary.distance_km.mean, summary.distance_km.std, summary.distance_km.min, summary.distance_km.max
    );
    info!(
        "duration_min mean={:.2} std={:.2} min={:.2} max={:.2}",
        summary.duration_min.mean, summary.duration_min.std, summary.duration_min.min, summary.duration_min.max
    );
    info!(
        "fare mean={:.2} std={:.2} min={:.2} max={:.2}",
        summary.fare.mean, summary.fare.std, summary.fare.min, summary.fare.max
    );
    info!("city distribution: {:?}", summary.city_counts);
    info!("time_of_day distribution: {:?}", summary.time_of_day_counts);

    let (train_rows, test_rows) =
        train_test_split(&rows, cfg.test_size, cfg.seed).context("failed to split dataset")?;

    let feature_info = FeatureInfo::standard();
    let (x_train, y_train) = feature_info.encode_dataset(&train_rows);
    let (x_test, y_test) = feature_info.encode_dataset(&test_rows);

    info!(
        "training random forest: {} trees, max_depth={:?}, min_samples_split={}",
        cfg.forest.n_estimators, cfg.forest.max_depth, cfg.forest.min_samples_split
    );
    let forest = RandomForest::fit(cfg.forest, &x_train, &y_train)
        .context("failed to fit random forest")?;

    let y_pred = forest.predict(&x_test)?;
    let mae = mean_absolute_error(&y_test, &y_pred);
    let r2 = r2_score(&y_test, &y_pred);
    info!("mean absolute error: {:.2} DT", mae);
    info!("r2 score: {:.4}", r2);

    let predictor = FarePredictor::new(forest, feature_info)?;
    predictor
        .save(&cfg.model_path, &cfg.meta_path)
        .context("failed to save model")?;
    info!("model saved to {}", cfg.model_path.display());
    info!("feature info saved to {}", cfg.meta_path.display());

    let report = TrainReport {
        n_samples: rows.len(),
        n_train: train_rows.len(),
        n_test: test_rows.len(),
        mae,
        r2,
        model_path: cfg.model_path.clone(),
        meta_path: cfg.meta_path.clone(),
    };
    Ok((predictor, report))
}
