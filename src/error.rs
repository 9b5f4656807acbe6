use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FareError {
    #[error("Model files not found ({}). Please run `fare_predictor train` first to train the model.", path.display())]
    ModelNotFound { path: PathBuf },

    #[error("feature length mismatch: got {got}, expected {expected}")]
    FeatureMismatch { got: usize, expected: usize },

    #[error("feature metadata is missing column `{0}`")]
    MissingColumn(String),

    #[error("malformed model: {0}")]
    MalformedModel(String),

    #[error("cannot train on an empty dataset")]
    EmptyDataset,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed blob {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, FareError>;
