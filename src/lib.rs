//! Tunisian taxi fare predictor.
//!
//! Synthesizes rides from hand-coded pricing rules, fits a random forest
//! regressor, and scores new trips from the CLI or over HTTP. The feature
//! layout is persisted next to the model so prediction encodes inputs exactly
//! the way training did.

pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod forest;
pub mod metrics;
pub mod model;
pub mod server;
pub mod train;
pub mod tree;
pub mod types;

pub use error::FareError;
pub use features::FeatureInfo;
pub use forest::{ForestParams, RandomForest};
pub use model::FarePredictor;
pub use types::{City, PredictionOut, TimeOfDay, TripRecord};
