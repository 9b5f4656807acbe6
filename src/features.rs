//! Feature encoding shared by training and prediction.
//!
//! The column list and both vocabularies are persisted with the model, and
//! every vector is built by name and then laid out in `feature_columns`
//! order, so a reloaded model sees exactly the layout it was trained on.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{FareError, Result};
use crate::types::{City, TimeOfDay, TripRecord};

pub const DISTANCE_COL: &str = "distance_km";
pub const DURATION_COL: &str = "duration_min";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInfo {
    pub feature_columns: Vec<String>,
    pub cities: Vec<String>,
    pub time_options: Vec<String>,
}

pub fn city_column(city: &str) -> String {
    format!("city_{city}")
}

pub fn time_column(time_of_day: &str) -> String {
    format!("time_{time_of_day}")
}

impl FeatureInfo {
    /// Vocabulary and column layout used for freshly trained models.
    pub fn standard() -> Self {
        let cities: Vec<String> = City::ALL.iter().map(|c| c.as_str().to_string()).collect();
        let time_options: Vec<String> =
            TimeOfDay::ALL.iter().map(|t| t.as_str().to_string()).collect();

        let mut feature_columns = vec![DISTANCE_COL.to_string(), DURATION_COL.to_string()];
        feature_columns.extend(cities.iter().map(|c| city_column(c)));
        feature_columns.extend(time_options.iter().map(|t| time_column(t)));

        Self {
            feature_columns,
            cities,
            time_options,
        }
    }

    pub fn width(&self) -> usize {
        self.feature_columns.len()
    }

    /// Checks that every column the encoder writes is present in the layout.
    pub fn validate(&self) -> Result<()> {
        let required = [DISTANCE_COL.to_string(), DURATION_COL.to_string()]
            .into_iter()
            .chain(self.cities.iter().map(|c| city_column(c)))
            .chain(self.time_options.iter().map(|t| time_column(t)));

        for col in required {
            if !self.feature_columns.contains(&col) {
                return Err(FareError::MissingColumn(col));
            }
        }
        Ok(())
    }

    pub fn knows_city(&self, city: &str) -> bool {
        self.cities.iter().any(|c| c == city)
    }

    pub fn knows_time(&self, time_of_day: &str) -> bool {
        self.time_options.iter().any(|t| t == time_of_day)
    }

    /// Encodes one input. Unknown categories leave their one-hot group at zero.
    pub fn encode(&self, distance_km: f64, duration_min: f64, city: &str, time_of_day: &str) -> Vec<f64> {
        let mut named: HashMap<String, f64> = HashMap::with_capacity(4);
        named.insert(DISTANCE_COL.to_string(), distance_km);
        named.insert(DURATION_COL.to_string(), duration_min);
        if self.knows_city(city) {
            named.insert(city_column(city), 1.0);
        }
        if self.knows_time(time_of_day) {
            named.insert(time_column(time_of_day), 1.0);
        }
        order_from_named(&named, &self.feature_columns)
    }

    pub fn encode_record(&self, rec: &TripRecord) -> Vec<f64> {
        self.encode(
            rec.distance_km,
            rec.duration_min,
            rec.city.as_str(),
            rec.time_of_day.as_str(),
        )
    }

    /// Splits records into a feature matrix and the fare target.
    pub fn encode_dataset(&self, rows: &[TripRecord]) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x = rows.iter().map(|r| self.encode_record(r)).collect();
        let y = rows.iter().map(|r| r.fare).collect();
        (x, y)
    }
}

fn order_from_named(map: &HashMap<String, f64>, columns: &[String]) -> Vec<f64> {
    columns
        .iter()
        .map(|k| map.get(k).copied().unwrap_or(0.0))
        .collect()
}
