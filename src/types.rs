use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::FareError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum City {
    Tunis,
    Sousse,
    Sfax,
    Bizerte,
    Gabes,
    Kairouan,
    Gafsa,
}

impl City {
    /// Fixed vocabulary order; one-hot columns follow it.
    pub const ALL: [City; 7] = [
        City::Tunis,
        City::Sousse,
        City::Sfax,
        City::Bizerte,
        City::Gabes,
        City::Kairouan,
        City::Gafsa,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            City::Tunis => "Tunis",
            City::Sousse => "Sousse",
            City::Sfax => "Sfax",
            City::Bizerte => "Bizerte",
            City::Gabes => "Gabes",
            City::Kairouan => "Kairouan",
            City::Gafsa => "Gafsa",
        }
    }

    /// Per-km price factor relative to Tunis.
    pub fn price_multiplier(self) -> f64 {
        match self {
            City::Tunis => 1.0,
            City::Sousse | City::Sfax => 0.95,
            _ => 0.90,
        }
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for City {
    type Err = FareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        City::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| FareError::InvalidInput(format!("unknown city `{s}`")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Night,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 3] = [TimeOfDay::Morning, TimeOfDay::Afternoon, TimeOfDay::Night];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Night => "night",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeOfDay {
    type Err = FareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeOfDay::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                FareError::InvalidInput(format!(
                    "time_of_day must be one of: morning, afternoon, night (got `{s}`)"
                ))
            })
    }
}

/// One synthetic ride. `fare` is in DT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub distance_km: f64,
    pub duration_min: f64,
    pub city: City,
    pub time_of_day: TimeOfDay,
    pub fare: f64,
}

/// Result object printed by `predict` and returned by `/api/predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOut {
    pub distance_km: f64,
    pub duration_min: f64,
    pub city: String,
    pub time_of_day: String,
    pub predicted_price: f64,
}

pub(crate) fn round_to(x: f64, decimals: i32) -> f64 {
    let p = 10f64.powi(decimals);
    (x * p).round() / p
}
