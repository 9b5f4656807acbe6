//! Synthetic Tunisian taxi rides.
//!
//! Pricing rules:
//! - base fare 1.000 to 2.000 DT
//! - 0.7 to 1.2 DT per km, scaled by the city multiplier
//! - night tariff +20% on the per-km price
//! - +/-5% noise on the total for traffic and route variation

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{FareError, Result};
use crate::types::{round_to, City, TimeOfDay, TripRecord};

pub fn generate_synthetic_data(n_samples: usize, seed: u64) -> Vec<TripRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_samples).map(|_| synth_row(&mut rng)).collect()
}

fn synth_row(rng: &mut StdRng) -> TripRecord {
    let distance_km = rng.gen_range(0.5..50.0);

    // ~30 km/h average in town
    let duration_min = f64::max(2.0, distance_km * 2.0 + rng.gen_range(-5.0..5.0));

    let city = City::ALL[rng.gen_range(0..City::ALL.len())];
    let time_of_day = TimeOfDay::ALL[rng.gen_range(0..TimeOfDay::ALL.len())];

    let base_fare = rng.gen_range(1.0..2.0);
    let mut price_per_km = rng.gen_range(0.7..1.2) * city.price_multiplier();
    if time_of_day == TimeOfDay::Night {
        price_per_km *= 1.2;
    }

    let mut fare = base_fare + distance_km * price_per_km;
    fare *= rng.gen_range(0.95..1.05);

    TripRecord {
        distance_km: round_to(distance_km, 2),
        duration_min: round_to(duration_min, 1),
        city,
        time_of_day,
        fare: round_to(fare, 2),
    }
}

/// Seeded shuffle, then the first `round(n * test_size)` rows become the test set.
/// Returns `(train, test)`.
pub fn train_test_split<T: Clone>(rows: &[T], test_size: f64, seed: u64) -> Result<(Vec<T>, Vec<T>)> {
    if !(0.0..1.0).contains(&test_size) || test_size == 0.0 {
        return Err(FareError::InvalidInput(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }
    let n_test = (rows.len() as f64 * test_size).round() as usize;
    if n_test == 0 || n_test >= rows.len() {
        return Err(FareError::InvalidInput(format!(
            "cannot split {} rows with test_size {test_size}",
            rows.len()
        )));
    }

    let mut idx: Vec<usize> = (0..rows.len()).collect();
    idx.shuffle(&mut StdRng::seed_from_u64(seed));

    let test = idx[..n_test].iter().map(|&i| rows[i].clone()).collect();
    let train = idx[n_test..].iter().map(|&i| rows[i].clone()).collect();
    Ok((train, test))
}

// ---------- Summary ----------

#[derive(Debug, Clone, Serialize)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl ColumnStats {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        let v: Vec<f64> = values.collect();
        let count = v.len();
        if count == 0 {
            return Self { count, mean: 0.0, std: 0.0, min: 0.0, max: 0.0 };
        }
        let mean = v.iter().sum::<f64>() / count as f64;
        // sample std, like pandas describe()
        let std = if count < 2 {
            0.0
        } else {
            (v.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (count - 1) as f64).sqrt()
        };
        let min = v.iter().copied().fold(f64::INFINITY, f64::min);
        let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self { count, mean, std, min, max }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub distance_km: ColumnStats,
    pub duration_min: ColumnStats,
    pub fare: ColumnStats,
    pub city_counts: BTreeMap<String, usize>,
    pub time_of_day_counts: BTreeMap<String, usize>,
}

impl DatasetSummary {
    pub fn describe(rows: &[TripRecord]) -> Self {
        let mut city_counts = BTreeMap::new();
        let mut time_of_day_counts = BTreeMap::new();
        for r in rows {
            *city_counts.entry(r.city.to_string()).or_insert(0) += 1;
            *time_of_day_counts.entry(r.time_of_day.to_string()).or_insert(0) += 1;
        }
        Self {
            distance_km: ColumnStats::of(rows.iter().map(|r| r.distance_km)),
            duration_min: ColumnStats::of(rows.iter().map(|r| r.duration_min)),
            fare: ColumnStats::of(rows.iter().map(|r| r.fare)),
            city_counts,
            time_of_day_counts,
        }
    }
}
