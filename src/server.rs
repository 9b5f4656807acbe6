use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    collections::VecDeque,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::model::FarePredictor;
use crate::types::{PredictionOut, TimeOfDay};

// ---------- Request/Response types ----------

#[derive(Deserialize, Debug)]
pub struct PredictRequest {
    pub distance_km: f64,
    pub duration_min: f64,
    pub city: String,
    pub time_of_day: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub t: i64,
    #[serde(flatten)]
    pub prediction: PredictionOut,
}

/// Raw paging parameters; unparsable values fall back to the defaults.
#[derive(Deserialize, Debug, Default)]
pub struct HistoryQuery {
    pub limit: Option<String>,
    pub skip: Option<String>,
}

const DEFAULT_HISTORY_LIMIT: usize = 50;

impl HistoryQuery {
    pub fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|s| s.trim().parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
    }

    pub fn skip(&self) -> usize {
        self.skip
            .as_deref()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Serialize, Debug)]
pub struct HistoryPage {
    pub predictions: Vec<HistoryEntry>,
    pub total: usize,
    pub limit: usize,
    pub skip: usize,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg.into() })))
}

// ---------- History ----------

/// Bounded, newest-first record of served predictions.
pub struct History {
    capacity: usize,
    entries: RwLock<VecDeque<HistoryEntry>>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn record(&self, entry: HistoryEntry) {
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            entries.pop_back();
        }
        entries.push_front(entry);
    }

    pub fn page(&self, limit: usize, skip: usize) -> HistoryPage {
        let entries = self.entries.read();
        HistoryPage {
            predictions: entries.iter().skip(skip).take(limit).cloned().collect(),
            total: entries.len(),
            limit,
            skip,
        }
    }
}

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<FarePredictor>,
    pub history: Arc<History>,
}

impl AppState {
    pub fn new(predictor: FarePredictor, history_capacity: usize) -> Self {
        Self {
            predictor: Arc::new(predictor),
            history: Arc::new(History::new(history_capacity)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/predict", post(predict))
        .route("/api/history", get(history))
        .route("/health", get(health))
        .with_state(state)
}

// ---------- Handlers ----------

fn validate(req: &PredictRequest) -> Result<(), ApiError> {
    if req.time_of_day.parse::<TimeOfDay>().is_err() {
        return Err(bad_request("time_of_day must be one of: morning, afternoon, night"));
    }
    if req.city.trim().is_empty() {
        return Err(bad_request("city must not be empty"));
    }
    for (name, v) in [("distance_km", req.distance_km), ("duration_min", req.duration_min)] {
        if !v.is_finite() || v < 0.0 {
            return Err(bad_request(format!("{name} must be a non-negative number")));
        }
    }
    Ok(())
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictionOut>, ApiError> {
    let Json(req) = payload.map_err(|rej| {
        tracing::debug!("rejected predict body: {}", rej.body_text());
        bad_request(format!(
            "Missing or invalid fields (distance_km, duration_min, city, time_of_day): {}",
            rej.body_text()
        ))
    })?;
    validate(&req)?;

    // Debug signal to confirm the encoded vector looks sane
    if std::env::var("LOG_PRED").ok().as_deref() == Some("1") {
        let info = state.predictor.feature_info();
        let vec = info.encode(req.distance_km, req.duration_min, &req.city, &req.time_of_day);
        let nz = vec.iter().filter(|x| **x != 0.0).count();
        let sample: Vec<String> = info
            .feature_columns
            .iter()
            .zip(&vec)
            .filter(|(_, v)| **v != 0.0)
            .map(|(name, v)| format!("{}={:.3}", name, v))
            .collect();
        tracing::info!(
            "recv city={} time={} in_dim={} nonzero={} sample=[{}]",
            req.city,
            req.time_of_day,
            vec.len(),
            nz,
            sample.join(", ")
        );
    }

    let out = state
        .predictor
        .predict(req.distance_km, req.duration_min, &req.city, &req.time_of_day)
        .map_err(|e| {
            tracing::error!("prediction error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to predict fare", "message": e.to_string() })),
            )
        })?;

    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default();
    state.history.record(HistoryEntry {
        t: now_ms,
        prediction: out.clone(),
    });

    Ok(Json(out))
}

pub async fn history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Json<HistoryPage> {
    let q = query.map(|Query(q)| q).unwrap_or_default();
    Json(state.history.page(q.limit(), q.skip()))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(t: i64) -> HistoryEntry {
        HistoryEntry {
            t,
            prediction: PredictionOut {
                distance_km: 1.0,
                duration_min: 2.0,
                city: "Tunis".into(),
                time_of_day: "night".into(),
                predicted_price: 3.0,
            },
        }
    }

    #[test]
    fn history_is_newest_first_and_bounded() {
        let h = History::new(3);
        for t in 0..5 {
            h.record(entry(t));
        }
        let page = h.page(10, 0);
        assert_eq!(page.total, 3);
        let ts: Vec<i64> = page.predictions.iter().map(|e| e.t).collect();
        assert_eq!(ts, vec![4, 3, 2]);

        let page = h.page(1, 1);
        assert_eq!(page.predictions.len(), 1);
        assert_eq!(page.predictions[0].t, 3);
    }

    #[test]
    fn history_entry_flattens_prediction() {
        let v = serde_json::to_value(entry(7)).unwrap();
        assert_eq!(v["t"], 7);
        assert_eq!(v["city"], "Tunis");
        assert_eq!(v["predicted_price"], 3.0);
    }

    #[test]
    fn history_query_falls_back_on_bad_values() {
        let q = HistoryQuery {
            limit: Some("abc".into()),
            skip: Some("-3".into()),
        };
        assert_eq!(q.limit(), 50);
        assert_eq!(q.skip(), 0);

        let q = HistoryQuery {
            limit: Some("0".into()),
            skip: Some("4".into()),
        };
        assert_eq!(q.limit(), 50);
        assert_eq!(q.skip(), 4);

        let q = HistoryQuery {
            limit: Some("5".into()),
            skip: None,
        };
        assert_eq!(q.limit(), 5);
    }

    #[test]
    fn validation_rules() {
        let mut req = PredictRequest {
            distance_km: 5.0,
            duration_min: 10.0,
            city: "Sousse".into(),
            time_of_day: "evening".into(),
        };
        assert_eq!(validate(&req).unwrap_err().0, StatusCode::BAD_REQUEST);
        req.time_of_day = "morning".into();
        assert!(validate(&req).is_ok());
        req.distance_km = -1.0;
        assert!(validate(&req).is_err());
        req.distance_km = 1.0;
        req.city = " ".into();
        assert!(validate(&req).is_err());
    }
}
