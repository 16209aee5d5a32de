//! In-process stand-in for the analysis backend, used by tests
//!
//! Serves canned responses on 127.0.0.1 and records what it was sent so tests
//! can check request shapes and whether a request was made at all.

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::ApiClient;

#[derive(Default)]
struct Shared {
    requests: AtomicUsize,
    bodies: Mutex<HashMap<String, String>>,
    queries: Mutex<HashMap<String, String>>,
    health_delay: Option<Duration>,
}

pub(crate) struct FakeBackend {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl FakeBackend {
    pub(crate) async fn start() -> Self {
        Self::spawn(None).await
    }

    pub(crate) async fn start_with_slow_health(delay: Duration) -> Self {
        Self::spawn(Some(delay)).await
    }

    async fn spawn(health_delay: Option<Duration>) -> Self {
        let shared = Arc::new(Shared {
            health_delay,
            ..Default::default()
        });

        let app = Router::new().fallback(handle).with_state(shared.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, shared }
    }

    pub(crate) fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn api_url(&self) -> String {
        format!("{}/api", self.origin())
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.origin(), path)
    }

    pub(crate) fn client(&self) -> ApiClient {
        ApiClient::new(&self.api_url(), Some(Duration::from_secs(5))).unwrap()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.shared.requests.load(Ordering::SeqCst)
    }

    pub(crate) fn last_body(&self, path: &str) -> Option<String> {
        self.shared.bodies.lock().unwrap().get(path).cloned()
    }

    pub(crate) fn last_query(&self, path: &str) -> Option<String> {
        self.shared.queries.lock().unwrap().get(path).cloned()
    }
}

async fn handle(State(shared): State<Arc<Shared>>, method: Method, uri: Uri, body: Bytes) -> Response {
    shared.requests.fetch_add(1, Ordering::SeqCst);

    let path = uri.path().to_string();
    let body = String::from_utf8_lossy(&body).to_string();
    shared.bodies.lock().unwrap().insert(path.clone(), body.clone());
    if let Some(query) = uri.query() {
        shared.queries.lock().unwrap().insert(path.clone(), query.to_string());
    }

    match (method.as_str(), path.as_str()) {
        ("GET", "/api/health") => {
            if let Some(delay) = shared.health_delay {
                tokio::time::sleep(delay).await;
            }
            Json(json!({"status": "healthy", "models_loaded": true})).into_response()
        }
        ("POST", "/api/text/analyze") => analyze_text(&body),
        ("POST", "/api/image/analyze") => Json(json!({
            "analysis_id": 101,
            "disaster_detected": true,
            "disaster_type": "Earthquake",
            "confidence_score": 0.91,
            "severity_score": 88.0,
            "severity_category": "Catastrophic",
            "detections": [
                {"class": "collapsed_building", "count": 4, "confidence": 0.87},
                {"class": "person", "count": 1, "confidence": 0.64}
            ],
            "image_url": "/uploads/images/quake.jpg"
        }))
        .into_response(),
        ("GET", "/api/text/history") => {
            let limit = limit_from(uri.query()).unwrap_or(10).min(4);
            let rows: Vec<_> = (0..limit)
                .map(|i| {
                    let detected = i % 2 == 0;
                    let disaster_type = if detected { json!("Flood") } else { json!(null) };
                    let severity = if detected { json!(55.0) } else { json!(null) };
                    json!({
                        "id": 40 - i,
                        "text": format!("Report number {}", i),
                        "created_at": "2024-07-01T14:05:00",
                        "disaster_detected": detected,
                        "disaster_type": disaster_type,
                        "severity_score": severity
                    })
                })
                .collect();
            Json(json!({ "analyses": rows })).into_response()
        }
        ("GET", "/api/image/history") => {
            let rows: Vec<_> = (0..5)
                .map(|i| {
                    json!({
                        "id": 90 - i,
                        "image_url": format!("/uploads/images/{}.jpg", i),
                        "created_at": "2024-07-02T09:00:00",
                        "disaster_detected": true,
                        "disaster_type": "Wildfire",
                        "severity_score": 72.5,
                        "severity_category": "High"
                    })
                })
                .collect();
            Json(json!({ "analyses": rows })).into_response()
        }
        ("POST", "/api/learning/feedback") => Json(json!({
            "message": "Feedback recorded",
            "total_feedback": 13,
            "should_retrain": false
        }))
        .into_response(),
        ("GET", "/api/learning/stats") => Json(json!({
            "total_feedback": 12,
            "training_count": 3,
            "should_retrain": false,
            "last_trained": "2024-06-30T10:00:00"
        }))
        .into_response(),
        ("GET", "/api/learning/feedback/recent") => Json(json!([
            {"text": "Fire near the school", "is_disaster": true, "user_id": "anonymous", "created_at": "2024-07-01T10:00:00"},
            {"text": "Great concert last night", "is_disaster": false, "user_id": "anonymous"}
        ]))
        .into_response(),
        ("POST", "/api/learning/retrain") => Json(json!({
            "status": "started",
            "message": "Retraining started"
        }))
        .into_response(),
        ("POST", "/api/location/detect-with-location") => {
            if body.contains("nowhere") {
                Json(json!({"has_location": false, "coordinates": []})).into_response()
            } else if body.contains("sunny") {
                Json(json!({
                    "is_disaster": false,
                    "has_location": true,
                    "coordinates": [{"location": "Paris", "full_address": "Paris, France", "latitude": 48.85, "longitude": 2.35}]
                }))
                .into_response()
            } else {
                Json(json!({
                    "is_disaster": true,
                    "disaster_type": "wildfire",
                    "confidence": 0.9,
                    "has_location": true,
                    "coordinates": [{"location": "Los Angeles", "full_address": "Los Angeles, California, United States", "latitude": 34.05, "longitude": -118.24}]
                }))
                .into_response()
            }
        }
        ("GET", "/api/broken") => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not Found"}))).into_response(),
    }
}

fn analyze_text(body: &str) -> Response {
    let text = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("text").and_then(|t| t.as_str()).map(str::to_lowercase))
        .unwrap_or_default();

    if text.contains("reject") {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": "Text is not a valid report"})),
        )
            .into_response();
    }
    if text.contains("crash") {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "Model inference failed"})),
        )
            .into_response();
    }

    if text.contains("earthquake") {
        Json(json!({
            "analysis_id": 1,
            "disaster_detected": true,
            "disaster_type": "Earthquake",
            "confidence_score": 0.94,
            "severity_score": 76.0,
            "severity_category": "High",
            "extracted_details": {"deaths": null, "injuries": "dozens", "buildings_collapsed": "several"},
            "temporal_info": {"day": null, "date": null, "month": null, "year": null},
            "geographic_info": {"city": "Aleppo", "country": "Syria", "latitude": 36.2, "longitude": 37.16, "accuracy": "city"}
        }))
        .into_response()
    } else {
        Json(json!({
            "analysis_id": 2,
            "disaster_detected": false,
            "disaster_type": null,
            "confidence_score": 0.12,
            "severity_score": 30.0,
            "severity_category": "Low",
            "geographic_info": {"city": "Paris", "country": "France"}
        }))
        .into_response()
    }
}

fn limit_from(query: Option<&str>) -> Option<usize> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "limit")
        .and_then(|(_, v)| v.parse().ok())
}
