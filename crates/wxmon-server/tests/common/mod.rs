#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;
use wxmon_alert::engine::AlertEngine;
use wxmon_alert::registry::RuleRegistry;
use wxmon_alert::rule::{AlertRule, RuleDefaults};
use wxmon_metrics::memory::MemorySink;
use wxmon_server::app;
use wxmon_server::config::{ServerConfig, SinkKind};
use wxmon_server::dispatcher::{DispatchStats, Dispatcher};
use wxmon_server::state::AppState;

pub struct TestContext {
    pub sink: Arc<MemorySink>,
    pub registry: Arc<RuleRegistry>,
    pub stats: Arc<DispatchStats>,
    pub state: AppState,
    pub app: axum::Router,
}

impl TestContext {
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            AlertEngine::new(self.registry.clone()),
            self.sink.clone(),
            self.stats.clone(),
        )
    }
}

pub fn poughkeepsie_rule() -> AlertRule {
    AlertRule::new("12601", "Poughkeepsie", 10.0, 15.0, 85.0, &RuleDefaults::default())
}

pub fn build_test_context() -> TestContext {
    let mut registry = RuleRegistry::new();
    registry
        .put(poughkeepsie_rule())
        .expect("rule should register");
    registry
        .put(AlertRule::new("10001", "New York", 25.0, 12.0, 80.0, &RuleDefaults::default()))
        .expect("rule should register");
    let registry = Arc::new(registry);

    let sink = Arc::new(MemorySink::new());
    let stats = Arc::new(DispatchStats::new());
    let config = ServerConfig {
        sink: SinkKind::Memory,
        ..ServerConfig::default()
    };

    let state = AppState {
        sink: sink.clone(),
        registry: registry.clone(),
        stats: stats.clone(),
        start_time: Utc::now(),
        config: Arc::new(config),
    };
    let app = app::build_http_app(state.clone());

    TestContext {
        sink,
        registry,
        stats,
        state,
        app,
    }
}

pub fn current_envelope(
    zip: &str,
    city: &str,
    temp: f64,
    wind: f64,
    humidity: f64,
    condition: &str,
) -> Vec<u8> {
    json!({
        "timestamp": "2024-07-01T12:00:00Z",
        "zip_code": zip,
        "city": city,
        "country": "US",
        "message_type": "current",
        "current": {
            "dt": 1719835200,
            "main": { "temp": temp, "humidity": humidity, "pressure": 1013.0 },
            "wind": { "speed": wind },
            "weather": [ { "main": condition, "description": condition.to_lowercase() } ]
        }
    })
    .to_string()
    .into_bytes()
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let req_body = body.unwrap_or(Value::Null).to_string();
    request_raw(app, method, uri, req_body).await
}

pub async fn request_raw(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: String,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .expect("request should build");
    send(app, req).await
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    send(app, req).await
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}
