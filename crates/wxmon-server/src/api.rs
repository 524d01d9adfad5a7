use crate::dispatcher::DispatchStatsSnapshot;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use wxmon_alert::rule::AlertRule;

/// Error body.
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub err_code: i32,
    pub err_msg: String,
    pub trace_id: String,
}

/// Uniform response wrapper.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 0 on success.
    pub err_code: i32,
    pub err_msg: String,
    pub trace_id: String,
    pub data: Option<T>,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "not_found" => 1004,
        "sink_error" => 1501,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

#[derive(Serialize, ToSchema)]
struct HealthResponse {
    service: String,
    version: String,
    status: String,
    uptime_secs: i64,
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "ok".to_string(),
            uptime_secs: (Utc::now() - state.start_time).num_seconds(),
        },
    )
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TestTemperatureRequest {
    /// Display name of the location, as used in metric labels.
    pub city: String,
    /// Temperature in °C.
    pub temperature: f64,
}

#[derive(Serialize, ToSchema)]
struct TestTemperatureResponse {
    city: String,
    temperature: f64,
    status: String,
}

/// Overwrites a city's temperature gauge directly. Never evaluates alert rules.
#[utoipa::path(
    post,
    path = "/v1/test/temperature",
    tag = "Test",
    request_body = TestTemperatureRequest,
    responses(
        (status = 200, description = "Temperature applied", body = TestTemperatureResponse),
        (status = 400, description = "Malformed body or empty city", body = ApiError)
    )
)]
async fn test_temperature(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    body: Bytes,
) -> impl IntoResponse {
    // Parsed by hand so every malformed body maps to a 400 envelope.
    let req: TestTemperatureRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id,
                "bad_request",
                &format!("Invalid request body: {e}"),
            )
        }
    };

    let city = req.city.trim();
    if city.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "City parameter is required",
        );
    }

    if let Err(e) = state.sink.set_test_temperature(city, req.temperature) {
        tracing::error!(city, error = %e, "Failed to set test temperature");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &trace_id,
            "sink_error",
            "Failed to update metrics",
        );
    }

    tracing::info!(city, temperature = req.temperature, "Test temperature applied");
    success_response(
        StatusCode::OK,
        &trace_id,
        TestTemperatureResponse {
            city: city.to_string(),
            temperature: req.temperature,
            status: "applied".to_string(),
        },
    )
}

#[derive(Serialize, ToSchema)]
struct StatusResponse {
    dispatch: DispatchStatsSnapshot,
    rule_count: usize,
    sink: String,
    source: String,
    uptime_secs: i64,
}

/// Dispatch loop counters and registry size.
#[utoipa::path(
    get,
    path = "/v1/status",
    tag = "Status",
    responses(
        (status = 200, description = "Consumer status", body = StatusResponse)
    )
)]
async fn status(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let sink = match state.config.sink {
        crate::config::SinkKind::Prometheus => "prometheus",
        crate::config::SinkKind::Memory => "memory",
    };
    success_response(
        StatusCode::OK,
        &trace_id,
        StatusResponse {
            dispatch: state.stats.snapshot(),
            rule_count: state.registry.len(),
            sink: sink.to_string(),
            source: state.config.source.to_string(),
            uptime_secs: (Utc::now() - state.start_time).num_seconds(),
        },
    )
}

#[derive(Serialize, ToSchema)]
struct RuleResponse {
    location_key: String,
    display_name: String,
    custom_temp: f64,
    high_temp: f64,
    low_temp: f64,
    wind_threshold: f64,
    humidity_threshold: f64,
    pressure_threshold: f64,
}

impl From<&AlertRule> for RuleResponse {
    fn from(rule: &AlertRule) -> Self {
        Self {
            location_key: rule.location_key.clone(),
            display_name: rule.display_name.clone(),
            custom_temp: rule.custom_temp,
            high_temp: rule.high_temp,
            low_temp: rule.low_temp,
            wind_threshold: rule.wind_threshold,
            humidity_threshold: rule.humidity_threshold,
            pressure_threshold: rule.pressure_threshold,
        }
    }
}

/// Registered alert rules, sorted by location key.
#[utoipa::path(
    get,
    path = "/v1/rules",
    tag = "Rules",
    responses(
        (status = 200, description = "Alert rules", body = Vec<RuleResponse>)
    )
)]
async fn list_rules(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let rules: Vec<RuleResponse> = state
        .registry
        .rules()
        .into_iter()
        .map(RuleResponse::from)
        .collect();
    success_response(StatusCode::OK, &trace_id, rules)
}

/// Prometheus text exposition.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Metrics",
    responses(
        (status = 200, description = "Metrics in text exposition format", body = String, content_type = "text/plain"),
        (status = 404, description = "Sink has no text exposition", body = ApiError)
    )
)]
async fn prometheus_metrics(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.sink.render() {
        Some(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "Metrics exposition is not available for this sink",
        ),
    }
}

pub fn public_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .routes(routes!(status))
        .routes(routes!(list_rules))
        .routes(routes!(prometheus_metrics))
}

pub fn test_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(test_temperature))
}
