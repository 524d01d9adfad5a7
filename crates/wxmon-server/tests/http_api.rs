mod common;

use axum::http::StatusCode;
use common::{build_test_context, request_json, request_no_body, request_raw};
use serde_json::json;
use wxmon_metrics::{MetricsSink, TEST_ZIP_LABEL};

#[tokio::test]
async fn health_reports_service_and_trace_id() {
    let ctx = build_test_context();
    let (status, body, trace_id) = request_no_body(&ctx.app, "GET", "/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["err_code"], 0);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["service"], "wxmon-server");
    let trace_id = trace_id.expect("x-trace-id header should be set");
    assert_eq!(trace_id.len(), 16);
    assert_eq!(body["trace_id"], trace_id);
}

#[tokio::test]
async fn test_temperature_overwrites_gauge_without_alerting() {
    let ctx = build_test_context();
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/test/temperature",
        Some(json!({ "city": "Poughkeepsie", "temperature": 45.0 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["err_code"], 0);
    assert_eq!(body["data"]["city"], "Poughkeepsie");
    assert_eq!(body["data"]["temperature"], 45.0);

    assert_eq!(
        ctx.sink.current_temperature("Poughkeepsie", TEST_ZIP_LABEL),
        Some(45.0)
    );
    assert!(ctx.sink.alerts().is_empty());
    assert_eq!(ctx.stats.snapshot().alerts_emitted, 0);
}

#[tokio::test]
async fn test_temperature_rejects_blank_city() {
    let ctx = build_test_context();
    for city in ["", "   "] {
        let (status, body, _) = request_json(
            &ctx.app,
            "POST",
            "/v1/test/temperature",
            Some(json!({ "city": city, "temperature": 30.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["err_code"], 1001);
    }
}

#[tokio::test]
async fn test_temperature_rejects_malformed_body() {
    let ctx = build_test_context();
    let bodies = [
        "{not json".to_string(),
        json!({ "city": "Albany" }).to_string(),
        json!({ "city": "Albany", "temperature": "hot" }).to_string(),
        String::new(),
    ];
    for raw in bodies {
        let (status, body, _) = request_raw(&ctx.app, "POST", "/v1/test/temperature", raw.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {raw}");
        assert_eq!(body["err_code"], 1001);
    }
    assert_eq!(ctx.sink.current_temperature("Albany", TEST_ZIP_LABEL), None);
}

#[tokio::test]
async fn rules_are_listed_sorted_by_key() {
    let ctx = build_test_context();
    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/rules").await;

    assert_eq!(status, StatusCode::OK);
    let rules = body["data"].as_array().expect("rules array");
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0]["location_key"], "10001");
    assert_eq!(rules[1]["location_key"], "12601");
    assert_eq!(rules[1]["high_temp"], 20.0);
    assert_eq!(rules[1]["low_temp"], 5.0);
    assert_eq!(rules[1]["pressure_threshold"], 1000.0);
}

#[tokio::test]
async fn status_reflects_dispatch_counters() {
    let ctx = build_test_context();
    let dispatcher = ctx.dispatcher();
    dispatcher.dispatch(&common::current_envelope("12601", "Poughkeepsie", 12.0, 5.0, 40.0, "Clear"));
    dispatcher.dispatch(b"{garbage");

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/status").await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["rule_count"], 2);
    assert_eq!(data["sink"], "memory");
    assert_eq!(data["source"], "stdin");
    assert_eq!(data["dispatch"]["received"], 2);
    assert_eq!(data["dispatch"]["processed"], 1);
    assert_eq!(data["dispatch"]["skipped_total"], 1);
    assert_eq!(data["dispatch"]["skipped"]["malformed"], 1);
    assert_eq!(data["dispatch"]["alerts_emitted"], 1);
}

#[tokio::test]
async fn metrics_endpoint_renders_sink_exposition() {
    let ctx = build_test_context();
    ctx.sink
        .update_observation(&wxmon_metrics::Observation {
            city: "Poughkeepsie".into(),
            zip_code: "12601".into(),
            temperature: 18.5,
            humidity: 50.0,
            wind_speed: 1.0,
            pressure: 1012.0,
            forecast_time: None,
        })
        .unwrap();

    let (status, body, trace_id) = request_no_body(&ctx.app, "GET", "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(trace_id.is_some());
    let text = body.as_str().expect("plain text body");
    assert!(text.contains("wxmon_temperature_celsius{city=\"Poughkeepsie\",zip_code=\"12601\"} 18.5"));
}

#[tokio::test]
async fn openapi_document_lists_routes() {
    let ctx = build_test_context();
    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    let paths = body["paths"].as_object().expect("paths object");
    for path in ["/v1/health", "/v1/test/temperature", "/v1/status", "/v1/rules", "/metrics"] {
        assert!(paths.contains_key(path), "missing {path}");
    }
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let ctx = build_test_context();
    let (status, _, _) = request_no_body(&ctx.app, "GET", "/v1/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
