//! Per-location weather alert rules and their evaluation.
//!
//! Rules live in a [`registry::RuleRegistry`] keyed by location key. Each
//! evaluable sample is run through a fixed, ordered taxonomy of checks: six
//! numeric threshold checks followed by a severe-condition check. Evaluation
//! is pure; the caller supplies the generation timestamp. Alerts are labelled
//! with the rule's location key and display name, whatever the sample says.

pub mod engine;
pub mod registry;
pub mod rule;
pub mod rules;


use chrono::{DateTime, Utc};
use rule::AlertRule;
use rules::condition::evaluate_condition;
use rules::threshold::ThresholdCheck;
use wxmon_common::types::{Measurement, WeatherAlert, WeatherSample};

/// Evaluates `sample` against `rule`.
///
/// Only [`WeatherSample::Instant`] and [`WeatherSample::HourlyPoint`] are
/// evaluated; forecast series and daily summaries return an empty vector.
pub fn evaluate(
    sample: &WeatherSample,
    rule: &AlertRule,
    generated_at: DateTime<Utc>,
) -> Vec<WeatherAlert> {
    match sample.evaluable() {
        Some(measurement) => evaluate_measurement(measurement, rule, generated_at),
        None => Vec::new(),
    }
}

/// Runs every check of the taxonomy in order and collects the alerts that fire.
pub fn evaluate_measurement(
    measurement: &Measurement,
    rule: &AlertRule,
    generated_at: DateTime<Utc>,
) -> Vec<WeatherAlert> {
    let mut alerts: Vec<WeatherAlert> = ThresholdCheck::for_rule(rule)
        .iter()
        .filter_map(|check| check.evaluate(rule, measurement, generated_at))
        .collect();

    if let Some(alert) = evaluate_condition(rule, measurement, generated_at) {
        alerts.push(alert);
    }
    alerts
}
