use crate::rule::AlertRule;
use chrono::{DateTime, Utc};
use wxmon_common::types::{AlertCategory, Measurement, Severity, WeatherAlert};

/// Severe condition labels and the severity each one raises.
pub const SEVERE_CONDITIONS: &[(&str, Severity)] = &[
    ("Thunderstorm", Severity::Critical),
    ("Snow", Severity::Warning),
    ("Rain", Severity::Warning),
    ("Drizzle", Severity::Info),
];

/// Severity for a primary condition label, `None` if the label is not severe.
/// Labels match exactly as the upstream API spells them.
pub fn condition_severity(label: &str) -> Option<Severity> {
    SEVERE_CONDITIONS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, severity)| *severity)
}

pub fn evaluate_condition(
    rule: &AlertRule,
    measurement: &Measurement,
    generated_at: DateTime<Utc>,
) -> Option<WeatherAlert> {
    let condition = measurement.condition.as_ref()?;
    let severity = condition_severity(&condition.label)?;

    Some(WeatherAlert {
        category: AlertCategory::WeatherCondition,
        severity,
        location_key: rule.location_key.clone(),
        display_name: rule.display_name.clone(),
        value: 0.0,
        threshold: 0.0,
        condition: Some(condition.label.clone()),
        message: format!("Severe weather condition: {}", condition.label),
        description: format!(
            "Weather condition in {}: {} ({})",
            rule.display_name, condition.label, condition.description
        ),
        generated_at,
    })
}
