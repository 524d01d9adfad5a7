use crate::rule::AlertRule;
use chrono::{DateTime, Utc};
use wxmon_common::types::{AlertCategory, Measurement, Severity, WeatherAlert};

/// Inclusive comparison used by every threshold check: boundary values trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    GreaterEqual,
    LessEqual,
}

impl CompareOp {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterEqual => value >= threshold,
            Self::LessEqual => value <= threshold,
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GreaterEqual => write!(f, "greater_equal"),
            Self::LessEqual => write!(f, "less_equal"),
        }
    }
}

/// One numeric check of the fixed alert taxonomy.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdCheck {
    pub category: AlertCategory,
    pub severity: Severity,
    pub operator: CompareOp,
    pub threshold: f64,
}

impl ThresholdCheck {
    /// The six numeric checks for `rule`, in evaluation order.
    pub fn for_rule(rule: &AlertRule) -> [ThresholdCheck; 6] {
        use AlertCategory::*;
        use CompareOp::*;
        [
            Self::new(CustomThreshold, Severity::Warning, GreaterEqual, rule.custom_temp),
            Self::new(HighTemperature, Severity::Critical, GreaterEqual, rule.high_temp),
            Self::new(LowTemperature, Severity::Warning, LessEqual, rule.low_temp),
            Self::new(HighWind, Severity::Warning, GreaterEqual, rule.wind_threshold),
            Self::new(HighHumidity, Severity::Warning, GreaterEqual, rule.humidity_threshold),
            Self::new(LowPressure, Severity::Warning, LessEqual, rule.pressure_threshold),
        ]
    }

    fn new(
        category: AlertCategory,
        severity: Severity,
        operator: CompareOp,
        threshold: f64,
    ) -> Self {
        Self {
            category,
            severity,
            operator,
            threshold,
        }
    }

    fn observed(&self, m: &Measurement) -> f64 {
        match self.category {
            AlertCategory::CustomThreshold
            | AlertCategory::HighTemperature
            | AlertCategory::LowTemperature => m.temperature,
            AlertCategory::HighWind => m.wind_speed,
            AlertCategory::HighHumidity => m.humidity,
            AlertCategory::LowPressure => m.pressure,
            AlertCategory::WeatherCondition => 0.0,
        }
    }

    pub fn evaluate(
        &self,
        rule: &AlertRule,
        measurement: &Measurement,
        generated_at: DateTime<Utc>,
    ) -> Option<WeatherAlert> {
        let value = self.observed(measurement);
        if !self.operator.check(value, self.threshold) {
            return None;
        }

        let (message, description) =
            describe(self.category, &rule.display_name, value, self.threshold);
        Some(WeatherAlert {
            category: self.category,
            severity: self.severity,
            location_key: rule.location_key.clone(),
            display_name: rule.display_name.clone(),
            value,
            threshold: self.threshold,
            condition: None,
            message: message.to_string(),
            description,
            generated_at,
        })
    }
}

fn describe(
    category: AlertCategory,
    city: &str,
    value: f64,
    threshold: f64,
) -> (&'static str, String) {
    match category {
        AlertCategory::CustomThreshold => (
            "Temperature reached custom threshold",
            format!("Temperature in {city} is {value:.1}°C, which has reached the custom threshold of {threshold:.1}°C"),
        ),
        AlertCategory::HighTemperature => (
            "High temperature detected",
            format!("Temperature in {city} is {value:.1}°C, which is at or above the high temperature threshold of {threshold:.1}°C"),
        ),
        AlertCategory::LowTemperature => (
            "Low temperature detected",
            format!("Temperature in {city} is {value:.1}°C, which is at or below the low temperature threshold of {threshold:.1}°C"),
        ),
        AlertCategory::HighWind => (
            "High wind speed detected",
            format!("Wind speed in {city} is {value:.1} m/s, which is at or above the threshold of {threshold:.1} m/s"),
        ),
        AlertCategory::HighHumidity => (
            "High humidity detected",
            format!("Humidity in {city} is {value:.0}%, which is at or above the threshold of {threshold:.0}%"),
        ),
        AlertCategory::LowPressure => (
            "Low atmospheric pressure detected",
            format!("Atmospheric pressure in {city} is {value:.0} hPa, which is at or below the threshold of {threshold:.0} hPa"),
        ),
        AlertCategory::WeatherCondition => ("Severe weather condition", String::new()),
    }
}
