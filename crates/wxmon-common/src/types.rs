use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use wxmon_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert_eq!(sev.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Message kind discriminator carried in the `message_type` field of an
/// envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Current,
    Forecast,
    Hourly,
    Daily,
}

impl SampleKind {
    pub const ALL: [SampleKind; 4] = [
        SampleKind::Current,
        SampleKind::Forecast,
        SampleKind::Hourly,
        SampleKind::Daily,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SampleKind::Current => "current",
            SampleKind::Forecast => "forecast",
            SampleKind::Hourly => "hourly",
            SampleKind::Daily => "daily",
        }
    }
}

impl std::fmt::Display for SampleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SampleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(SampleKind::Current),
            "forecast" => Ok(SampleKind::Forecast),
            "hourly" => Ok(SampleKind::Hourly),
            "daily" => Ok(SampleKind::Daily),
            _ => Err(format!("unknown message type: {s}")),
        }
    }
}

/// Identity of a monitored place as carried by every sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Opaque location key, typically a postal code.
    pub location_key: String,
    pub display_name: String,
    pub country: String,
}

/// Primary weather condition, e.g. `Thunderstorm` / `heavy thunderstorm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub label: String,
    pub description: String,
}

/// Measurement subset shared by every sample shape.
///
/// Units: temperature in °C, humidity in %, wind speed in m/s, pressure in hPa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub pressure: f64,
    pub condition: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantReading {
    pub location: Location,
    pub observed_at: DateTime<Utc>,
    pub measurement: Measurement,
}

/// One forecast timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    pub location: Location,
    pub forecast_time: DateTime<Utc>,
    pub measurement: Measurement,
}

/// Ordered forecast steps, published for dashboard fan-out only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub location: Location,
    pub issued_at: DateTime<Utc>,
    pub points: Vec<HourlyPoint>,
}

/// Aggregated day summary, synthesized upstream. Has no condition label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub location: Location,
    /// Day offset from the issue date (1 = tomorrow).
    pub day: u32,
    pub date: String,
    pub temp_min: f64,
    pub temp_max: f64,
    pub temp_avg: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub description: String,
}

/// A decoded weather sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeatherSample {
    Instant(InstantReading),
    HourlyPoint(HourlyPoint),
    ForecastSeries(ForecastSeries),
    DailySummary(DailySummary),
}

impl WeatherSample {
    pub fn location(&self) -> &Location {
        match self {
            WeatherSample::Instant(r) => &r.location,
            WeatherSample::HourlyPoint(p) => &p.location,
            WeatherSample::ForecastSeries(s) => &s.location,
            WeatherSample::DailySummary(d) => &d.location,
        }
    }

    pub fn kind(&self) -> SampleKind {
        match self {
            WeatherSample::Instant(_) => SampleKind::Current,
            WeatherSample::HourlyPoint(_) => SampleKind::Hourly,
            WeatherSample::ForecastSeries(_) => SampleKind::Forecast,
            WeatherSample::DailySummary(_) => SampleKind::Daily,
        }
    }

    /// Returns the measurement to evaluate against alert rules.
    ///
    /// Only instant readings and single hourly points are evaluated.
    /// Forecast series and daily summaries always return `None`.
    pub fn evaluable(&self) -> Option<&Measurement> {
        match self {
            WeatherSample::Instant(r) => Some(&r.measurement),
            WeatherSample::HourlyPoint(p) => Some(&p.measurement),
            WeatherSample::ForecastSeries(_) | WeatherSample::DailySummary(_) => None,
        }
    }
}

/// Fixed alert taxonomy, listed in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    CustomThreshold,
    HighTemperature,
    LowTemperature,
    HighWind,
    HighHumidity,
    LowPressure,
    WeatherCondition,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::CustomThreshold => "custom_threshold",
            AlertCategory::HighTemperature => "high_temperature",
            AlertCategory::LowTemperature => "low_temperature",
            AlertCategory::HighWind => "high_wind",
            AlertCategory::HighHumidity => "high_humidity",
            AlertCategory::LowPressure => "low_pressure",
            AlertCategory::WeatherCondition => "weather_condition",
        }
    }
}

impl std::fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub category: AlertCategory,
    pub severity: Severity,
    pub location_key: String,
    pub display_name: String,
    /// Observed sample value. Zero for condition alerts.
    pub value: f64,
    /// Threshold the value was compared against. Zero for condition alerts.
    pub threshold: f64,
    /// Condition label that triggered a `weather_condition` alert.
    pub condition: Option<String>,
    pub message: String,
    pub description: String,
    pub generated_at: DateTime<Utc>,
}
