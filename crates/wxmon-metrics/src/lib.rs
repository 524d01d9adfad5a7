//! Metrics sink abstraction for weather observations and alerts.
//!
//! [`MetricsSink`] is the single outbound surface of the dispatch loop and the
//! test injection endpoint. [`prometheus::PrometheusSink`] publishes through the
//! `metrics` facade; [`memory::MemorySink`] records everything in process for
//! tests and headless runs.

pub mod error;
pub mod memory;
pub mod prometheus;

pub use error::SinkError;

use chrono::{DateTime, Utc};
use error::ensure_finite;
use wxmon_common::types::WeatherAlert;

/// Zip label attached to temperatures written through the test injection path.
pub const TEST_ZIP_LABEL: &str = "test";

/// One observation (current or forecast) ready to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub city: String,
    pub zip_code: String,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub pressure: f64,
    /// Set for forecast points; `None` for current observations.
    pub forecast_time: Option<DateTime<Utc>>,
}

impl Observation {
    pub fn is_forecast(&self) -> bool {
        self.forecast_time.is_some()
    }

    pub fn validate(&self) -> Result<(), SinkError> {
        ensure_finite("temperature", self.temperature)?;
        ensure_finite("humidity", self.humidity)?;
        ensure_finite("wind_speed", self.wind_speed)?;
        ensure_finite("pressure", self.pressure)
    }
}

pub(crate) fn validate_alert(alert: &WeatherAlert) -> Result<(), SinkError> {
    ensure_finite("value", alert.value)?;
    ensure_finite("threshold", alert.threshold)
}

/// Outbound metrics store.
///
/// Implementations must tolerate concurrent calls from the dispatch loop and
/// the HTTP handlers.
pub trait MetricsSink: Send + Sync {
    fn update_observation(&self, observation: &Observation) -> Result<(), SinkError>;

    fn update_alert(&self, alert: &WeatherAlert) -> Result<(), SinkError>;

    /// Overwrites the current temperature for `city` under [`TEST_ZIP_LABEL`].
    fn set_test_temperature(&self, city: &str, temperature: f64) -> Result<(), SinkError>;

    fn record_processed(&self, kind: &str);

    fn record_skip(&self, reason: &str);

    fn record_sink_failure(&self);

    /// Text exposition of the current state, if the backend has one.
    fn render(&self) -> Option<String> {
        None
    }
}
