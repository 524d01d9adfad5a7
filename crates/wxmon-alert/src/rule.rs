use serde::{Deserialize, Serialize};

/// Deployment-wide constants applied when an [`AlertRule`] is built.
///
/// # Examples
///
/// ```
/// use wxmon_alert::rule::{AlertRule, RuleDefaults};
///
/// let rule = AlertRule::new("12601", "Poughkeepsie", 10.0, 15.0, 85.0, &RuleDefaults::default());
/// assert_eq!(rule.high_temp, 20.0);
/// assert_eq!(rule.low_temp, 5.0);
/// assert_eq!(rule.pressure_threshold, 1000.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefaults {
    /// Added to the custom temperature to get the high-temperature threshold.
    #[serde(default = "default_high_offset")]
    pub high_offset: f64,
    /// Subtracted from the custom temperature to get the low-temperature threshold.
    #[serde(default = "default_low_offset")]
    pub low_offset: f64,
    /// Pressure (hPa) at or below which a low-pressure alert fires.
    #[serde(default = "default_pressure_threshold")]
    pub pressure_threshold: f64,
}

impl Default for RuleDefaults {
    fn default() -> Self {
        Self {
            high_offset: default_high_offset(),
            low_offset: default_low_offset(),
            pressure_threshold: default_pressure_threshold(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RuleDefaultsError {
    #[error("Alert defaults: {field} must be a positive finite number, got {value}")]
    InvalidOffset { field: &'static str, value: f64 },

    #[error("Alert defaults: pressure_threshold must be finite, got {0}")]
    NonFinitePressure(f64),
}

impl RuleDefaults {
    /// Offsets must be strictly positive so that every rule built from these
    /// defaults keeps `high_temp > custom_temp > low_temp`.
    pub fn validate(&self) -> Result<(), RuleDefaultsError> {
        for (field, value) in [
            ("high_offset", self.high_offset),
            ("low_offset", self.low_offset),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(RuleDefaultsError::InvalidOffset { field, value });
            }
        }
        if !self.pressure_threshold.is_finite() {
            return Err(RuleDefaultsError::NonFinitePressure(self.pressure_threshold));
        }
        Ok(())
    }
}

fn default_high_offset() -> f64 {
    10.0
}

fn default_low_offset() -> f64 {
    5.0
}

fn default_pressure_threshold() -> f64 {
    1000.0
}

/// Alert thresholds for a single monitored location.
///
/// `high_temp > custom_temp > low_temp` holds for finite custom temperatures
/// as long as both offsets are positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub location_key: String,
    pub display_name: String,
    pub custom_temp: f64,
    pub high_temp: f64,
    pub low_temp: f64,
    pub wind_threshold: f64,
    pub humidity_threshold: f64,
    pub pressure_threshold: f64,
}

impl AlertRule {
    pub fn new(
        location_key: impl Into<String>,
        display_name: impl Into<String>,
        custom_temp: f64,
        wind_threshold: f64,
        humidity_threshold: f64,
        defaults: &RuleDefaults,
    ) -> Self {
        Self {
            location_key: location_key.into(),
            display_name: display_name.into(),
            custom_temp,
            high_temp: custom_temp + defaults.high_offset,
            low_temp: custom_temp - defaults.low_offset,
            wind_threshold,
            humidity_threshold,
            pressure_threshold: defaults.pressure_threshold,
        }
    }
}
