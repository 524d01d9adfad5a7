//! Wire format of the inbound weather stream.
//!
//! Every message is a JSON envelope with a `message_type` discriminator and
//! exactly one payload field named after it. Payload shapes follow the
//! upstream weather API (`main` / `wind` / `weather` blocks).

use crate::types::{
    Condition, DailySummary, ForecastSeries, HourlyPoint, InstantReading, Location, Measurement,
    SampleKind, WeatherSample,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MainBlock {
    pub temp: f64,
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub pressure: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindBlock {
    #[serde(default)]
    pub speed: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionBlock {
    pub main: String,
    #[serde(default)]
    pub description: String,
}

/// Current conditions or a single forecast step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingPayload {
    /// Unix seconds. Required for forecast steps, informational for current.
    #[serde(default)]
    pub dt: i64,
    pub main: MainBlock,
    #[serde(default)]
    pub wind: WindBlock,
    #[serde(default)]
    pub weather: Vec<ConditionBlock>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastPayload {
    #[serde(default)]
    pub list: Vec<ReadingPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPayload {
    pub day: u32,
    #[serde(default)]
    pub date: String,
    pub temp_min: f64,
    pub temp_max: f64,
    pub temp_avg: f64,
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub wind_speed: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub timestamp: DateTime<Utc>,
    pub zip_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<ReadingPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<ForecastPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly: Option<ReadingPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily: Option<DailyPayload>,
}

/// Largest envelope accepted, in bytes. Line-oriented transports stop
/// buffering one byte past this.
pub const MAX_ENVELOPE_BYTES: usize = 1024 * 1024;

/// Reasons an envelope cannot be turned into a [`WeatherSample`].
///
/// # Examples
///
/// ```
/// use wxmon_common::envelope::{decode, DecodeError};
///
/// let err = decode(b"{not json").unwrap_err();
/// assert!(matches!(err, DecodeError::Malformed(_)));
/// assert_eq!(err.reason(), "malformed");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Decode: malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Decode: envelope exceeds {limit} bytes")]
    Oversized { limit: usize },

    #[error("Decode: envelope has no message_type")]
    MissingMessageType,

    #[error("Decode: unknown message_type '{0}'")]
    UnknownMessageType(String),

    #[error("Decode: message_type '{0}' has no matching payload")]
    MissingPayload(SampleKind),

    #[error("Decode: message_type '{expected}' also carries a '{found}' payload")]
    UnexpectedPayload {
        expected: SampleKind,
        found: SampleKind,
    },

    #[error("Decode: invalid forecast timestamp {0}")]
    InvalidTimestamp(i64),
}

impl DecodeError {
    /// Short, stable label used for skip counters.
    pub fn reason(&self) -> &'static str {
        match self {
            DecodeError::Malformed(_) => "malformed",
            DecodeError::Oversized { .. } => "oversized",
            DecodeError::MissingMessageType => "missing_message_type",
            DecodeError::UnknownMessageType(_) => "unknown_message_type",
            DecodeError::MissingPayload(_) => "missing_payload",
            DecodeError::UnexpectedPayload { .. } => "unexpected_payload",
            DecodeError::InvalidTimestamp(_) => "invalid_timestamp",
        }
    }
}

/// Decodes raw envelope bytes into a typed sample.
pub fn decode(bytes: &[u8]) -> Result<WeatherSample, DecodeError> {
    if bytes.len() > MAX_ENVELOPE_BYTES {
        return Err(DecodeError::Oversized {
            limit: MAX_ENVELOPE_BYTES,
        });
    }
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    envelope.into_sample()
}

impl Envelope {
    fn present_payloads(&self) -> impl Iterator<Item = SampleKind> + '_ {
        SampleKind::ALL.into_iter().filter(|kind| match kind {
            SampleKind::Current => self.current.is_some(),
            SampleKind::Forecast => self.forecast.is_some(),
            SampleKind::Hourly => self.hourly.is_some(),
            SampleKind::Daily => self.daily.is_some(),
        })
    }

    pub fn into_sample(self) -> Result<WeatherSample, DecodeError> {
        let raw_kind = self
            .message_type
            .as_deref()
            .ok_or(DecodeError::MissingMessageType)?;
        let kind: SampleKind = raw_kind
            .parse()
            .map_err(|_| DecodeError::UnknownMessageType(raw_kind.to_string()))?;

        if let Some(found) = self.present_payloads().find(|found| *found != kind) {
            return Err(DecodeError::UnexpectedPayload {
                expected: kind,
                found,
            });
        }

        let location = Location {
            location_key: self.zip_code,
            display_name: self.city,
            country: self.country,
        };

        match kind {
            SampleKind::Current => {
                let payload = self.current.ok_or(DecodeError::MissingPayload(kind))?;
                Ok(WeatherSample::Instant(InstantReading {
                    location,
                    observed_at: self.timestamp,
                    measurement: payload.into_measurement(),
                }))
            }
            SampleKind::Hourly => {
                let payload = self.hourly.ok_or(DecodeError::MissingPayload(kind))?;
                Ok(WeatherSample::HourlyPoint(payload.into_point(location)?))
            }
            SampleKind::Forecast => {
                let payload = self.forecast.ok_or(DecodeError::MissingPayload(kind))?;
                let points = payload
                    .list
                    .into_iter()
                    .map(|item| item.into_point(location.clone()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(WeatherSample::ForecastSeries(ForecastSeries {
                    location,
                    issued_at: self.timestamp,
                    points,
                }))
            }
            SampleKind::Daily => {
                let d = self.daily.ok_or(DecodeError::MissingPayload(kind))?;
                Ok(WeatherSample::DailySummary(DailySummary {
                    location,
                    day: d.day,
                    date: d.date,
                    temp_min: d.temp_min,
                    temp_max: d.temp_max,
                    temp_avg: d.temp_avg,
                    humidity: d.humidity,
                    wind_speed: d.wind_speed,
                    description: d.description,
                }))
            }
        }
    }
}

impl ReadingPayload {
    fn into_measurement(self) -> Measurement {
        // Only the primary (first) condition is meaningful for alerting.
        let condition = self.weather.into_iter().next().map(|c| Condition {
            label: c.main,
            description: c.description,
        });
        Measurement {
            temperature: self.main.temp,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed,
            pressure: self.main.pressure,
            condition,
        }
    }

    fn into_point(self, location: Location) -> Result<HourlyPoint, DecodeError> {
        let forecast_time =
            DateTime::from_timestamp(self.dt, 0).ok_or(DecodeError::InvalidTimestamp(self.dt))?;
        Ok(HourlyPoint {
            location,
            forecast_time,
            measurement: self.into_measurement(),
        })
    }
}
