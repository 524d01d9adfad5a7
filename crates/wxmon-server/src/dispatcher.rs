//! Sequential consume loop: receive → decode → route → evaluate → emit.

use crate::source::{MessageSource, TransportError};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use utoipa::ToSchema;
use wxmon_alert::engine::AlertEngine;
use wxmon_common::envelope::{self, DecodeError};
use wxmon_common::types::{
    DailySummary, HourlyPoint, InstantReading, Location, Measurement, SampleKind, WeatherAlert,
    WeatherSample,
};
use wxmon_metrics::{MetricsSink, Observation};

/// Pressure reported for daily summaries, which carry none of their own.
pub const STANDARD_ATMOSPHERE_HPA: f64 = 1013.25;

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedMessage {
    pub kind: SampleKind,
    /// Observations handed to the sink (accepted or not).
    pub observations: usize,
    pub alerts: Vec<WeatherAlert>,
    pub sink_failures: usize,
}

/// Result of handling one envelope.
#[derive(Debug)]
pub enum DispatchOutcome {
    Processed(ProcessedMessage),
    Skipped(DecodeError),
}

/// Loop counters shared with the HTTP status endpoint.
#[derive(Debug, Default)]
pub struct DispatchStats {
    received: AtomicU64,
    processed: AtomicU64,
    observations: AtomicU64,
    alerts: AtomicU64,
    sink_failures: AtomicU64,
    skipped: Mutex<BTreeMap<&'static str, u64>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DispatchStatsSnapshot {
    pub received: u64,
    pub processed: u64,
    pub skipped_total: u64,
    /// Skip counts keyed by decode failure reason.
    pub skipped: BTreeMap<String, u64>,
    pub observations: u64,
    pub alerts_emitted: u64,
    pub sink_failures: u64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, outcome: &DispatchOutcome) {
        self.received.fetch_add(1, Ordering::Relaxed);
        match outcome {
            DispatchOutcome::Processed(msg) => {
                self.processed.fetch_add(1, Ordering::Relaxed);
                self.observations
                    .fetch_add(msg.observations as u64, Ordering::Relaxed);
                self.alerts
                    .fetch_add(msg.alerts.len() as u64, Ordering::Relaxed);
                self.sink_failures
                    .fetch_add(msg.sink_failures as u64, Ordering::Relaxed);
            }
            DispatchOutcome::Skipped(err) => {
                let mut skipped = self
                    .skipped
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *skipped.entry(err.reason()).or_insert(0) += 1;
            }
        }
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        let skipped: BTreeMap<String, u64> = self
            .skipped
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(reason, n)| (reason.to_string(), *n))
            .collect();
        DispatchStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            skipped_total: skipped.values().sum(),
            skipped,
            observations: self.observations.load(Ordering::Relaxed),
            alerts_emitted: self.alerts.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}

pub struct Dispatcher {
    engine: AlertEngine,
    sink: Arc<dyn MetricsSink>,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    pub fn new(engine: AlertEngine, sink: Arc<dyn MetricsSink>, stats: Arc<DispatchStats>) -> Self {
        Self {
            engine,
            sink,
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    /// Consumes `source` until it fails. Never returns `Ok`.
    pub async fn run(&self, source: &mut dyn MessageSource) -> Result<(), TransportError> {
        tracing::info!("Dispatch loop started");
        loop {
            let bytes = source.recv().await?;
            self.dispatch(&bytes);
        }
    }

    /// Handles one raw envelope. Decode failures are counted and skipped.
    pub fn dispatch(&self, bytes: &[u8]) -> DispatchOutcome {
        let outcome = match envelope::decode(bytes) {
            Ok(sample) => DispatchOutcome::Processed(self.route(&sample)),
            Err(e) => {
                tracing::warn!(reason = e.reason(), error = %e, "Skipping undecodable envelope");
                self.sink.record_skip(e.reason());
                DispatchOutcome::Skipped(e)
            }
        };
        self.stats.record(&outcome);
        outcome
    }

    fn route(&self, sample: &WeatherSample) -> ProcessedMessage {
        let kind = sample.kind();
        let mut msg = ProcessedMessage {
            kind,
            observations: 0,
            alerts: Vec::new(),
            sink_failures: 0,
        };

        match sample {
            WeatherSample::Instant(InstantReading {
                location,
                measurement,
                ..
            }) => {
                self.publish(&mut msg, observation(location, measurement, None));
            }
            WeatherSample::HourlyPoint(point) => {
                self.publish(&mut msg, forecast_observation(point));
            }
            WeatherSample::ForecastSeries(series) => {
                for point in &series.points {
                    self.publish(&mut msg, forecast_observation(point));
                }
            }
            WeatherSample::DailySummary(daily) => {
                self.publish(&mut msg, daily_observation(daily));
            }
        }

        if sample.evaluable().is_some() {
            let alerts = self.engine.ingest(sample, Utc::now());
            for alert in &alerts {
                if let Err(e) = self.sink.update_alert(alert) {
                    tracing::error!(
                        category = %alert.category,
                        location_key = %alert.location_key,
                        error = %e,
                        "Failed to publish alert"
                    );
                    self.sink.record_sink_failure();
                    msg.sink_failures += 1;
                }
            }
            msg.alerts = alerts;
        }

        self.sink.record_processed(kind.as_str());
        tracing::debug!(
            kind = %kind,
            location_key = %sample.location().location_key,
            observations = msg.observations,
            alerts = msg.alerts.len(),
            "Envelope processed"
        );
        msg
    }

    fn publish(&self, msg: &mut ProcessedMessage, obs: Observation) {
        msg.observations += 1;
        if let Err(e) = self.sink.update_observation(&obs) {
            tracing::error!(
                city = %obs.city,
                zip_code = %obs.zip_code,
                error = %e,
                "Failed to publish observation"
            );
            self.sink.record_sink_failure();
            msg.sink_failures += 1;
        }
    }
}

fn observation(
    location: &Location,
    m: &Measurement,
    forecast_time: Option<chrono::DateTime<Utc>>,
) -> Observation {
    Observation {
        city: location.display_name.clone(),
        zip_code: location.location_key.clone(),
        temperature: m.temperature,
        humidity: m.humidity,
        wind_speed: m.wind_speed,
        pressure: m.pressure,
        forecast_time,
    }
}

fn forecast_observation(point: &HourlyPoint) -> Observation {
    observation(&point.location, &point.measurement, Some(point.forecast_time))
}

fn daily_observation(daily: &DailySummary) -> Observation {
    Observation {
        city: daily.location.display_name.clone(),
        zip_code: daily.location.location_key.clone(),
        temperature: daily.temp_avg,
        humidity: daily.humidity,
        wind_speed: daily.wind_speed,
        pressure: STANDARD_ATMOSPHERE_HPA,
        forecast_time: None,
    }
}
