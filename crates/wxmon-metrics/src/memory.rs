use crate::error::ensure_finite;
use crate::{validate_alert, MetricsSink, Observation, SinkError, TEST_ZIP_LABEL};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use wxmon_common::types::{AlertCategory, Severity, WeatherAlert};

/// (city, category, severity): one series per label set, like the alert gauges.
type AlertKey = (String, &'static str, &'static str);

/// Latest alert of a series and how many times the series fired.
#[derive(Debug, Clone)]
struct AlertSeries {
    latest: WeatherAlert,
    count: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// (city, zip_code) -> latest current observation.
    current: HashMap<(String, String), Observation>,
    /// (city, zip_code, forecast_time) -> latest forecast point.
    forecasts: BTreeMap<(String, String, DateTime<Utc>), Observation>,
    alerts: BTreeMap<AlertKey, AlertSeries>,
    processed: BTreeMap<String, u64>,
    skipped: BTreeMap<String, u64>,
    sink_failures: u64,
}

/// In-process sink. Keeps the latest value per series, the same way the
/// Prometheus gauges do, so its size is bounded by the number of series.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
    reject_writes: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with [`SinkError::Other`].
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::Relaxed);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave the maps half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writable(&self) -> Result<(), SinkError> {
        if self.reject_writes.load(Ordering::Relaxed) {
            return Err(SinkError::Other("memory sink is rejecting writes".to_string()));
        }
        Ok(())
    }

    pub fn current(&self, city: &str, zip_code: &str) -> Option<Observation> {
        self.lock()
            .current
            .get(&(city.to_string(), zip_code.to_string()))
            .cloned()
    }

    pub fn current_temperature(&self, city: &str, zip_code: &str) -> Option<f64> {
        self.current(city, zip_code).map(|o| o.temperature)
    }

    /// Latest point per (city, zip code, forecast time), in that order.
    pub fn forecasts(&self) -> Vec<Observation> {
        self.lock().forecasts.values().cloned().collect()
    }

    /// Latest alert per (city, category, severity) series.
    pub fn alerts(&self) -> Vec<WeatherAlert> {
        self.lock()
            .alerts
            .values()
            .map(|series| series.latest.clone())
            .collect()
    }

    /// How many times a series fired.
    pub fn alert_count(&self, city: &str, category: AlertCategory, severity: Severity) -> u64 {
        self.lock()
            .alerts
            .get(&(city.to_string(), category.as_str(), severity.as_str()))
            .map_or(0, |series| series.count)
    }

    pub fn processed(&self, kind: &str) -> u64 {
        self.lock().processed.get(kind).copied().unwrap_or(0)
    }

    pub fn skipped(&self, reason: &str) -> u64 {
        self.lock().skipped.get(reason).copied().unwrap_or(0)
    }

    pub fn sink_failures(&self) -> u64 {
        self.lock().sink_failures
    }
}

/// Escapes a label value for the text exposition format.
fn escape_label(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

impl MetricsSink for MemorySink {
    fn update_observation(&self, observation: &Observation) -> Result<(), SinkError> {
        self.check_writable()?;
        observation.validate()?;

        let mut state = self.lock();
        if let Some(at) = observation.forecast_time {
            let key = (observation.city.clone(), observation.zip_code.clone(), at);
            state.forecasts.insert(key, observation.clone());
        } else {
            let key = (observation.city.clone(), observation.zip_code.clone());
            state.current.insert(key, observation.clone());
        }
        Ok(())
    }

    fn update_alert(&self, alert: &WeatherAlert) -> Result<(), SinkError> {
        self.check_writable()?;
        validate_alert(alert)?;

        let key = (
            alert.display_name.clone(),
            alert.category.as_str(),
            alert.severity.as_str(),
        );
        let mut state = self.lock();
        state
            .alerts
            .entry(key)
            .and_modify(|series| {
                series.latest = alert.clone();
                series.count += 1;
            })
            .or_insert_with(|| AlertSeries {
                latest: alert.clone(),
                count: 1,
            });
        Ok(())
    }

    fn set_test_temperature(&self, city: &str, temperature: f64) -> Result<(), SinkError> {
        self.check_writable()?;
        ensure_finite("temperature", temperature)?;

        let mut state = self.lock();
        let entry = state
            .current
            .entry((city.to_string(), TEST_ZIP_LABEL.to_string()))
            .or_insert_with(|| Observation {
                city: city.to_string(),
                zip_code: TEST_ZIP_LABEL.to_string(),
                temperature,
                humidity: 0.0,
                wind_speed: 0.0,
                pressure: 0.0,
                forecast_time: None,
            });
        entry.temperature = temperature;
        Ok(())
    }

    fn record_processed(&self, kind: &str) {
        *self.lock().processed.entry(kind.to_string()).or_insert(0) += 1;
    }

    fn record_skip(&self, reason: &str) {
        *self.lock().skipped.entry(reason.to_string()).or_insert(0) += 1;
    }

    fn record_sink_failure(&self) {
        self.lock().sink_failures += 1;
    }

    fn render(&self) -> Option<String> {
        let state = self.lock();
        let mut out = String::new();

        let mut current: Vec<&Observation> = state.current.values().collect();
        current.sort_by(|a, b| (&a.city, &a.zip_code).cmp(&(&b.city, &b.zip_code)));
        for obs in current {
            let _ = writeln!(
                out,
                "wxmon_temperature_celsius{{city=\"{}\",zip_code=\"{}\"}} {}",
                escape_label(&obs.city),
                escape_label(&obs.zip_code),
                obs.temperature
            );
        }
        for ((city, category, severity), series) in &state.alerts {
            let _ = writeln!(
                out,
                "wxmon_alerts_total{{city=\"{}\",category=\"{category}\",severity=\"{severity}\"}} {}",
                escape_label(city),
                series.count
            );
        }
        for (kind, n) in &state.processed {
            let _ = writeln!(
                out,
                "wxmon_messages_processed_total{{kind=\"{}\"}} {n}",
                escape_label(kind)
            );
        }
        for (reason, n) in &state.skipped {
            let _ = writeln!(
                out,
                "wxmon_messages_skipped_total{{reason=\"{}\"}} {n}",
                escape_label(reason)
            );
        }
        let _ = writeln!(out, "wxmon_sink_failures_total {}", state.sink_failures);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn obs(city: &str, temperature: f64) -> Observation {
        Observation {
            city: city.into(),
            zip_code: "12601".into(),
            temperature,
            humidity: 50.0,
            wind_speed: 2.0,
            pressure: 1010.0,
            forecast_time: None,
        }
    }

    fn wind_alert(city: &str, value: f64) -> WeatherAlert {
        WeatherAlert {
            category: AlertCategory::HighWind,
            severity: Severity::Warning,
            location_key: "12601".into(),
            display_name: city.into(),
            value,
            threshold: 15.0,
            condition: None,
            message: "High wind speed detected".into(),
            description: String::new(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn repeated_alerts_update_one_series() {
        let sink = MemorySink::new();
        for i in 0..1000u32 {
            sink.update_alert(&wind_alert("Poughkeepsie", 20.0 + f64::from(i % 3)))
                .unwrap();
        }
        let alerts = sink.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].value, 20.0);
        assert_eq!(
            sink.alert_count("Poughkeepsie", AlertCategory::HighWind, Severity::Warning),
            1000
        );
        assert_eq!(
            sink.alert_count("Poughkeepsie", AlertCategory::HighWind, Severity::Critical),
            0
        );
    }

    #[test]
    fn repeated_forecast_points_replace_each_other() {
        let sink = MemorySink::new();
        let at = Utc::now();
        for t in [18.0, 19.0, 20.0] {
            let mut point = obs("Poughkeepsie", t);
            point.forecast_time = Some(at);
            sink.update_observation(&point).unwrap();
        }
        let forecasts = sink.forecasts();
        assert_eq!(forecasts.len(), 1);
        assert_eq!(forecasts[0].temperature, 20.0);
    }

    #[test]
    fn render_escapes_label_values() {
        let sink = MemorySink::new();
        sink.update_observation(&obs("Say \"When\"\\", 3.5)).unwrap();
        sink.update_alert(&wind_alert("Line\nBreak", 20.5)).unwrap();
        let out = sink.render().unwrap();
        assert!(out.contains(r#"wxmon_temperature_celsius{city="Say \"When\"\\",zip_code="12601"} 3.5"#));
        assert!(out.contains(r#"wxmon_alerts_total{city="Line\nBreak",category="high_wind",severity="warning"} 1"#));
        assert!(out.lines().all(|line| line.starts_with("wxmon_")));
    }

    #[test]
    fn latest_current_observation_wins() {
        let sink = MemorySink::new();
        sink.update_observation(&obs("Poughkeepsie", 10.0)).unwrap();
        sink.update_observation(&obs("Poughkeepsie", 12.0)).unwrap();
        assert_eq!(sink.current_temperature("Poughkeepsie", "12601"), Some(12.0));
        assert!(sink.forecasts().is_empty());
    }

    #[test]
    fn forecast_points_are_kept_separately() {
        let sink = MemorySink::new();
        let mut point = obs("Poughkeepsie", 18.0);
        point.forecast_time = Some(Utc::now());
        sink.update_observation(&point).unwrap();
        assert_eq!(sink.forecasts().len(), 1);
        assert_eq!(sink.current("Poughkeepsie", "12601"), None);
    }

    #[test]
    fn test_temperature_overwrites_only_the_test_series() {
        let sink = MemorySink::new();
        sink.update_observation(&obs("Poughkeepsie", 10.0)).unwrap();
        sink.set_test_temperature("Poughkeepsie", 40.0).unwrap();
        sink.set_test_temperature("Poughkeepsie", 41.0).unwrap();
        assert_eq!(sink.current_temperature("Poughkeepsie", TEST_ZIP_LABEL), Some(41.0));
        assert_eq!(sink.current_temperature("Poughkeepsie", "12601"), Some(10.0));
        assert!(sink.alerts().is_empty());
    }

    #[test]
    fn rejecting_sink_reports_errors() {
        let sink = MemorySink::new();
        sink.set_reject_writes(true);
        assert!(matches!(
            sink.update_observation(&obs("Albany", 1.0)),
            Err(SinkError::Other(_))
        ));
        sink.set_reject_writes(false);
        assert!(sink.update_observation(&obs("Albany", 1.0)).is_ok());
    }

    #[test]
    fn counters_survive_concurrent_writers() {
        let sink = Arc::new(MemorySink::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        sink.record_processed("current");
                        sink.record_skip("malformed");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(sink.processed("current"), 800);
        assert_eq!(sink.skipped("malformed"), 800);
    }

    #[test]
    fn render_lists_counters() {
        let sink = MemorySink::new();
        sink.record_skip("unknown_message_type");
        sink.record_sink_failure();
        let out = sink.render().unwrap();
        assert!(out.contains("wxmon_messages_skipped_total{reason=\"unknown_message_type\"} 1"));
        assert!(out.contains("wxmon_sink_failures_total 1"));
    }
}
