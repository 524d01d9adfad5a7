use crate::error::ensure_finite;
use crate::{validate_alert, MetricsSink, Observation, SinkError, TEST_ZIP_LABEL};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use wxmon_common::types::WeatherAlert;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn init_prometheus_recorder() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Failed to install Prometheus recorder, falling back to a detached one"
                );
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

/// Publishes gauges and counters through the global `metrics` recorder.
#[derive(Clone)]
pub struct PrometheusSink {
    handle: PrometheusHandle,
}

impl PrometheusSink {
    /// Installs the process-wide Prometheus recorder (once) and returns a sink
    /// rendering from it.
    pub fn install() -> Self {
        Self {
            handle: init_prometheus_recorder(),
        }
    }

    /// Wraps an existing handle. Writes still go to whatever recorder is
    /// active for the calling thread.
    pub fn with_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }
}

impl MetricsSink for PrometheusSink {
    fn update_observation(&self, obs: &Observation) -> Result<(), SinkError> {
        obs.validate()?;

        let city = obs.city.clone();
        let zip = obs.zip_code.clone();
        match obs.forecast_time {
            None => {
                gauge!("wxmon_temperature_celsius", "city" => city.clone(), "zip_code" => zip.clone())
                    .set(obs.temperature);
                gauge!("wxmon_humidity_percent", "city" => city.clone(), "zip_code" => zip.clone())
                    .set(obs.humidity);
                gauge!("wxmon_wind_speed_mps", "city" => city.clone(), "zip_code" => zip.clone())
                    .set(obs.wind_speed);
                gauge!("wxmon_pressure_hpa", "city" => city, "zip_code" => zip).set(obs.pressure);
            }
            Some(at) => {
                let at = at.to_rfc3339();
                gauge!(
                    "wxmon_forecast_temperature_celsius",
                    "city" => city.clone(), "zip_code" => zip.clone(), "forecast_time" => at.clone()
                )
                .set(obs.temperature);
                gauge!(
                    "wxmon_forecast_humidity_percent",
                    "city" => city.clone(), "zip_code" => zip.clone(), "forecast_time" => at.clone()
                )
                .set(obs.humidity);
                gauge!(
                    "wxmon_forecast_wind_speed_mps",
                    "city" => city.clone(), "zip_code" => zip.clone(), "forecast_time" => at.clone()
                )
                .set(obs.wind_speed);
                gauge!(
                    "wxmon_forecast_pressure_hpa",
                    "city" => city, "zip_code" => zip, "forecast_time" => at
                )
                .set(obs.pressure);
            }
        }
        Ok(())
    }

    fn update_alert(&self, alert: &WeatherAlert) -> Result<(), SinkError> {
        validate_alert(alert)?;

        let city = alert.display_name.clone();
        let category = alert.category.as_str();
        let severity = alert.severity.as_str();
        gauge!("wxmon_alert_value", "city" => city.clone(), "category" => category, "severity" => severity)
            .set(alert.value);
        gauge!("wxmon_alert_threshold", "city" => city.clone(), "category" => category, "severity" => severity)
            .set(alert.threshold);
        counter!("wxmon_alerts_total", "city" => city, "category" => category, "severity" => severity)
            .increment(1);
        Ok(())
    }

    fn set_test_temperature(&self, city: &str, temperature: f64) -> Result<(), SinkError> {
        ensure_finite("temperature", temperature)?;
        gauge!("wxmon_temperature_celsius", "city" => city.to_string(), "zip_code" => TEST_ZIP_LABEL)
            .set(temperature);
        Ok(())
    }

    fn record_processed(&self, kind: &str) {
        counter!("wxmon_messages_processed_total", "kind" => kind.to_string()).increment(1);
    }

    fn record_skip(&self, reason: &str) {
        counter!("wxmon_messages_skipped_total", "reason" => reason.to_string()).increment(1);
    }

    fn record_sink_failure(&self) {
        counter!("wxmon_sink_failures_total").increment(1);
    }

    fn render(&self) -> Option<String> {
        Some(self.handle.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wxmon_common::types::{AlertCategory, Severity};

    fn observation(forecast: bool) -> Observation {
        Observation {
            city: "Poughkeepsie".into(),
            zip_code: "12601".into(),
            temperature: 21.5,
            humidity: 40.0,
            wind_speed: 3.2,
            pressure: 1012.0,
            forecast_time: forecast.then(|| Utc.with_ymd_and_hms(2024, 7, 1, 15, 0, 0).unwrap()),
        }
    }

    /// Runs `f` against a sink bound to a thread-local recorder and returns the
    /// rendered exposition.
    fn render_with(f: impl FnOnce(&PrometheusSink)) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let sink = PrometheusSink::with_handle(recorder.handle());
        metrics::with_local_recorder(&recorder, || f(&sink));
        sink.render().unwrap()
    }

    #[test]
    fn current_observation_sets_gauges() {
        let out = render_with(|sink| sink.update_observation(&observation(false)).unwrap());
        assert!(out.contains("wxmon_temperature_celsius{city=\"Poughkeepsie\",zip_code=\"12601\"} 21.5"));
        assert!(out.contains("wxmon_pressure_hpa{city=\"Poughkeepsie\",zip_code=\"12601\"}"));
        assert!(!out.contains("wxmon_forecast_"));
    }

    #[test]
    fn forecast_observation_carries_forecast_time() {
        let out = render_with(|sink| sink.update_observation(&observation(true)).unwrap());
        assert!(out.contains("wxmon_forecast_temperature_celsius"));
        assert!(out.contains("forecast_time=\"2024-07-01T15:00:00+00:00\""));
    }

    #[test]
    fn test_temperature_uses_test_zip_label() {
        let out = render_with(|sink| sink.set_test_temperature("Albany", 35.5).unwrap());
        assert!(out.contains("wxmon_temperature_celsius{city=\"Albany\",zip_code=\"test\"} 35.5"));
    }

    #[test]
    fn alert_sets_value_threshold_and_count() {
        let alert = WeatherAlert {
            category: AlertCategory::HighWind,
            severity: Severity::Warning,
            location_key: "12601".into(),
            display_name: "Poughkeepsie".into(),
            value: 20.5,
            threshold: 15.5,
            condition: None,
            message: "High wind speed detected".into(),
            description: String::new(),
            generated_at: Utc::now(),
        };
        let out = render_with(|sink| sink.update_alert(&alert).unwrap());
        assert!(out.contains("wxmon_alert_value{city=\"Poughkeepsie\",category=\"high_wind\",severity=\"warning\"} 20.5"));
        assert!(out.contains("wxmon_alert_threshold{city=\"Poughkeepsie\",category=\"high_wind\",severity=\"warning\"} 15.5"));
        assert!(out.contains("wxmon_alerts_total"));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut obs = observation(false);
        obs.humidity = f64::NAN;
        let out = render_with(|sink| {
            let err = sink.update_observation(&obs).unwrap_err();
            assert!(matches!(err, SinkError::NonFinite { field: "humidity", .. }));
            assert!(sink.set_test_temperature("Albany", f64::INFINITY).is_err());
        });
        assert!(!out.contains("wxmon_temperature_celsius"));
    }
}
