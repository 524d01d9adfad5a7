use crate::registry::RuleRegistry;
use crate::rule::AlertRule;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use wxmon_common::types::{WeatherAlert, WeatherSample};

/// Looks up the rule for each incoming sample and runs [`crate::evaluate`].
///
/// The registry is shared read-only, so an engine can be cloned freely into
/// the dispatch loop and the HTTP state.
#[derive(Debug, Clone)]
pub struct AlertEngine {
    registry: Arc<RuleRegistry>,
}

impl AlertEngine {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn rule_for(&self, location_key: &str) -> Option<&AlertRule> {
        self.registry.get(location_key)
    }

    /// Evaluates `sample` against its location's rule.
    ///
    /// Unmonitored locations and non-evaluable sample shapes yield no alerts.
    pub fn ingest(&self, sample: &WeatherSample, now: DateTime<Utc>) -> Vec<WeatherAlert> {
        let location = sample.location();
        let Some(rule) = self.registry.get(&location.location_key) else {
            tracing::debug!(
                location_key = %location.location_key,
                city = %location.display_name,
                "No alert rule for location"
            );
            return Vec::new();
        };

        let alerts = crate::evaluate(sample, rule, now);
        for alert in &alerts {
            tracing::info!(
                location_key = %alert.location_key,
                category = %alert.category,
                severity = %alert.severity,
                value = alert.value,
                threshold = alert.threshold,
                "Alert generated"
            );
        }
        alerts
    }
}
