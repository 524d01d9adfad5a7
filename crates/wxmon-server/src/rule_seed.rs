use crate::config::{RulesSeedFile, SeedAlertRule};
use wxmon_alert::registry::RuleRegistry;
use wxmon_alert::rule::{AlertRule, RuleDefaults};

/// Display name used when a seed entry does not name its location.
pub const UNKNOWN_CITY: &str = "Unknown City";

fn build_rule(seed: &SeedAlertRule, defaults: &RuleDefaults) -> AlertRule {
    let display_name = seed
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_CITY);
    AlertRule::new(
        seed.location_key.clone(),
        display_name,
        seed.custom_temp,
        seed.wind_threshold,
        seed.humidity_threshold,
        defaults,
    )
}

/// Builds a registry from parsed seed entries. Rejected entries are logged and
/// skipped; duplicates keep the last entry.
pub fn build_registry(seed: &RulesSeedFile, defaults: &RuleDefaults) -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    for entry in &seed.rules {
        let rule = build_rule(entry, defaults);
        match registry.put(rule) {
            Ok(_) => {
                tracing::debug!(
                    location_key = %entry.location_key,
                    custom_temp = entry.custom_temp,
                    "Alert rule registered"
                );
            }
            Err(e) => {
                tracing::warn!(location_key = %entry.location_key, error = %e, "Skipping alert rule");
            }
        }
    }
    registry
}

/// Loads the rules seed file. A missing or unparsable file leaves the registry
/// empty.
pub fn load_registry(path: &str, defaults: &RuleDefaults) -> RuleRegistry {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path, error = %e, "Failed to read rules file, no alerts will fire");
            return RuleRegistry::new();
        }
    };
    let seed: RulesSeedFile = match serde_json::from_str(&content) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(path, error = %e, "Failed to parse rules file, no alerts will fire");
            return RuleRegistry::new();
        }
    };

    let registry = build_registry(&seed, defaults);
    tracing::info!(path, entries = seed.rules.len(), registered = registry.len(), "Alert rules loaded");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn seed(json: &str) -> RulesSeedFile {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn builds_rules_with_display_name_fallback() {
        let registry = build_registry(
            &seed(
                r#"{"rules":[
                    {"location_key":"12601","display_name":"Poughkeepsie","custom_temp":10,"wind_threshold":15,"humidity_threshold":85},
                    {"location_key":"99999","custom_temp":20,"wind_threshold":10,"humidity_threshold":70},
                    {"location_key":"88888","display_name":"  ","custom_temp":20,"wind_threshold":10,"humidity_threshold":70}
                ]}"#,
            ),
            &RuleDefaults::default(),
        );
        assert_eq!(registry.len(), 3);
        let rule = registry.get("12601").unwrap();
        assert_eq!(rule.display_name, "Poughkeepsie");
        assert_eq!(rule.high_temp, 20.0);
        assert_eq!(registry.get("99999").unwrap().display_name, UNKNOWN_CITY);
        assert_eq!(registry.get("88888").unwrap().display_name, UNKNOWN_CITY);
    }

    #[test]
    fn empty_keys_are_skipped_and_duplicates_keep_last() {
        let registry = build_registry(
            &seed(
                r#"{"rules":[
                    {"location_key":"","custom_temp":10,"wind_threshold":15,"humidity_threshold":85},
                    {"location_key":"12601","custom_temp":10,"wind_threshold":15,"humidity_threshold":85},
                    {"location_key":"12601","custom_temp":30,"wind_threshold":15,"humidity_threshold":85}
                ]}"#,
            ),
            &RuleDefaults::default(),
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("12601").unwrap().custom_temp, 30.0);
    }

    #[test]
    fn missing_file_yields_empty_registry() {
        let registry = load_registry("/nonexistent/wxmon/rules.json", &RuleDefaults::default());
        assert!(registry.is_empty());
    }

    #[test]
    fn garbage_file_yields_empty_registry() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let registry = load_registry(file.path().to_str().unwrap(), &RuleDefaults::default());
        assert!(registry.is_empty());
    }

    #[test]
    fn loads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"rules":[{{"location_key":"10001","display_name":"New York","custom_temp":25,"wind_threshold":12,"humidity_threshold":80}}]}}"#
        )
        .unwrap();
        let defaults = RuleDefaults {
            high_offset: 5.0,
            low_offset: 5.0,
            pressure_threshold: 1000.0,
        };
        let registry = load_registry(file.path().to_str().unwrap(), &defaults);
        assert_eq!(registry.get("10001").unwrap().high_temp, 30.0);
    }
}
