use crate::rule::AlertRule;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry: alert rule has an empty location key")]
    EmptyLocationKey,
}

/// Location key -> [`AlertRule`] store.
///
/// Populated once at startup and shared read-only afterwards (wrap it in an
/// `Arc` once population is done). Duplicate keys are last-write-wins.
#[derive(Debug, Default, Clone)]
pub struct RuleRegistry {
    rules: HashMap<String, AlertRule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the rule for `rule.location_key`, returning the
    /// replaced rule if there was one.
    pub fn put(&mut self, rule: AlertRule) -> Result<Option<AlertRule>, RegistryError> {
        if rule.location_key.is_empty() {
            return Err(RegistryError::EmptyLocationKey);
        }
        let previous = self.rules.insert(rule.location_key.clone(), rule);
        if let Some(prev) = &previous {
            tracing::debug!(
                location_key = %prev.location_key,
                "Alert rule replaced (last write wins)"
            );
        }
        Ok(previous)
    }

    pub fn get(&self, location_key: &str) -> Option<&AlertRule> {
        self.rules.get(location_key)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules, sorted by location key.
    pub fn rules(&self) -> Vec<&AlertRule> {
        let mut rules: Vec<&AlertRule> = self.rules.values().collect();
        rules.sort_by(|a, b| a.location_key.cmp(&b.location_key));
        rules
    }
}
