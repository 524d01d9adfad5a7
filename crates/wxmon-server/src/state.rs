use crate::config::ServerConfig;
use crate::dispatcher::DispatchStats;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use wxmon_alert::registry::RuleRegistry;
use wxmon_metrics::MetricsSink;

#[derive(Clone)]
pub struct AppState {
    pub sink: Arc<dyn MetricsSink>,
    pub registry: Arc<RuleRegistry>,
    pub stats: Arc<DispatchStats>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}
