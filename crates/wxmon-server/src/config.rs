use serde::{Deserialize, Serialize};
use wxmon_alert::rule::RuleDefaults;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// JSON rules seed loaded once at startup.
    #[serde(default = "default_rules_file")]
    pub rules_file: String,
    #[serde(default)]
    pub sink: SinkKind,
    /// Offsets and pressure threshold applied when rules are built.
    #[serde(default)]
    pub alert: RuleDefaults,
    #[serde(default)]
    pub source: SourceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            rules_file: default_rules_file(),
            sink: SinkKind::default(),
            alert: RuleDefaults::default(),
            source: SourceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Prometheus,
    Memory,
}

/// Where weather envelopes are read from. Every variant carries
/// newline-delimited JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    #[default]
    Stdin,
    File {
        path: String,
    },
    Tcp {
        addr: String,
    },
}

impl std::fmt::Display for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdin => write!(f, "stdin"),
            Self::File { path } => write!(f, "file:{path}"),
            Self::Tcp { addr } => write!(f, "tcp:{addr}"),
        }
    }
}

// ---- Rules seed file types ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesSeedFile {
    #[serde(default)]
    pub rules: Vec<SeedAlertRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAlertRule {
    pub location_key: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub custom_temp: f64,
    pub wind_threshold: f64,
    pub humidity_threshold: f64,
}

fn default_http_port() -> u16 {
    8081
}

fn default_rules_file() -> String {
    "config/rules.json".to_string()
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.alert
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid [alert] section: {e}"))
    }
}
