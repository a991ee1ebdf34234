//! spotwatch.toml configuration parser.
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration. `validate()` is applied by `from_file`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::{SourceError, SourceUri};

/// Fraction of a group's average price below which an observation is a steal.
pub const DEFAULT_STEAL_THRESHOLD: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Default polling interval for the ingest loop.
pub const DEFAULT_INGEST_INTERVAL: &str = "2m";

/// Default per-fetch timeout for price sources.
pub const DEFAULT_FETCH_TIMEOUT: &str = "10s";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("steal_threshold must be in (0, 1], got {0}")]
    InvalidThreshold(Decimal),
    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotwatchConfig {
    pub server: ServerConfig,
    pub ingest: IngestConfig,
    pub analytics: AnalyticsConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            data_dir: PathBuf::from("/var/lib/spotwatch"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Price source URI (`http://...` exporter or `file://...` snapshot).
    pub source: String,
    /// Interval between scheduled cycles (e.g., "2m").
    pub interval: String,
    /// Timeout applied to each fetch (e.g., "10s").
    pub timeout: String,
    /// Only keep source records with this product description.
    pub product_description: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source: "http://127.0.0.1:9100/spot-prices".to_string(),
            interval: DEFAULT_INGEST_INTERVAL.to_string(),
            timeout: DEFAULT_FETCH_TIMEOUT.to_string(),
            product_description: Some("Linux/UNIX".to_string()),
        }
    }
}

impl IngestConfig {
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        positive_duration("ingest.interval", &self.interval)
    }

    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        positive_duration("ingest.timeout", &self.timeout)
    }

    pub fn source_uri(&self) -> Result<SourceUri, ConfigError> {
        Ok(SourceUri::parse(&self.source)?)
    }
}

/// Which observation field partitions the averaging groups.
///
/// Fixed once per deployment; the steal threshold is calibrated against it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingKey {
    #[default]
    InstanceType,
    Region,
}

impl GroupingKey {
    pub fn label(&self) -> &'static str {
        match self {
            GroupingKey::InstanceType => "instance_type",
            GroupingKey::Region => "region",
        }
    }
}

impl std::fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub grouping: GroupingKey,
    pub steal_threshold: Decimal,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            grouping: GroupingKey::default(),
            steal_threshold: DEFAULT_STEAL_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON file written by the catalog refresh job.
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ec2Specs.json"),
        }
    }
}

impl SpotwatchConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: SpotwatchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.analytics.steal_threshold;
        if threshold <= Decimal::ZERO || threshold > Decimal::ONE {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        self.ingest.interval()?;
        self.ingest.timeout()?;
        self.ingest.source_uri()?;
        Ok(())
    }
}

/// Parse a duration string like "500ms", "10s", "2m", "1h", or bare seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        let mins = mins.trim().parse::<u64>().ok()?;
        mins.checked_mul(60).map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        let hours = hours.trim().parse::<u64>().ok()?;
        hours.checked_mul(3600).map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn positive_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let duration = parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
        field,
        value: value.to_string(),
    })?;
    if duration.is_zero() {
        return Err(ConfigError::ZeroDuration(field));
    }
    Ok(duration)
}
