pub mod config;
pub mod source;

pub use config::{
    AnalyticsConfig, CatalogConfig, ConfigError, DEFAULT_STEAL_THRESHOLD, GroupingKey,
    IngestConfig, ServerConfig, SpotwatchConfig,
};
pub use source::SourceUri;
