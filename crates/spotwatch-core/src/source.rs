//! Price source URI resolution.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SourceUri {
    /// HTTP exporter: http://pricing-exporter:9100/spot-prices
    Http {
        /// `host[:port]` to connect to.
        authority: String,
        /// Request path including any query string.
        path: String,
    },
    /// Local snapshot: file:///srv/spot-prices.json or ./spot-prices.json
    File { path: String },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unsupported source scheme: {0}")]
    UnsupportedScheme(String),
    #[error("invalid source URI: {0}")]
    InvalidUri(String),
}

impl SourceUri {
    pub fn parse(uri: &str) -> Result<Self, SourceError> {
        if let Some(rest) = uri.strip_prefix("http://") {
            let (authority, path) = match rest.find('/') {
                Some(idx) => (&rest[..idx], &rest[idx..]),
                None => (rest, "/"),
            };
            if authority.is_empty() {
                return Err(SourceError::InvalidUri(uri.to_string()));
            }
            let authority = if authority.contains(':') {
                authority.to_string()
            } else {
                format!("{authority}:80")
            };
            Ok(SourceUri::Http {
                authority,
                path: path.to_string(),
            })
        } else if let Some(path) = uri.strip_prefix("file://") {
            if path.is_empty() {
                return Err(SourceError::InvalidUri(uri.to_string()));
            }
            Ok(SourceUri::File { path: path.to_string() })
        } else if uri.starts_with("./") || uri.starts_with('/') || uri.ends_with(".json") {
            Ok(SourceUri::File { path: uri.to_string() })
        } else {
            Err(SourceError::UnsupportedScheme(uri.to_string()))
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            SourceUri::Http { .. } => "http",
            SourceUri::File { .. } => "file",
        }
    }
}

impl std::fmt::Display for SourceUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceUri::Http { authority, path } => write!(f, "http://{authority}{path}"),
            SourceUri::File { path } => write!(f, "file://{path}"),
        }
    }
}
