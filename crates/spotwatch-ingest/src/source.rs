//! Price source clients.
//!
//! Both clients read the DescribeSpotPriceHistory JSON shape:
//!
//! ```text
//! {"SpotPriceHistory": [{"InstanceType": "m5.large",
//!                        "AvailabilityZone": "us-east-1a",
//!                        "SpotPrice": "0.041200",
//!                        "Timestamp": "2025-01-01T00:00:00Z",
//!                        "ProductDescription": "Linux/UNIX"}]}
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use spotwatch_core::SourceUri;
use spotwatch_state::RawObservation;

/// Whole-fetch failures. The scheduler treats every variant the same way.
///
/// A bad element inside an otherwise readable response is not one of these;
/// it is counted in [`SourceBatch::malformed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("price source unavailable: {0}")]
    Unavailable(String),

    #[error("price source rejected credentials: {0}")]
    Auth(String),

    #[error("malformed price source response: {0}")]
    Malformed(String),
}

/// Boxed future alias for price fetches.
pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<SourceBatch, SourceError>> + Send + 'a>>;

/// A client for the current set of spot prices.
///
/// Implementations own their timeout; a fetch must never hang forever.
pub trait PriceSource: Send + Sync {
    fn fetch_current_prices(&self) -> FetchFuture<'_>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// One spot price entry as reported by the source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SourceRecord {
    pub instance_type: String,
    pub availability_zone: String,
    #[serde(deserialize_with = "price_text")]
    pub spot_price: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub product_description: Option<String>,
}

impl SourceRecord {
    pub fn into_raw(self) -> RawObservation {
        RawObservation {
            instance_type: self.instance_type,
            region: self.availability_zone,
            price: self.spot_price,
            observed_at: self.timestamp,
        }
    }
}

/// An element of the response that could not be read as a [`SourceRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    /// Position in the `SpotPriceHistory` array.
    pub index: usize,
    pub reason: String,
}

/// The readable records of one fetch, plus the elements that were not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceBatch {
    pub records: Vec<SourceRecord>,
    pub malformed: Vec<MalformedRecord>,
}

impl From<Vec<SourceRecord>> for SourceBatch {
    fn from(records: Vec<SourceRecord>) -> Self {
        Self {
            records,
            malformed: Vec::new(),
        }
    }
}

/// The envelope. Elements stay untyped so one bad entry cannot sink the rest.
#[derive(Debug, Deserialize)]
struct SpotPriceHistory {
    #[serde(rename = "SpotPriceHistory")]
    spot_price_history: Vec<serde_json::Value>,
}

/// Keep the price as text whether the source quoted it or not.
fn price_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "SpotPrice must be a string or number, got {other}"
        ))),
    }
}

/// Parse a DescribeSpotPriceHistory response body.
///
/// Fails only when the envelope itself is unreadable; bad elements are
/// collected in [`SourceBatch::malformed`].
pub fn parse_spot_price_history(body: &[u8]) -> Result<SourceBatch, SourceError> {
    let parsed: SpotPriceHistory =
        serde_json::from_slice(body).map_err(|e| SourceError::Malformed(e.to_string()))?;

    let mut batch = SourceBatch::default();
    for (index, element) in parsed.spot_price_history.into_iter().enumerate() {
        match serde_json::from_value::<SourceRecord>(element) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                warn!(index, error = %e, "malformed spot price record skipped");
                batch.malformed.push(MalformedRecord {
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(batch)
}

// ── HTTP ───────────────────────────────────────────────────────────

/// Fetches prices with a plain HTTP/1 GET.
pub struct HttpPriceSource {
    /// `host:port` to connect to.
    authority: String,
    /// Request path including query string.
    path: String,
    timeout: Duration,
}

impl HttpPriceSource {
    pub fn new(authority: impl Into<String>, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            authority: authority.into(),
            path: path.into(),
            timeout,
        }
    }

    async fn get(&self) -> Result<SourceBatch, SourceError> {
        let uri = self.describe();

        let stream = tokio::net::TcpStream::connect(&self.authority)
            .await
            .map_err(|e| SourceError::Unavailable(format!("connect to {uri}: {e}")))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| SourceError::Unavailable(format!("handshake with {uri}: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(&self.path)
            .header("host", &self.authority)
            .header("accept", "application/json")
            .header("user-agent", "spotwatch-ingest/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| SourceError::Unavailable(format!("build request for {uri}: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| SourceError::Unavailable(format!("request to {uri}: {e}")))?;

        let status = resp.status();
        if status == http::StatusCode::UNAUTHORIZED || status == http::StatusCode::FORBIDDEN {
            return Err(SourceError::Auth(format!("{uri} returned {status}")));
        }
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!("{uri} returned {status}")));
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| SourceError::Unavailable(format!("read body from {uri}: {e}")))?
            .to_bytes();

        let batch = parse_spot_price_history(&body)?;
        debug!(
            %uri,
            records = batch.records.len(),
            malformed = batch.malformed.len(),
            bytes = body.len(),
            "spot prices fetched"
        );
        Ok(batch)
    }
}

impl PriceSource for HttpPriceSource {
    fn fetch_current_prices(&self) -> FetchFuture<'_> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, self.get()).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Unavailable(format!(
                    "{} timed out after {:?}",
                    self.describe(),
                    self.timeout
                ))),
            }
        })
    }

    fn describe(&self) -> String {
        format!("http://{}{}", self.authority, self.path)
    }
}

// ── File ───────────────────────────────────────────────────────────

/// Reads prices from a snapshot file, re-read on every fetch.
pub struct FilePriceSource {
    path: PathBuf,
}

impl FilePriceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PriceSource for FilePriceSource {
    fn fetch_current_prices(&self) -> FetchFuture<'_> {
        Box::pin(async move {
            let body = tokio::fs::read(&self.path).await.map_err(|e| {
                let msg = format!("read {}: {e}", self.path.display());
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    SourceError::Auth(msg)
                } else {
                    SourceError::Unavailable(msg)
                }
            })?;
            let batch = parse_spot_price_history(&body)?;
            debug!(
                path = ?self.path,
                records = batch.records.len(),
                malformed = batch.malformed.len(),
                "spot prices read"
            );
            Ok(batch)
        })
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

/// Build the client for a configured source URI.
pub fn source_from_uri(uri: &SourceUri, timeout: Duration) -> Arc<dyn PriceSource> {
    match uri {
        SourceUri::Http { authority, path } => {
            Arc::new(HttpPriceSource::new(authority.clone(), path.clone(), timeout))
        }
        SourceUri::File { path } => Arc::new(FilePriceSource::new(path.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;

    const BODY: &str = r#"{
  "SpotPriceHistory": [
    {"AvailabilityZone": "us-east-1a", "InstanceType": "m5.large", "ProductDescription": "Linux/UNIX",
     "SpotPrice": "0.041200", "Timestamp": "2025-01-01T00:00:00+00:00"},
    {"AvailabilityZone": "us-east-1b", "InstanceType": "c5.xlarge", "ProductDescription": "Windows",
     "SpotPrice": 0.0712, "Timestamp": "2025-01-01T00:01:00.000Z"}
  ]
}"#;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr.to_string()
    }

    #[test]
    fn parses_quoted_and_numeric_prices() {
        let records = parse_spot_price_history(BODY.as_bytes()).unwrap().records;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].spot_price, "0.041200");
        assert_eq!(records[1].spot_price, "0.0712");
        assert_eq!(records[1].product_description.as_deref(), Some("Windows"));
    }

    #[test]
    fn record_maps_zone_to_region() {
        let records = parse_spot_price_history(BODY.as_bytes()).unwrap().records;
        let raw = records[0].clone().into_raw();
        assert_eq!(raw.instance_type, "m5.large");
        assert_eq!(raw.region, "us-east-1a");
        assert_eq!(raw.price, "0.041200");
        assert_eq!(raw.observed_at.timestamp(), 1_735_689_600);
    }

    #[test]
    fn malformed_body_is_reported() {
        assert!(matches!(
            parse_spot_price_history(b"<html>"),
            Err(SourceError::Malformed(_))
        ));
        assert!(matches!(
            parse_spot_price_history(br#"{"SpotPriceHistory": {"InstanceType": "m5.large"}}"#),
            Err(SourceError::Malformed(_))
        ));

        let batch =
            parse_spot_price_history(br#"{"SpotPriceHistory": [{"InstanceType": "m5.large"}]}"#)
                .unwrap();
        assert!(batch.records.is_empty());
        assert_eq!(batch.malformed.len(), 1);
        assert_eq!(batch.malformed[0].index, 0);
    }

    #[test]
    fn bad_elements_skip_only_themselves() {
        let body = r#"{"SpotPriceHistory": [
  {"AvailabilityZone": "us-east-1a", "InstanceType": "m5.large",
   "SpotPrice": "0.04", "Timestamp": "2025-01-01T00:00:00Z"},
  {"AvailabilityZone": "us-east-1a", "InstanceType": "m5.large",
   "SpotPrice": null, "Timestamp": "2025-01-01T00:00:00Z"},
  {"AvailabilityZone": "us-east-1a", "InstanceType": "m5.large",
   "SpotPrice": "0.05", "Timestamp": "yesterday"},
  "m5.large",
  {"AvailabilityZone": "us-east-1b", "InstanceType": "c5.xlarge",
   "SpotPrice": 0.07, "Timestamp": "2025-01-01T00:00:00Z"}
]}"#;
        let batch = parse_spot_price_history(body.as_bytes()).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[1].instance_type, "c5.xlarge");
        let skipped: Vec<usize> = batch.malformed.iter().map(|m| m.index).collect();
        assert_eq!(skipped, vec![1, 2, 3]);
        assert!(batch.malformed[0].reason.contains("SpotPrice"));
    }

    #[tokio::test]
    async fn file_source_reads_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BODY.as_bytes()).unwrap();

        let source = FilePriceSource::new(file.path());
        let batch = source.fetch_current_prices().await.unwrap();
        assert_eq!(batch.records.len(), 2);
        assert!(batch.malformed.is_empty());
        assert!(source.describe().starts_with("file://"));
    }

    #[tokio::test]
    async fn file_source_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = FilePriceSource::new(dir.path().join("missing.json"));
        assert!(matches!(
            source.fetch_current_prices().await,
            Err(SourceError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn http_source_fetches_records() {
        let addr = serve(Router::new().route("/spot-prices", get(|| async { BODY }))).await;

        let source = HttpPriceSource::new(addr, "/spot-prices", Duration::from_secs(5));
        let batch = source.fetch_current_prices().await.unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].instance_type, "m5.large");
    }

    #[tokio::test]
    async fn http_source_maps_status_codes() {
        let addr = serve(
            Router::new()
                .route("/denied", get(|| async { StatusCode::FORBIDDEN }))
                .route("/broken", get(|| async { StatusCode::BAD_GATEWAY }))
                .route("/garbage", get(|| async { "not json" })),
        )
        .await;
        let timeout = Duration::from_secs(5);

        let denied = HttpPriceSource::new(addr.clone(), "/denied", timeout);
        assert!(matches!(
            denied.fetch_current_prices().await,
            Err(SourceError::Auth(_))
        ));

        let broken = HttpPriceSource::new(addr.clone(), "/broken", timeout);
        assert!(matches!(
            broken.fetch_current_prices().await,
            Err(SourceError::Unavailable(_))
        ));

        let garbage = HttpPriceSource::new(addr, "/garbage", timeout);
        assert!(matches!(
            garbage.fetch_current_prices().await,
            Err(SourceError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn http_source_times_out() {
        let addr = serve(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                BODY
            }),
        ))
        .await;

        let source = HttpPriceSource::new(addr, "/slow", Duration::from_millis(100));
        let err = source.fetch_current_prices().await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn http_source_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let source = HttpPriceSource::new(addr, "/spot-prices", Duration::from_secs(2));
        assert!(matches!(
            source.fetch_current_prices().await,
            Err(SourceError::Unavailable(_))
        ));
    }

    #[test]
    fn builds_client_for_uri() {
        let http = SourceUri::parse("http://exporter:9100/spot-prices").unwrap();
        assert_eq!(
            source_from_uri(&http, Duration::from_secs(1)).describe(),
            "http://exporter:9100/spot-prices"
        );

        let file = SourceUri::parse("file:///srv/prices.json").unwrap();
        assert_eq!(
            source_from_uri(&file, Duration::from_secs(1)).describe(),
            "file:///srv/prices.json"
        );
    }
}
