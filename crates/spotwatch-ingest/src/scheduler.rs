//! Ingestion scheduler — periodic fetch → normalize → append.
//!
//! Each cycle fetches the full current price set, maps it to raw
//! observations, and hands the batch to the store. Nothing is carried from
//! one cycle to the next.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use spotwatch_state::{AppendError, ObservationStore, RawObservation, StateError};

use crate::source::{PriceSource, SourceError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("store append failed: {0}")]
    Store(#[from] StateError),
}

/// Outcome of one ingestion cycle.
#[derive(Debug, Default)]
pub struct CycleResult {
    pub written: usize,
    /// Source elements that did not parse plus rows the store rejected.
    pub rejected: usize,
    /// Set when the fetch or the append failed. `written` still counts rows
    /// committed before a store failure.
    pub error: Option<IngestError>,
}

impl CycleResult {
    fn failed(error: IngestError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

pub struct IngestScheduler {
    source: Arc<dyn PriceSource>,
    store: Arc<dyn ObservationStore>,
    interval: Duration,
    /// Keep only records with this product description, when set.
    product_description: Option<String>,
}

impl IngestScheduler {
    pub fn new(
        source: Arc<dyn PriceSource>,
        store: Arc<dyn ObservationStore>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            store,
            interval,
            product_description: None,
        }
    }

    pub fn with_product_filter(mut self, product_description: Option<String>) -> Self {
        self.product_description = product_description.filter(|p| !p.is_empty());
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one fetch-and-append pass.
    ///
    /// Safe to call concurrently with the scheduled loop; overlapping cycles
    /// both append, and duplicate rows are kept.
    pub async fn run_cycle(&self) -> CycleResult {
        let source = self.source.describe();

        let fetched = match self.source.fetch_current_prices().await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(%source, error = %e, "price fetch failed, cycle skipped");
                return CycleResult::failed(e.into());
            }
        };

        let malformed = fetched.malformed.len();
        let fetched_count = fetched.records.len();
        let batch: Vec<RawObservation> = fetched
            .records
            .into_iter()
            .filter(|r| match (&self.product_description, &r.product_description) {
                (Some(wanted), Some(actual)) => wanted == actual,
                _ => true,
            })
            .map(|r| r.into_raw())
            .collect();

        if batch.len() < fetched_count {
            debug!(
                %source,
                fetched = fetched_count,
                kept = batch.len(),
                "records filtered by product description"
            );
        }

        match self.store.append(&batch) {
            Ok(report) => {
                info!(
                    %source,
                    written = report.written,
                    rejected = report.rejected + malformed,
                    malformed,
                    "ingestion cycle complete"
                );
                CycleResult {
                    written: report.written,
                    rejected: report.rejected + malformed,
                    error: None,
                }
            }
            Err(AppendError { report, error: e }) => {
                error!(
                    %source,
                    written = report.written,
                    error = %e,
                    "store append failed, cycle cut short"
                );
                CycleResult {
                    written: report.written,
                    rejected: report.rejected + malformed,
                    error: Some(e.into()),
                }
            }
        }
    }

    /// Run cycles until `shutdown` flips. The first cycle starts immediately.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(interval = ?self.interval, source = %self.source.describe(), "ingest loop starting");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.changed() => {
                    debug!("ingest loop shutting down");
                    break;
                }
            }
        }
    }

    /// Spawn the loop on the runtime. The returned handle owns the task.
    pub fn spawn(self: Arc<Self>) -> IngestHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            scheduler.run(shutdown_rx).await;
        });
        info!(interval = ?self.interval, "ingest scheduler started");
        IngestHandle {
            handle,
            shutdown_tx,
        }
    }
}

/// Owned handle to a running ingest loop.
pub struct IngestHandle {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl IngestHandle {
    /// Signal shutdown and wait for the loop to finish its current cycle.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "ingest task ended abnormally");
        }
        info!("ingest scheduler stopped");
    }
}
