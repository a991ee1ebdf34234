//! Query boundary — the operations the HTTP layer invokes.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use spotwatch_analytics::{AggregationEngine, EnrichedPrice};
use spotwatch_catalog::{CapabilityCatalog, CapabilityRecord};
use spotwatch_ingest::{IngestError, IngestScheduler};
use spotwatch_state::{ObservationStore, StateError};

/// Failures surfaced to callers of the query boundary.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("observation store unavailable: {0}")]
    StoreUnavailable(StateError),

    /// The store answered, but what it holds cannot be read back.
    #[error("observation store holds corrupt data: {0}")]
    CorruptData(StateError),
}

impl From<StateError> for QueryError {
    fn from(e: StateError) -> Self {
        if e.is_corrupt() {
            QueryError::CorruptData(e)
        } else {
            QueryError::StoreUnavailable(e)
        }
    }
}

/// Result of a manual regeneration.
///
/// A failed fetch is not an error here: `written` is zero and
/// `source_error` says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegenerationReport {
    pub written: usize,
    pub rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
}

pub struct SpotService {
    store: Arc<dyn ObservationStore>,
    catalog: Arc<dyn CapabilityCatalog>,
    engine: AggregationEngine,
    scheduler: Arc<IngestScheduler>,
}

impl SpotService {
    pub fn new(
        store: Arc<dyn ObservationStore>,
        catalog: Arc<dyn CapabilityCatalog>,
        engine: AggregationEngine,
        scheduler: Arc<IngestScheduler>,
    ) -> Self {
        Self {
            store,
            catalog,
            engine,
            scheduler,
        }
    }

    /// Every stored observation, enriched. Recomputed on each call.
    ///
    /// An empty store yields `Ok(vec![])`; only an unreachable store errors.
    pub fn enriched_prices(&self) -> Result<Vec<EnrichedPrice>, QueryError> {
        let observations = self.store.read_all()?;
        Ok(self.engine.enrich(&observations, self.catalog.as_ref()))
    }

    /// Run one ingestion cycle now and wait for it.
    pub async fn trigger_regeneration(&self) -> Result<RegenerationReport, QueryError> {
        info!("manual regeneration triggered");
        let cycle = self.scheduler.run_cycle().await;
        match cycle.error {
            None => Ok(RegenerationReport {
                written: cycle.written,
                rejected: cycle.rejected,
                source_error: None,
            }),
            Some(IngestError::Source(e)) => Ok(RegenerationReport {
                written: 0,
                rejected: 0,
                source_error: Some(e.to_string()),
            }),
            Some(IngestError::Store(e)) => {
                error!(written = cycle.written, error = %e, "manual regeneration cut short");
                Err(e.into())
            }
        }
    }

    pub fn catalog_lookup(&self, instance_type: &str) -> Option<CapabilityRecord> {
        self.catalog.lookup(instance_type).cloned()
    }

    pub fn catalog_size(&self) -> usize {
        self.catalog.len()
    }

    /// Name of the field observations are grouped by.
    pub fn grouping_label(&self) -> &'static str {
        self.engine.config().grouping.label()
    }
}
