//! PriceStore — redb-backed, append-only observation log.
//!
//! `append` validates each raw observation, skips malformed ones, and
//! commits every accepted row in its own write transaction. `read_all`
//! returns a full snapshot from a single read transaction. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::{debug, warn};

use crate::error::{AppendError, StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// The durable observation log as seen by ingestion and queries.
pub trait ObservationStore: Send + Sync {
    /// Append a batch with partial-success semantics.
    ///
    /// Malformed elements are counted in the report, never abort the batch.
    /// An `Err` means the store itself failed; its report counts the rows
    /// committed before the failure, which stay stored.
    fn append(&self, batch: &[RawObservation]) -> Result<AppendReport, AppendError>;

    /// Full snapshot of every stored observation, in no particular order.
    fn read_all(&self) -> StateResult<Vec<PriceObservation>>;
}

/// Thread-safe observation store backed by redb.
#[derive(Clone)]
pub struct PriceStore {
    db: Arc<Database>,
}

impl PriceStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "price store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory price store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(OBSERVATIONS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Persist one validated observation. Returns its sequence key.
    pub fn insert_observation(&self, observation: &PriceObservation) -> StateResult<u64> {
        let value = serde_json::to_vec(observation).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let seq;
        {
            let mut table = txn.open_table(OBSERVATIONS).map_err(map_err!(Table))?;
            seq = table
                .last()
                .map_err(map_err!(Read))?
                .map(|(key, _)| key.value() + 1)
                .unwrap_or(0);
            table
                .insert(seq, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(seq)
    }

    /// Number of stored observations.
    pub fn count(&self) -> StateResult<usize> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(OBSERVATIONS).map_err(map_err!(Table))?;
        let mut count = 0;
        for entry in table.iter().map_err(map_err!(Read))? {
            entry.map_err(map_err!(Read))?;
            count += 1;
        }
        Ok(count)
    }
}

impl ObservationStore for PriceStore {
    fn append(&self, batch: &[RawObservation]) -> Result<AppendReport, AppendError> {
        let mut report = AppendReport::default();
        for (index, raw) in batch.iter().enumerate() {
            match raw.validate() {
                Ok(observation) => {
                    let seq = match self.insert_observation(&observation) {
                        Ok(seq) => seq,
                        Err(error) => return Err(AppendError { report, error }),
                    };
                    report.written += 1;
                    debug!(
                        seq,
                        instance_type = %observation.instance_type,
                        region = %observation.region,
                        price = %observation.price,
                        "observation stored"
                    );
                }
                Err(reason) => {
                    warn!(
                        index,
                        instance_type = %raw.instance_type,
                        region = %raw.region,
                        %reason,
                        "observation rejected"
                    );
                    report.rejected += 1;
                    report.rejections.push(Rejection { index, reason });
                }
            }
        }
        debug!(
            written = report.written,
            rejected = report.rejected,
            "observation batch appended"
        );
        Ok(report)
    }

    fn read_all(&self) -> StateResult<Vec<PriceObservation>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(OBSERVATIONS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let observation: PriceObservation = serde_json::from_slice(value.value())
                .map_err(|e| StateError::CorruptRow {
                    key: key.value(),
                    reason: e.to_string(),
                })?;
            results.push(observation);
        }
        Ok(results)
    }
}
