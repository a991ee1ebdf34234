//! Store failures, and the partial outcome of an interrupted append.

use thiserror::Error;

use crate::types::AppendReport;

pub type StateResult<T> = Result<T, StateError>;

/// The store could not do what was asked.
///
/// Malformed input rows are not errors; see [`crate::RejectReason`].
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    /// A stored row no longer decodes. The store is reachable; its data is not.
    #[error("stored observation {key} is corrupt: {reason}")]
    CorruptRow { key: u64, reason: String },
}

impl StateError {
    /// True when the failure is in stored data rather than in reaching the store.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StateError::CorruptRow { .. })
    }
}

/// An append stopped by a store failure.
///
/// Rows are committed one by one, so `report` counts what is already durable.
#[derive(Debug, Error)]
#[error("{error} (after {} rows written)", report.written)]
pub struct AppendError {
    pub report: AppendReport,
    #[source]
    pub error: StateError,
}

impl From<StateError> for AppendError {
    fn from(error: StateError) -> Self {
        Self {
            report: AppendReport::default(),
            error,
        }
    }
}
