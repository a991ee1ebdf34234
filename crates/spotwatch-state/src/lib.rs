//! spotwatch-state — append-only store for spot price observations.
//!
//! Backed by [redb](https://docs.rs/redb). Observations are JSON-serialized
//! into a single table keyed by an append sequence, so retried fetches that
//! deliver the same rows twice are stored twice (at-least-once).
//!
//! # Architecture
//!
//! Every accepted row commits in its own write transaction; a batch is never
//! atomic. Readers take one read transaction and therefore see a consistent
//! snapshot of whole rows, possibly missing the tail of an in-flight batch.
//!
//! The `PriceStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks. Consumers depend on the
//! [`ObservationStore`] trait.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{AppendError, StateError, StateResult};
pub use store::{ObservationStore, PriceStore};
pub use types::*;
