//! spotwatch-analytics — turns raw price observations into the enriched view.
//!
//! # Algorithm
//!
//! ```text
//! observations ──► partition by GroupingKey ──► decimal mean per group
//!                                                     │
//!      per observation:  is_steal = price < mean × steal_threshold
//!                        score    = vCPUs × memoryGB / price   (catalog hit)
//! ```
//!
//! The engine is pure and synchronous: no I/O, no caching, nothing kept
//! between calls. Every query recomputes from the full observation set.

pub mod engine;
pub mod summary;
pub mod types;

pub use engine::{AggregationEngine, normalized_score};
pub use summary::EnrichmentSummary;
pub use types::{EnrichedPrice, NormalizedScore};
