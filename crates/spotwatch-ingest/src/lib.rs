//! spotwatch-ingest — periodic fetch → normalize → append.
//!
//! # Architecture
//!
//! ```text
//! IngestScheduler
//!   ├── run_cycle() ← one fetch-and-append pass (scheduled or manual)
//!   ├── run()       → interval loop until shutdown
//!   └── spawn()     → IngestHandle (owned background task, stop())
//!
//! PriceSource (trait)
//!   ├── HttpPriceSource  → GET DescribeSpotPriceHistory JSON over HTTP/1
//!   └── FilePriceSource  → same JSON from a local snapshot file
//! ```
//!
//! Cycles are independent and stateless: a failed fetch is logged and the
//! cycle ends with zero writes; the next tick proceeds as normal. There is
//! no backoff and no mutual exclusion between scheduled and manual cycles.

pub mod scheduler;
pub mod source;

pub use scheduler::{CycleResult, IngestError, IngestHandle, IngestScheduler};
pub use source::{
    FilePriceSource, HttpPriceSource, MalformedRecord, PriceSource, SourceBatch, SourceError,
    SourceRecord, source_from_uri,
};
