//! spotwatch-catalog — static instance capability reference data.
//!
//! Maps an instance type (`m5.large`) to its resource capacity (vCPUs,
//! memory). The catalog is rebuilt out-of-band by a refresh job that writes
//! a JSON array; spotwatch only ever reads it, once, at startup.
//!
//! Consumers depend on the [`CapabilityCatalog`] trait so the storage
//! format stays out of the analytics code. A lookup miss is a normal
//! `None`, not an error.

pub mod catalog;
pub mod error;

pub use catalog::{CapabilityCatalog, CapabilityRecord, InMemoryCatalog};
pub use error::{CatalogError, CatalogResult};
