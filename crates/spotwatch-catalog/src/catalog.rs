//! Capability records and the in-memory catalog.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CatalogError, CatalogResult};

/// Resource capacity of one instance type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityRecord {
    #[serde(rename = "instanceType")]
    pub instance_type: String,
    #[serde(rename = "vCPUs")]
    pub vcpus: u32,
    #[serde(rename = "memoryGB")]
    pub memory_gb: f64,
    /// Descriptive only; never used to join.
    pub family: String,
    /// Descriptive only; never used to join.
    pub region: String,
}

impl CapabilityRecord {
    /// vCPUs multiplied by memory, the numerator of the normalized score.
    pub fn capacity(&self) -> f64 {
        f64::from(self.vcpus) * self.memory_gb
    }
}

/// Read-only lookup of capability records by instance type.
pub trait CapabilityCatalog: Send + Sync {
    fn lookup(&self, instance_type: &str) -> Option<&CapabilityRecord>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One element of the refresh job's JSON array, before validation.
///
/// The refresh job writes `null` where the pricing API returned a value it
/// could not parse, so every field is optional here. `vCPUs` is read wide so
/// a negative count fails only its own entry.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "instanceType")]
    instance_type: Option<String>,
    #[serde(rename = "vCPUs")]
    vcpus: Option<i64>,
    #[serde(rename = "memoryGB")]
    memory_gb: Option<f64>,
    family: Option<String>,
    region: Option<String>,
}

impl CatalogEntry {
    fn into_record(self) -> Option<CapabilityRecord> {
        let instance_type = self.instance_type.filter(|t| !t.trim().is_empty())?;
        let vcpus = self.vcpus.and_then(|v| u32::try_from(v).ok()).filter(|v| *v > 0)?;
        let memory_gb = self.memory_gb.filter(|m| m.is_finite() && *m > 0.0)?;
        Some(CapabilityRecord {
            instance_type: instance_type.trim().to_string(),
            vcpus,
            memory_gb,
            family: self.family.unwrap_or_default(),
            region: self.region.unwrap_or_default(),
        })
    }
}

/// Catalog held in a `HashMap` built once from the last refresh.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    records: HashMap<String, CapabilityRecord>,
}

impl InMemoryCatalog {
    /// An empty catalog; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from records. The first record for an instance type wins.
    pub fn from_records(records: impl IntoIterator<Item = CapabilityRecord>) -> Self {
        let mut map = HashMap::new();
        for record in records {
            if map.contains_key(&record.instance_type) {
                debug!(instance_type = %record.instance_type, "duplicate catalog entry ignored");
                continue;
            }
            map.insert(record.instance_type.clone(), record);
        }
        Self { records: map }
    }

    /// Parse the refresh job's JSON array, skipping invalid entries.
    ///
    /// Only a document that is not a JSON array is an error.
    pub fn from_json_str(json: &str) -> CatalogResult<Self> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let total = entries.len();
        let mut records = Vec::with_capacity(total);
        for (index, value) in entries.into_iter().enumerate() {
            let label = value
                .get("instanceType")
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string();
            let record = serde_json::from_value::<CatalogEntry>(value)
                .ok()
                .and_then(CatalogEntry::into_record);
            match record {
                Some(record) => records.push(record),
                None => warn!(index, instance_type = %label, "invalid catalog entry skipped"),
            }
        }
        let catalog = Self::from_records(records);
        debug!(entries = total, records = catalog.len(), "catalog parsed");
        Ok(catalog)
    }

    /// Load the catalog file written by the refresh job.
    pub fn load(path: &Path) -> CatalogResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json_str(&content)?;
        info!(?path, records = catalog.len(), "capability catalog loaded");
        Ok(catalog)
    }

    /// Load the catalog, or fall back to an empty one if the file is absent.
    ///
    /// Parse failures of an existing file are still errors.
    pub fn load_or_empty(path: &Path) -> CatalogResult<Self> {
        match Self::load(path) {
            Err(CatalogError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                warn!(?path, "capability catalog not found, scores will be absent");
                Ok(Self::empty())
            }
            other => other,
        }
    }
}

impl CapabilityCatalog for InMemoryCatalog {
    fn lookup(&self, instance_type: &str) -> Option<&CapabilityRecord> {
        self.records.get(instance_type)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
