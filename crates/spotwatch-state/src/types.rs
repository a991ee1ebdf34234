//! Domain types for the price observation store.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest hourly price accepted from a source.
///
/// Keeps group sums far from the `Decimal` range limit.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

// ── Input ──────────────────────────────────────────────────────────

/// An observation as handed over by a price source, before validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawObservation {
    pub instance_type: String,
    /// Availability zone or region code.
    pub region: String,
    /// Price exactly as the source reported it (e.g., "0.041200").
    pub price: String,
    /// Source-reported time of the price point.
    pub observed_at: DateTime<Utc>,
}

/// Why a raw observation was not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("instance type is empty")]
    EmptyInstanceType,

    #[error("region is empty")]
    EmptyRegion,

    #[error("price is not a decimal number: {0:?}")]
    UnparseablePrice(String),

    #[error("price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("price {0} exceeds the 1000000 ceiling")]
    PriceTooLarge(Decimal),
}

impl RawObservation {
    /// Validate and convert into a storable observation.
    ///
    /// The price keeps the full precision of the source text.
    pub fn validate(&self) -> Result<PriceObservation, RejectReason> {
        let instance_type = self.instance_type.trim();
        if instance_type.is_empty() {
            return Err(RejectReason::EmptyInstanceType);
        }
        let region = self.region.trim();
        if region.is_empty() {
            return Err(RejectReason::EmptyRegion);
        }
        let price = Decimal::from_str(self.price.trim())
            .map_err(|_| RejectReason::UnparseablePrice(self.price.clone()))?;
        if price <= Decimal::ZERO {
            return Err(RejectReason::NonPositivePrice(price));
        }
        if price > MAX_PRICE {
            return Err(RejectReason::PriceTooLarge(price));
        }
        Ok(PriceObservation {
            instance_type: instance_type.to_string(),
            region: region.to_string(),
            price,
            observed_at: self.observed_at,
        })
    }
}

// ── Stored ─────────────────────────────────────────────────────────

/// One recorded price point. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceObservation {
    pub instance_type: String,
    pub region: String,
    /// Always strictly positive.
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

// ── Append outcome ─────────────────────────────────────────────────

/// A rejected element of an appended batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Position of the element in the batch.
    pub index: usize,
    pub reason: RejectReason,
}

/// Outcome of `append`: rows written and rows skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendReport {
    pub written: usize,
    pub rejected: usize,
    pub rejections: Vec<Rejection>,
}
