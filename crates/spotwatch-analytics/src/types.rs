//! Output types of the aggregation engine. Derived per query, never stored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spotwatch_state::PriceObservation;

/// Performance-per-dollar: `vCPUs × memoryGB / price`.
///
/// `value` is canonical; `display()` is the rounded form shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedScore {
    pub value: f64,
}

impl NormalizedScore {
    pub fn display(&self) -> u64 {
        self.value.round() as u64
    }
}

/// A price observation with its group context, steal flag, and score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPrice {
    #[serde(flatten)]
    pub observation: PriceObservation,
    /// Value of the grouping field this observation was averaged under.
    pub group_key: String,
    pub group_average_price: Decimal,
    pub is_steal: bool,
    /// `None` when the catalog has no record for the instance type.
    pub normalized_score: Option<NormalizedScore>,
    pub normalized_score_display: Option<u64>,
}

impl EnrichedPrice {
    pub fn new(
        observation: PriceObservation,
        group_key: String,
        group_average_price: Decimal,
        is_steal: bool,
        normalized_score: Option<NormalizedScore>,
    ) -> Self {
        Self {
            observation,
            group_key,
            group_average_price,
            is_steal,
            normalized_score_display: normalized_score.map(|s| s.display()),
            normalized_score,
        }
    }
}
