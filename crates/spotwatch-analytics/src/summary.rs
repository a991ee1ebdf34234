//! Roll-up counts over an enriched result, for exposition endpoints.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::EnrichedPrice;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichmentSummary {
    pub observations: usize,
    pub steals: usize,
    /// Observations with a normalized score (catalog hits).
    pub scored: usize,
    /// Group key → average price. Ordered for stable output.
    pub group_averages: BTreeMap<String, Decimal>,
}

impl EnrichmentSummary {
    pub fn from_enriched(enriched: &[EnrichedPrice]) -> Self {
        let mut summary = Self {
            observations: enriched.len(),
            ..Default::default()
        };
        for e in enriched {
            if e.is_steal {
                summary.steals += 1;
            }
            if e.normalized_score.is_some() {
                summary.scored += 1;
            }
            summary
                .group_averages
                .entry(e.group_key.clone())
                .or_insert(e.group_average_price);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AggregationEngine;
    use chrono::DateTime;
    use spotwatch_catalog::{CapabilityRecord, InMemoryCatalog};
    use spotwatch_state::PriceObservation;

    fn obs(instance_type: &str, price: i64) -> PriceObservation {
        PriceObservation {
            instance_type: instance_type.to_string(),
            region: "us-east-1a".to_string(),
            price: Decimal::new(price, 2),
            observed_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn counts_steals_scores_and_groups() {
        let catalog = InMemoryCatalog::from_records(vec![CapabilityRecord {
            instance_type: "m5.large".to_string(),
            vcpus: 2,
            memory_gb: 8.0,
            family: String::new(),
            region: String::new(),
        }]);
        let enriched = AggregationEngine::default().enrich(
            &[obs("m5.large", 1), obs("m5.large", 10), obs("m5.large", 10), obs("x9.giant", 50)],
            &catalog,
        );

        let summary = EnrichmentSummary::from_enriched(&enriched);
        assert_eq!(summary.observations, 4);
        assert_eq!(summary.steals, 1);
        assert_eq!(summary.scored, 3);
        assert_eq!(summary.group_averages.len(), 2);
        assert_eq!(summary.group_averages["m5.large"], Decimal::new(7, 2));
    }

    #[test]
    fn empty_summary() {
        assert_eq!(EnrichmentSummary::from_enriched(&[]), EnrichmentSummary::default());
    }
}
