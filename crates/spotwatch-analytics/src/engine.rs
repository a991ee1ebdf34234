//! Aggregation engine — group averages, steal flags, and normalized scores.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use spotwatch_catalog::{CapabilityCatalog, CapabilityRecord};
use spotwatch_core::{AnalyticsConfig, GroupingKey};
use spotwatch_state::PriceObservation;

use crate::types::{EnrichedPrice, NormalizedScore};

/// Computes the enriched view of a set of observations.
#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    config: AnalyticsConfig,
}

impl AggregationEngine {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// The grouping field of an observation under the configured key.
    pub fn group_key<'a>(&self, observation: &'a PriceObservation) -> &'a str {
        match self.config.grouping {
            GroupingKey::InstanceType => &observation.instance_type,
            GroupingKey::Region => &observation.region,
        }
    }

    /// Arithmetic mean of raw prices per group. Empty input, empty map.
    pub fn group_averages(&self, observations: &[PriceObservation]) -> HashMap<String, Decimal> {
        let mut groups: HashMap<&str, Vec<Decimal>> = HashMap::new();
        for observation in observations {
            groups
                .entry(self.group_key(observation))
                .or_default()
                .push(observation.price);
        }

        groups
            .into_iter()
            .map(|(key, prices)| (key.to_string(), mean(&prices)))
            .collect()
    }

    /// Strictly below `average × steal_threshold`.
    pub fn is_steal(&self, price: Decimal, group_average: Decimal) -> bool {
        group_average
            .checked_mul(self.config.steal_threshold)
            .is_some_and(|limit| price < limit)
    }

    /// Enrich every observation, preserving input order.
    pub fn enrich(
        &self,
        observations: &[PriceObservation],
        catalog: &dyn CapabilityCatalog,
    ) -> Vec<EnrichedPrice> {
        let averages = self.group_averages(observations);

        let enriched: Vec<EnrichedPrice> = observations
            .iter()
            .map(|observation| {
                let key = self.group_key(observation);
                // Every key was inserted by group_averages above.
                let average = averages.get(key).copied().unwrap_or(observation.price);
                let score = catalog
                    .lookup(&observation.instance_type)
                    .and_then(|record| normalized_score(record, observation.price));

                EnrichedPrice::new(
                    observation.clone(),
                    key.to_string(),
                    average,
                    self.is_steal(observation.price, average),
                    score,
                )
            })
            .collect();

        debug!(
            observations = enriched.len(),
            groups = averages.len(),
            grouping = %self.config.grouping,
            steals = enriched.iter().filter(|e| e.is_steal).count(),
            "observations enriched"
        );
        enriched
    }
}

/// Exact mean of a non-empty price list.
///
/// A sum beyond the `Decimal` range falls back to summing `price / n`,
/// which cannot exceed the largest member.
fn mean(prices: &[Decimal]) -> Decimal {
    let count = Decimal::from(prices.len());
    match prices
        .iter()
        .try_fold(Decimal::ZERO, |sum, price| sum.checked_add(*price))
    {
        Some(sum) => sum / count,
        None => {
            debug!(members = prices.len(), "group sum out of range, averaging by parts");
            prices
                .iter()
                .fold(Decimal::ZERO, |acc, price| acc.saturating_add(*price / count))
        }
    }
}

/// `vCPUs × memoryGB / price` for a catalog match.
///
/// `None` only if the price cannot be represented as an `f64`.
pub fn normalized_score(record: &CapabilityRecord, price: Decimal) -> Option<NormalizedScore> {
    let price = price.to_f64().filter(|p| *p > 0.0)?;
    Some(NormalizedScore {
        value: record.capacity() / price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use spotwatch_catalog::InMemoryCatalog;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn obs(instance_type: &str, region: &str, price: &str) -> PriceObservation {
        PriceObservation {
            instance_type: instance_type.to_string(),
            region: region.to_string(),
            price: dec(price),
            observed_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    fn engine(grouping: GroupingKey, threshold: &str) -> AggregationEngine {
        AggregationEngine::new(AnalyticsConfig {
            grouping,
            steal_threshold: dec(threshold),
        })
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::from_records(vec![
            CapabilityRecord {
                instance_type: "m5.large".to_string(),
                vcpus: 2,
                memory_gb: 8.0,
                family: "General purpose".to_string(),
                region: "us-east-1".to_string(),
            },
            CapabilityRecord {
                instance_type: "c5.xlarge".to_string(),
                vcpus: 4,
                memory_gb: 8.0,
                family: "Compute optimized".to_string(),
                region: "us-east-1".to_string(),
            },
        ])
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let engine = AggregationEngine::default();
        assert!(engine.group_averages(&[]).is_empty());
        assert!(engine.enrich(&[], &catalog()).is_empty());
    }

    #[test]
    fn huge_prices_average_without_overflow() {
        // Rows stored before the ingest ceiling existed must still enrich.
        let engine = AggregationEngine::default();
        let observations = vec![
            obs("m5.large", "us-east-1a", "50000000000000000000000000000"),
            obs("m5.large", "us-east-1a", "50000000000000000000000000000"),
            obs("c5.xlarge", "us-east-1a", "0.10"),
        ];

        let enriched = engine.enrich(&observations, &catalog());
        assert_eq!(enriched.len(), 3);
        assert_eq!(enriched[0].group_average_price, dec("50000000000000000000000000000"));
        assert!(!enriched[0].is_steal);
        assert_eq!(enriched[2].group_average_price, dec("0.10"));
    }

    #[test]
    fn two_observation_scenario_is_not_a_steal() {
        // 0.07 × 0.5 = 0.035, and 0.04 is not below it.
        let engine = engine(GroupingKey::InstanceType, "0.5");
        let enriched = engine.enrich(
            &[
                obs("m5.large", "us-east-1", "0.04"),
                obs("m5.large", "us-east-1", "0.10"),
            ],
            &catalog(),
        );

        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].group_average_price, dec("0.07"));
        assert_eq!(enriched[1].group_average_price, dec("0.07"));
        assert!(!enriched[0].is_steal);
        assert!(!enriched[1].is_steal);
    }

    #[test]
    fn cheap_outlier_is_a_steal() {
        let engine = engine(GroupingKey::InstanceType, "0.5");
        let enriched = engine.enrich(
            &[
                obs("m5.large", "us-east-1a", "0.01"),
                obs("m5.large", "us-east-1b", "0.10"),
                obs("m5.large", "us-east-1c", "0.10"),
            ],
            &catalog(),
        );

        assert_eq!(enriched[0].group_average_price, dec("0.07"));
        assert!(enriched[0].is_steal);
        assert!(!enriched[1].is_steal);
        assert!(!enriched[2].is_steal);
    }

    #[test]
    fn price_exactly_at_threshold_is_not_a_steal() {
        // average 2, threshold 0.5, cutoff exactly 1.
        let engine = engine(GroupingKey::InstanceType, "0.5");
        assert!(!engine.is_steal(dec("1"), dec("2")));
        assert!(engine.is_steal(dec("0.9999"), dec("2")));

        let enriched = engine.enrich(
            &[obs("m5.large", "a", "1"), obs("m5.large", "b", "3")],
            &catalog(),
        );
        assert_eq!(enriched[0].group_average_price, dec("2"));
        assert!(!enriched[0].is_steal);
    }

    #[test]
    fn singleton_group_is_never_a_steal() {
        let engine = engine(GroupingKey::InstanceType, "1");
        let enriched = engine.enrich(&[obs("t3.micro", "us-east-1a", "0.0031")], &catalog());

        assert_eq!(enriched[0].group_average_price, dec("0.0031"));
        assert!(!enriched[0].is_steal);
    }

    #[test]
    fn region_grouping_mixes_instance_types() {
        let engine = engine(GroupingKey::Region, "0.8");
        let observations = vec![
            obs("t3.micro", "us-east-1a", "0.01"),
            obs("m5.large", "us-east-1a", "0.09"),
            obs("m5.large", "eu-west-1a", "0.05"),
        ];

        let averages = engine.group_averages(&observations);
        assert_eq!(averages.len(), 2);
        assert_eq!(averages["us-east-1a"], dec("0.05"));
        assert_eq!(averages["eu-west-1a"], dec("0.05"));

        let enriched = engine.enrich(&observations, &catalog());
        assert_eq!(enriched[0].group_key, "us-east-1a");
        assert!(enriched[0].is_steal);
        assert!(!enriched[2].is_steal);
    }

    #[test]
    fn instance_type_grouping_separates_types() {
        let engine = engine(GroupingKey::InstanceType, "0.5");
        let averages = engine.group_averages(&[
            obs("t3.micro", "us-east-1a", "0.01"),
            obs("m5.large", "us-east-1a", "0.09"),
            obs("m5.large", "eu-west-1a", "0.05"),
        ]);
        assert_eq!(averages["t3.micro"], dec("0.01"));
        assert_eq!(averages["m5.large"], dec("0.07"));
    }

    #[test]
    fn score_present_for_catalog_match() {
        let engine = AggregationEngine::default();
        let enriched = engine.enrich(&[obs("c5.xlarge", "us-east-1a", "0.07")], &catalog());

        let score = enriched[0].normalized_score.unwrap();
        assert!((score.value - 32.0 / 0.07).abs() < 1e-9);
        assert_eq!(score.display(), 457);
        assert_eq!(enriched[0].normalized_score_display, Some(457));
    }

    #[test]
    fn score_absent_without_catalog_record() {
        let engine = AggregationEngine::default();
        let enriched = engine.enrich(
            &[
                obs("x9.giant", "us-east-1a", "3.5"),
                obs("x9.giant", "us-east-1b", "4.5"),
            ],
            &catalog(),
        );

        let first = &enriched[0];
        assert!(first.normalized_score.is_none());
        assert!(first.normalized_score_display.is_none());
        assert_eq!(first.observation.instance_type, "x9.giant");
        assert_eq!(first.observation.region, "us-east-1a");
        assert_eq!(first.group_average_price, dec("4"));
        assert!(!first.is_steal);
    }

    #[test]
    fn absent_score_serializes_as_null() {
        let engine = AggregationEngine::default();
        let enriched = engine.enrich(&[obs("x9.giant", "us-east-1a", "3.5")], &catalog());
        let json = serde_json::to_value(&enriched[0]).unwrap();

        assert!(json["normalized_score"].is_null());
        assert_eq!(json["instance_type"], "x9.giant");
        assert_eq!(json["is_steal"], false);
    }

    #[test]
    fn enrichment_is_repeatable() {
        let engine = engine(GroupingKey::Region, "0.8");
        let observations = vec![
            obs("t3.micro", "us-east-1a", "0.01"),
            obs("m5.large", "us-east-1a", "0.09"),
            obs("c5.xlarge", "eu-west-1a", "0.05"),
        ];
        let catalog = catalog();

        assert_eq!(
            engine.enrich(&observations, &catalog),
            engine.enrich(&observations, &catalog)
        );
    }
}
