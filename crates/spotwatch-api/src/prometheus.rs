//! Prometheus text exposition format.
//!
//! Renders an [`EnrichmentSummary`] for scraping. Values are recomputed from
//! the full store on every scrape, like every other query.

use spotwatch_analytics::EnrichmentSummary;

/// Render the summary as GAUGE metrics, with a `group` label for averages.
pub fn render_prometheus(summary: &EnrichmentSummary, grouping: &str) -> String {
    let mut out = String::new();

    out.push_str("# HELP spotwatch_observations Stored spot price observations.\n");
    out.push_str("# TYPE spotwatch_observations gauge\n");
    out.push_str(&format!("spotwatch_observations {}\n", summary.observations));

    out.push_str("# HELP spotwatch_steals Observations priced below the steal threshold.\n");
    out.push_str("# TYPE spotwatch_steals gauge\n");
    out.push_str(&format!("spotwatch_steals {}\n", summary.steals));

    out.push_str("# HELP spotwatch_scored Observations with a normalized score.\n");
    out.push_str("# TYPE spotwatch_scored gauge\n");
    out.push_str(&format!("spotwatch_scored {}\n", summary.scored));

    out.push_str("# HELP spotwatch_group_average_price Mean hourly price per group.\n");
    out.push_str("# TYPE spotwatch_group_average_price gauge\n");
    for (group, avg) in &summary.group_averages {
        out.push_str(&format!(
            "spotwatch_group_average_price{{{grouping}=\"{}\"}} {}\n",
            escape_label(group),
            avg
        ));
    }

    out
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn renders_counts_and_groups() {
        let mut summary = EnrichmentSummary {
            observations: 3,
            steals: 1,
            scored: 2,
            ..Default::default()
        };
        summary
            .group_averages
            .insert("m5.large".to_string(), Decimal::new(7, 2));

        let text = render_prometheus(&summary, "instance_type");
        assert!(text.contains("spotwatch_observations 3\n"));
        assert!(text.contains("spotwatch_steals 1\n"));
        assert!(text.contains("spotwatch_scored 2\n"));
        assert!(text.contains("spotwatch_group_average_price{instance_type=\"m5.large\"} 0.07\n"));
    }

    #[test]
    fn empty_summary_still_declares_metrics() {
        let text = render_prometheus(&EnrichmentSummary::default(), "region");
        assert!(text.contains("# TYPE spotwatch_group_average_price gauge"));
        assert!(text.contains("spotwatch_observations 0\n"));
    }

    #[test]
    fn label_values_are_escaped() {
        assert_eq!(escape_label("a\"b\\c"), "a\\\"b\\\\c");
    }
}
