//! Score differences between the analyses of two decks.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::{AnalysisResult, Section};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoreDifferences {
    /// Second deck's overall score minus the first's.
    pub overall: f64,
    /// Per-metric differences for the core sections, keyed by section key.
    #[serde(flatten)]
    pub sections: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeckComparison {
    pub deck_id_1: i64,
    pub deck_id_2: i64,
    pub score_differences: ScoreDifferences,
    pub improvements: Vec<String>,
}

/// Compares `second` against `first`.
///
/// Only metrics of the first analysis that are numeric in both results are
/// compared. Each positive metric difference yields an improvement line.
pub fn compare_results(
    deck_id_1: i64,
    first: &AnalysisResult,
    deck_id_2: i64,
    second: &AnalysisResult,
) -> DeckComparison {
    let mut sections = BTreeMap::new();
    let mut improvements = Vec::new();

    for section in Section::CORE {
        let before = first.section(section);
        let after = second.section(section);

        let mut diffs = BTreeMap::new();
        for (metric, value) in before {
            let (Some(a), Some(b)) = (value.as_f64(), after.get(metric).and_then(|v| v.as_f64()))
            else {
                continue;
            };
            let diff = b - a;
            if diff > 0.0 {
                improvements.push(format!("Improved {} by {:.1}%", metric, diff));
            }
            diffs.insert(metric.clone(), diff);
        }
        sections.insert(section.key().to_string(), diffs);
    }

    DeckComparison {
        deck_id_1,
        deck_id_2,
        score_differences: ScoreDifferences {
            overall: second.overall_score - first.overall_score,
            sections,
        },
        improvements,
    }
}
