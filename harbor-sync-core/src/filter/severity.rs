//! Vulnerability severity ranking

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::ScanReport;

/// Severity levels in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Negligible,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn rank(self) -> u8 {
        match self {
            Severity::Negligible => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    /// Parse a scanner label, ignoring case
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "negligible" => Some(Severity::Negligible),
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Rank of a scanner label; unknown labels rank like `negligible`
    pub fn label_rank(label: &str) -> u8 {
        Self::from_label(label).map_or(0, Severity::rank)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Negligible => "negligible",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// True when any scanner reports at least one finding at or above `threshold`.
///
/// Counts are not summed across scanners or labels.
pub fn meets_threshold(
    overview: Option<&BTreeMap<String, ScanReport>>,
    threshold: Severity,
) -> bool {
    let Some(overview) = overview else {
        return false;
    };

    overview.values().any(|report| {
        report
            .severity_counts()
            .into_iter()
            .any(|(label, count)| Severity::label_rank(label) >= threshold.rank() && count > 0)
    })
}
