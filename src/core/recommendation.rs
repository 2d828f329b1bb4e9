use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::Severity;

/// Consolidation challenge of one object's stack, or an org-level concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    DeprecatedPlusMixed,
    DeprecatedPlusFlow,
    DeprecatedPlusApex,
    DeprecatedOnly,
    FlowAndApex,
    ApexFragmented,
    FlowFragmented,
    Clean,
    LegacyMigration,
    Undocumented,
    InactiveCleanup,
}

impl Pattern {
    /// Patterns the stack classifier can produce, in decision-table order.
    pub const STACK: [Pattern; 8] = [
        Pattern::DeprecatedPlusMixed,
        Pattern::DeprecatedPlusFlow,
        Pattern::DeprecatedPlusApex,
        Pattern::DeprecatedOnly,
        Pattern::FlowAndApex,
        Pattern::ApexFragmented,
        Pattern::FlowFragmented,
        Pattern::Clean,
    ];

    /// Patterns that carry directional remediation paths.
    pub const DIRECTIONAL: [Pattern; 8] = [
        Pattern::DeprecatedPlusMixed,
        Pattern::DeprecatedPlusFlow,
        Pattern::DeprecatedPlusApex,
        Pattern::DeprecatedOnly,
        Pattern::FlowAndApex,
        Pattern::ApexFragmented,
        Pattern::FlowFragmented,
        Pattern::LegacyMigration,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Pattern::DeprecatedPlusMixed => "deprecated_plus_mixed",
            Pattern::DeprecatedPlusFlow => "deprecated_plus_flow",
            Pattern::DeprecatedPlusApex => "deprecated_plus_apex",
            Pattern::DeprecatedOnly => "deprecated_only",
            Pattern::FlowAndApex => "flow_and_apex",
            Pattern::ApexFragmented => "apex_fragmented",
            Pattern::FlowFragmented => "flow_fragmented",
            Pattern::Clean => "clean",
            Pattern::LegacyMigration => "legacy_migration",
            Pattern::Undocumented => "undocumented",
            Pattern::InactiveCleanup => "inactive_cleanup",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub const fn as_str(self) -> &'static str {
        match self {
            Effort::Low => "low",
            Effort::Medium => "medium",
            Effort::High => "high",
        }
    }

    pub const fn penalty(self) -> i64 {
        match self {
            Effort::Low => 0,
            Effort::Medium => 10,
            Effort::High => 25,
        }
    }
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    #[default]
    Open,
    Accepted,
    Dismissed,
}

impl RecommendationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            RecommendationStatus::Open => "open",
            RecommendationStatus::Accepted => "accepted",
            RecommendationStatus::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(RecommendationStatus::Open),
            "accepted" => Ok(RecommendationStatus::Accepted),
            "dismissed" => Ok(RecommendationStatus::Dismissed),
            other => Err(format!(
                "invalid status: {other} (expected open|accepted|dismissed)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub step: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub warning: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    pub pattern: Pattern,
    pub title: String,
    pub rationale: String,
    pub steps: Vec<Step>,
    pub recommended_path: String,
    pub alternative_path: String,
    pub severity: Severity,
    pub effort_estimate: Effort,
    pub priority_score: i64,
    pub affected_item_ids: BTreeSet<String>,
    #[serde(default)]
    pub status: RecommendationStatus,
}
