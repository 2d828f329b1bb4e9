use crate::core::{CustomerProfile, Finding, Recommendation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub item_count: usize,
    pub active_item_count: usize,
    pub object_count: usize,
    pub rule_count: usize,
    pub finding_count: usize,
    pub recommendation_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_rules: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub schema_version: String,
    pub tool_version: String,
    pub pass_id: String,
    pub generated_at: String,
    pub profile: CustomerProfile,
    pub summary: ReportSummary,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<Recommendation>,
}
