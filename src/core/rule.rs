use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{AutomationKind, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleLayer {
    Platform,
    Quality,
    Risk,
    Housekeeping,
}

impl RuleLayer {
    pub const ALL: [RuleLayer; 4] = [
        RuleLayer::Platform,
        RuleLayer::Quality,
        RuleLayer::Risk,
        RuleLayer::Housekeeping,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            RuleLayer::Platform => "platform",
            RuleLayer::Quality => "quality",
            RuleLayer::Risk => "risk",
            RuleLayer::Housekeeping => "housekeeping",
        }
    }
}

impl fmt::Display for RuleLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        RuleLayer::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| {
                format!("invalid rule layer: {s} (expected platform|quality|risk|housekeeping)")
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckType {
    PerItem,
    CrossItem,
}

impl CheckType {
    pub const fn as_str(self) -> &'static str {
        match self {
            CheckType::PerItem => "per-item",
            CheckType::CrossItem => "cross-item",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    In,
    NotIn,
    /// Anything the evaluator does not understand; never matches.
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(field: &str, operator: Operator, value: Value) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub layer: RuleLayer,
    pub severity: Severity,
    pub check_type: CheckType,
    #[serde(default)]
    pub applies_to: BTreeSet<AutomationKind>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub message: String,
    #[serde(default)]
    pub is_builtin: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: u32,
}

fn default_true() -> bool {
    true
}

impl Rule {
    pub fn applies_to_kind(&self, kind: AutomationKind) -> bool {
        self.applies_to.is_empty() || self.applies_to.contains(&kind)
    }
}
