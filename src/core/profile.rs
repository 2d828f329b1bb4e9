use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::RuleLayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutomationPreference {
    FlowFirst,
    ApexFirst,
    Balanced,
}

impl AutomationPreference {
    pub const ALL: [AutomationPreference; 3] = [
        AutomationPreference::FlowFirst,
        AutomationPreference::ApexFirst,
        AutomationPreference::Balanced,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            AutomationPreference::FlowFirst => "flow-first",
            AutomationPreference::ApexFirst => "apex-first",
            AutomationPreference::Balanced => "balanced",
        }
    }
}

impl fmt::Display for AutomationPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutomationPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase().replace('_', "-");
        AutomationPreference::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                format!("invalid automation preference: {s} (expected flow-first|apex-first|balanced)")
            })
    }
}

/// Customer-level settings that shape one analysis pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub automation_preference: AutomationPreference,
    pub active_rule_layers: BTreeSet<RuleLayer>,
    pub suppressed_rule_ids: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub naming_convention_pattern: Option<String>,
}

impl Default for CustomerProfile {
    fn default() -> Self {
        Self {
            automation_preference: AutomationPreference::FlowFirst,
            active_rule_layers: RuleLayer::ALL.into_iter().collect(),
            suppressed_rule_ids: BTreeSet::new(),
            naming_convention_pattern: None,
        }
    }
}
