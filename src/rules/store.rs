use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::core::{CheckType, CustomerProfile, Rule, Severity};
use crate::rules::builtin;

/// Metadata-only edit of a built-in rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleOverride {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// The full rule table: built-ins (possibly edited) plus custom rules.
#[derive(Debug, Clone)]
pub struct RuleStore {
    rules: Vec<Rule>,
}

impl RuleStore {
    pub fn builtin() -> Self {
        Self {
            rules: builtin::builtin_rules(),
        }
    }

    /// Replaces the built-in table with an externally supplied one.
    pub fn from_table(rules: Vec<Rule>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for rule in &rules {
            if rule.id.trim().is_empty() {
                bail!("rule table contains a rule with an empty id");
            }
            if !seen.insert(rule.id.as_str()) {
                bail!("rule table contains duplicate id: {}", rule.id);
            }
        }
        Ok(Self { rules })
    }

    pub fn load_table(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rule table: {}", path.display()))?;
        let rules: Vec<Rule> = serde_json::from_str(&s)
            .with_context(|| format!("failed to parse rule table (JSON): {}", path.display()))?;
        Self::from_table(rules)
    }

    pub fn all(&self) -> &[Rule] {
        &self.rules
    }

    pub fn apply_overrides(&mut self, overrides: &[RuleOverride]) -> Result<()> {
        for ov in overrides {
            let rule = self
                .rules
                .iter_mut()
                .find(|r| r.id == ov.id)
                .ok_or_else(|| anyhow!("rule override references unknown rule: {}", ov.id))?;
            if !rule.is_builtin {
                bail!(
                    "rule override targets custom rule {}; edit the custom definition instead",
                    ov.id
                );
            }
            if let Some(severity) = ov.severity {
                rule.severity = severity;
            }
            if let Some(message) = &ov.message {
                rule.message = message.clone();
            }
            if let Some(active) = ov.active {
                rule.is_active = active;
            }
        }
        Ok(())
    }

    pub fn add_custom(&mut self, mut rule: Rule) -> Result<()> {
        let id = rule.id.trim().to_string();
        if id.is_empty() {
            bail!("custom rule id must not be empty");
        }
        if builtin::is_builtin_id(&id) || self.rules.iter().any(|r| r.id == id) {
            bail!("custom rule id is already in use: {id}");
        }
        if rule.check_type == CheckType::PerItem && rule.conditions.is_empty() {
            bail!("custom rule {id} must declare at least one condition");
        }
        rule.id = id;
        rule.is_builtin = false;
        self.rules.push(rule);
        Ok(())
    }

    /// Active, non-suppressed rules in the profile's layers, ordered by
    /// `sort_order` then id. This is the snapshot one pass evaluates.
    pub fn active_for(&self, profile: &CustomerProfile) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self
            .rules
            .iter()
            .filter(|r| r.is_active)
            .filter(|r| profile.active_rule_layers.contains(&r.layer))
            .filter(|r| !profile.suppressed_rule_ids.contains(&r.id))
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Condition, Operator, RuleLayer};
    use serde_json::json;

    fn custom(id: &str) -> Rule {
        Rule {
            id: id.to_string(),
            name: "custom".to_string(),
            layer: RuleLayer::Quality,
            severity: Severity::Info,
            check_type: CheckType::PerItem,
            applies_to: BTreeSet::new(),
            conditions: vec![Condition::new("isActive", Operator::Eq, json!(true))],
            message: "{{apiName}}".to_string(),
            is_builtin: true,
            is_active: true,
            sort_order: 1,
        }
    }

    #[test]
    fn builtin_table_has_unique_ids_in_all_layers() {
        let store = RuleStore::builtin();
        let ids: BTreeSet<&str> = store.all().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), store.all().len());
        for layer in RuleLayer::ALL {
            assert!(store.all().iter().any(|r| r.layer == layer), "{layer}");
        }
    }

    #[test]
    fn overrides_edit_metadata_only() {
        let mut store = RuleStore::builtin();
        store
            .apply_overrides(&[RuleOverride {
                id: builtin::MISSING_DESCRIPTION.to_string(),
                severity: Some(Severity::Error),
                message: None,
                active: Some(false),
            }])
            .expect("override");
        let rule = store
            .all()
            .iter()
            .find(|r| r.id == builtin::MISSING_DESCRIPTION)
            .expect("rule");
        assert_eq!(rule.severity, Severity::Error);
        assert!(!rule.is_active);
        assert!(!store.active_for(&CustomerProfile::default()).iter().any(|r| r.id == rule.id));

        let err = store.apply_overrides(&[RuleOverride {
            id: "NOPE".to_string(),
            severity: None,
            message: None,
            active: None,
        }]);
        assert!(err.is_err());
    }

    #[test]
    fn custom_rules_are_validated_and_never_builtin() {
        let mut store = RuleStore::builtin();
        assert!(store.add_custom(custom(builtin::NAMING_CONVENTION)).is_err());
        let mut empty = custom("C-EMPTY");
        empty.conditions.clear();
        assert!(store.add_custom(empty).is_err());

        store.add_custom(custom("C-1")).expect("custom");
        let added = store.all().iter().find(|r| r.id == "C-1").expect("added");
        assert!(!added.is_builtin);
        assert!(store.add_custom(custom("C-1")).is_err());
    }

    #[test]
    fn active_for_filters_layers_and_suppressions() {
        let store = RuleStore::builtin();
        let profile = CustomerProfile {
            active_rule_layers: [RuleLayer::Risk].into_iter().collect(),
            suppressed_rule_ids: [builtin::LOOP_QUERIES.to_string()].into_iter().collect(),
            ..CustomerProfile::default()
        };
        let active = store.active_for(&profile);
        assert!(!active.is_empty());
        assert!(active.iter().all(|r| r.layer == RuleLayer::Risk));
        assert!(!active.iter().any(|r| r.id == builtin::LOOP_QUERIES));
        let orders: Vec<u32> = active.iter().map(|r| r.sort_order).collect();
        let mut sorted = orders.clone();
        sorted.sort();
        assert_eq!(orders, sorted);
    }

    #[test]
    fn external_table_rejects_duplicate_ids() {
        assert!(RuleStore::from_table(vec![custom("X"), custom("X")]).is_err());
        assert!(RuleStore::from_table(vec![custom("X"), custom("Y")]).is_ok());
    }
}
