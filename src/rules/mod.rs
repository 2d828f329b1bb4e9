use regex::Regex;

use crate::core::{AutomationItem, CheckType, CustomerProfile, Finding, Rule};
use crate::handlers::ClassIndex;

pub mod builtin;
pub mod checks;
pub mod conditions;
pub mod store;

pub use checks::{BuiltinCheck, CheckError, CheckRegistry, CrossHit, RuleCheck};
pub use store::{RuleOverride, RuleStore};

/// Per-pass parameters shared by every rule.
#[derive(Debug, Clone)]
pub struct RuleContext<'p> {
    pub profile: &'p CustomerProfile,
    naming_pattern: Option<Regex>,
    classes: ClassIndex<'p>,
}

impl<'p> RuleContext<'p> {
    pub fn new(profile: &'p CustomerProfile) -> Self {
        let naming_pattern = profile
            .naming_convention_pattern
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .and_then(|p| match Regex::new(&format!("^(?:{p})$")) {
                Ok(re) => Some(re),
                Err(err) => {
                    tracing::debug!(pattern = p, error = %err, "ignoring invalid naming convention pattern");
                    None
                }
            });
        Self {
            profile,
            naming_pattern,
            classes: ClassIndex::default(),
        }
    }

    /// Scripted classes of the snapshot, for checks that ask whether a
    /// trigger delegates to a handler.
    pub fn with_classes(mut self, classes: ClassIndex<'p>) -> Self {
        self.classes = classes;
        self
    }

    pub fn classes(&self) -> &ClassIndex<'p> {
        &self.classes
    }

    /// Anchored naming-convention regex; `None` when unset or invalid.
    pub fn naming_pattern(&self) -> Option<&Regex> {
        self.naming_pattern.as_ref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub findings: Vec<Finding>,
    pub failed_rules: Vec<String>,
}

/// Applies every rule to the snapshot. A failing rule is logged and contributes
/// nothing; it never aborts the pass.
pub fn evaluate(
    items: &[AutomationItem],
    rules: &[Rule],
    ctx: &RuleContext<'_>,
    registry: &CheckRegistry,
) -> Evaluation {
    let mut out = Evaluation::default();
    for rule in rules {
        let check = if rule.is_builtin {
            registry.get(&rule.id)
        } else {
            None
        };
        let result = match rule.check_type {
            CheckType::PerItem => evaluate_per_item(rule, check, items, ctx),
            CheckType::CrossItem => match check {
                Some(check) => evaluate_cross_item(rule, check, items, ctx),
                None => {
                    tracing::debug!(rule = %rule.id, "cross-item rule has no bound check; skipping");
                    Ok(Vec::new())
                }
            },
        };
        match result {
            Ok(findings) => out.findings.extend(findings),
            Err(err) => {
                tracing::warn!(rule = %rule.id, error = %err, "rule evaluation failed; skipping");
                out.failed_rules.push(rule.id.clone());
            }
        }
    }
    tracing::debug!(
        rules = rules.len(),
        findings = out.findings.len(),
        failed = out.failed_rules.len(),
        "rule evaluation finished"
    );
    out
}

fn evaluate_per_item(
    rule: &Rule,
    check: Option<BuiltinCheck>,
    items: &[AutomationItem],
    ctx: &RuleContext<'_>,
) -> Result<Vec<Finding>, CheckError> {
    let mut findings = Vec::new();
    for item in items.iter().filter(|i| rule.applies_to_kind(i.kind)) {
        let matched = match check {
            Some(check) => check.check_item(item, ctx)?,
            None => conditions::conditions_match(&rule.conditions, item),
        };
        if matched {
            findings.push(finding_for(
                rule,
                item,
                conditions::render_message(&rule.message, item, &[]),
            ));
        }
    }
    Ok(findings)
}

fn evaluate_cross_item(
    rule: &Rule,
    check: BuiltinCheck,
    items: &[AutomationItem],
    ctx: &RuleContext<'_>,
) -> Result<Vec<Finding>, CheckError> {
    let hits = check.check_all(items, ctx)?;
    Ok(hits
        .into_iter()
        .map(|hit| {
            let message =
                conditions::render_message(&rule.message, hit.item, &[("detail", &hit.message)]);
            finding_for(rule, hit.item, message)
        })
        .collect())
}

fn finding_for(rule: &Rule, item: &AutomationItem, message: String) -> Finding {
    Finding {
        rule_id: rule.id.clone(),
        layer: rule.layer,
        severity: rule.severity,
        item_id: Some(item.id.clone()),
        item_name: Some(item.api_name.clone()),
        object_name: item.object_name.clone(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AutomationKind, Condition, Operator, RuleLayer, Severity};
    use serde_json::json;

    fn items() -> Vec<AutomationItem> {
        serde_json::from_value(json!([
            {"id": "1", "kind": "legacy-rule", "apiName": "WFR1", "objectName": "Account", "isActive": true},
            {"id": "2", "kind": "scripted-trigger", "apiName": "T1", "objectName": "Account", "isActive": true},
            {"id": "3", "kind": "scripted-trigger", "apiName": "T2", "objectName": "Account", "isActive": false}
        ]))
        .expect("items")
    }

    fn custom(id: &str, check_type: CheckType, conditions: Vec<Condition>) -> Rule {
        Rule {
            id: id.to_string(),
            name: id.to_string(),
            layer: RuleLayer::Quality,
            severity: Severity::Warning,
            check_type,
            applies_to: [AutomationKind::ScriptedTrigger].into_iter().collect(),
            conditions,
            message: "{{apiName}} matched {{kind}}".to_string(),
            is_builtin: false,
            is_active: true,
            sort_order: 1,
        }
    }

    #[test]
    fn declarative_rule_respects_applies_to_and_renders_message() {
        let rule = custom(
            "C-1",
            CheckType::PerItem,
            vec![Condition::new("isActive", Operator::Eq, json!(true))],
        );
        let profile = CustomerProfile::default();
        let eval = evaluate(
            &items(),
            &[rule],
            &RuleContext::new(&profile),
            &CheckRegistry::builtin(),
        );
        assert_eq!(eval.findings.len(), 1);
        assert_eq!(eval.findings[0].item_id.as_deref(), Some("2"));
        assert_eq!(eval.findings[0].message, "T1 matched scripted-trigger");
        assert_eq!(eval.findings[0].severity, Severity::Warning);
    }

    #[test]
    fn cross_item_rule_without_check_is_a_no_op() {
        let rule = custom("C-2", CheckType::CrossItem, vec![]);
        let profile = CustomerProfile::default();
        let eval = evaluate(
            &items(),
            &[rule],
            &RuleContext::new(&profile),
            &CheckRegistry::builtin(),
        );
        assert!(eval.findings.is_empty());
        assert!(eval.failed_rules.is_empty());
    }

    #[test]
    fn failing_rule_is_skipped_and_others_still_run() {
        // Built-in cross-item check wired to a per-item row.
        let mut broken = builtin::builtin_rules()
            .into_iter()
            .find(|r| r.id == builtin::MULTIPLE_TRIGGERS)
            .expect("builtin");
        broken.check_type = CheckType::PerItem;
        let ok = custom(
            "C-3",
            CheckType::PerItem,
            vec![Condition::new("kind", Operator::Eq, json!("scripted-trigger"))],
        );
        let profile = CustomerProfile::default();
        let eval = evaluate(
            &items(),
            &[broken, ok],
            &RuleContext::new(&profile),
            &CheckRegistry::builtin(),
        );
        assert_eq!(eval.failed_rules, vec![builtin::MULTIPLE_TRIGGERS.to_string()]);
        assert_eq!(eval.findings.len(), 2);
        assert!(eval.findings.iter().all(|f| f.rule_id == "C-3"));
    }

    #[test]
    fn builtin_rule_id_on_custom_row_does_not_bind_heuristic() {
        let mut rule = custom("PLAT-003", CheckType::CrossItem, vec![]);
        rule.is_builtin = false;
        let profile = CustomerProfile::default();
        let eval = evaluate(
            &items(),
            &[rule],
            &RuleContext::new(&profile),
            &CheckRegistry::builtin(),
        );
        assert!(eval.findings.is_empty());
    }
}
