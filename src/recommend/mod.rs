//! Turns classifier, auditor and resolver output into ranked recommendations.

use std::collections::{BTreeMap, BTreeSet};

use crate::classify::StackComposition;
use crate::core::{
    AutomationItem, AutomationPreference, CustomerProfile, Finding, Pattern, Recommendation,
    RecommendationStatus, Severity, group_active_by_object, join_limited,
};
use crate::handlers::{ClassIndex, HandlerReport, resolve_handlers};
use crate::order::{OrderAudit, audit_order_of_execution};

pub mod global;
pub mod paths;
pub mod scoring;
pub mod steps;

pub use paths::{PathPair, paths_for};
pub use scoring::{effort_for, priority_score};

/// Worst finding severity per item id.
pub type SeverityIndex<'f> = BTreeMap<&'f str, Severity>;

pub fn severity_index(findings: &[Finding]) -> SeverityIndex<'_> {
    let mut index: SeverityIndex<'_> = BTreeMap::new();
    for finding in findings {
        let Some(id) = finding.item_id.as_deref() else {
            continue;
        };
        let slot = index.entry(id).or_insert(finding.severity);
        *slot = (*slot).max(finding.severity);
    }
    index
}

pub(crate) fn worst_severity<'a, I>(items: I, index: &SeverityIndex<'_>) -> Option<Severity>
where
    I: IntoIterator<Item = &'a AutomationItem>,
{
    items
        .into_iter()
        .filter_map(|i| index.get(i.id.as_str()).copied())
        .max()
}

/// Everything computed for one object before prose is generated.
#[derive(Debug, Clone)]
pub struct ObjectAnalysis<'a> {
    pub object: &'a str,
    pub items: Vec<&'a AutomationItem>,
    pub pattern: Pattern,
    pub composition: StackComposition<'a>,
    pub audit: OrderAudit,
    pub handlers: HandlerReport<'a>,
}

impl<'a> ObjectAnalysis<'a> {
    pub fn new(object: &'a str, items: Vec<&'a AutomationItem>, classes: &ClassIndex<'a>) -> Self {
        let composition = StackComposition::of(items.iter().copied());
        let pattern = composition.classify();
        let audit = audit_order_of_execution(items.iter().copied());
        let handlers = resolve_handlers(object, &items, classes);
        Self {
            object,
            items,
            pattern,
            composition,
            audit,
            handlers,
        }
    }
}

/// One full synthesis over the snapshot: per-object recommendations for every
/// non-clean object plus org-level ones, pooled and ranked.
pub fn synthesize(
    items: &[AutomationItem],
    findings: &[Finding],
    profile: &CustomerProfile,
) -> Vec<Recommendation> {
    let classes = ClassIndex::new(items);
    let index = severity_index(findings);
    let preference = profile.automation_preference;

    let mut recs = Vec::new();
    for (object, object_items) in group_active_by_object(items) {
        let analysis = ObjectAnalysis::new(object, object_items, &classes);
        if let Some(rec) = object_recommendation(&analysis, &index, preference) {
            recs.push(rec);
        }
    }
    recs.extend(global::global_recommendations(items, &index, preference));
    rank(&mut recs);
    tracing::debug!(
        recommendations = recs.len(),
        classes = classes.len(),
        "recommendation synthesis finished"
    );
    recs
}

/// Descending priority; ties broken by object, pattern and id.
pub fn rank(recs: &mut [Recommendation]) {
    recs.sort_by(|a, b| {
        b.priority_score
            .cmp(&a.priority_score)
            .then_with(|| a.object_name.cmp(&b.object_name))
            .then_with(|| a.pattern.cmp(&b.pattern))
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub fn object_recommendation(
    analysis: &ObjectAnalysis<'_>,
    index: &SeverityIndex<'_>,
    preference: AutomationPreference,
) -> Option<Recommendation> {
    let pattern = analysis.pattern;
    if pattern == Pattern::Clean {
        return None;
    }
    let paths = paths_for(pattern, preference)?;
    let severity =
        worst_severity(analysis.items.iter().copied(), index).unwrap_or(Severity::Info);
    let affected: BTreeSet<String> = analysis.items.iter().map(|i| i.id.clone()).collect();
    let effort = effort_for(pattern, affected.len());

    Some(Recommendation {
        id: format!("{pattern}:{}", analysis.object),
        object_name: Some(analysis.object.to_string()),
        pattern,
        title: object_title(analysis),
        rationale: object_rationale(analysis, severity),
        steps: steps::object_steps(analysis, preference),
        recommended_path: paths.recommended.to_string(),
        alternative_path: paths.alternative.to_string(),
        severity,
        effort_estimate: effort,
        priority_score: priority_score(severity, affected.len(), effort),
        affected_item_ids: affected,
        status: RecommendationStatus::Open,
    })
}

pub(crate) fn names(items: &[&AutomationItem]) -> String {
    let names: Vec<&str> = items.iter().map(|i| i.api_name.as_str()).collect();
    join_limited(&names, 5)
}

fn object_title(a: &ObjectAnalysis<'_>) -> String {
    let c = &a.composition;
    let object = a.object;
    match a.pattern {
        Pattern::DeprecatedPlusMixed => format!(
            "{object}: consolidate {} legacy item(s), {} flow(s) and {} trigger(s)",
            c.legacy.len(),
            c.flows.len(),
            c.triggers.len()
        ),
        Pattern::DeprecatedPlusFlow => format!(
            "{object}: retire legacy automation ({}) alongside flows ({})",
            names(&c.legacy),
            names(&c.flows)
        ),
        Pattern::DeprecatedPlusApex => format!(
            "{object}: retire legacy automation ({}) that re-fires triggers ({})",
            names(&c.legacy),
            names(&c.triggers)
        ),
        Pattern::DeprecatedOnly => {
            format!("{object}: migrate legacy automation ({})", names(&c.legacy))
        }
        Pattern::FlowAndApex => format!(
            "{object}: assign ownership between flows ({}) and triggers ({})",
            names(&c.flows),
            names(&c.triggers)
        ),
        Pattern::ApexFragmented => format!(
            "{object}: merge {} triggers ({}) into one dispatch trigger",
            c.triggers.len(),
            names(&c.triggers)
        ),
        Pattern::FlowFragmented => format!(
            "{object}: resolve colliding flows ({})",
            names(&c.flows)
        ),
        other => format!("{object}: {other}"),
    }
}

fn object_rationale(a: &ObjectAnalysis<'_>, severity: Severity) -> String {
    let c = &a.composition;
    let mut parts: Vec<String> = Vec::new();
    if !c.legacy.is_empty() {
        parts.push(format!("legacy {}", names(&c.legacy)));
    }
    if !c.flows.is_empty() {
        parts.push(format!("flows {}", names(&c.flows)));
    }
    if !c.triggers.is_empty() {
        parts.push(format!("triggers {}", names(&c.triggers)));
    }
    let mut out = format!(
        "{} has {} active automation item(s): {}.",
        a.object,
        a.items.len(),
        parts.join("; ")
    );

    out.push(' ');
    out.push_str(match a.pattern {
        Pattern::DeprecatedPlusMixed => {
            "Three automation technologies run on the same save, and the legacy ones are being retired by the platform."
        }
        Pattern::DeprecatedPlusFlow => {
            "Legacy automation runs between the trigger phases and the after-save flows and is being retired by the platform."
        }
        Pattern::DeprecatedPlusApex => {
            "Legacy automation runs after the triggers; any field update it makes re-saves the record and runs them again."
        }
        Pattern::DeprecatedOnly => {
            "All automation on this object uses deprecated technology that the platform is retiring."
        }
        Pattern::FlowAndApex => {
            "Flows and triggers both act on this object, so its logic is split across two technologies."
        }
        Pattern::ApexFragmented => {
            "Multiple triggers on one object run in an order the platform does not guarantee."
        }
        Pattern::FlowFragmented => {
            "Several flows fire on the same event; their order depends on API names unless explicit trigger order values are set."
        }
        _ => "",
    });

    if !a.audit.hazards.is_empty() {
        let labels: BTreeSet<&str> = a.audit.hazards.iter().map(|h| h.hazard_type.label()).collect();
        out.push_str(&format!(
            " The execution-order audit found {} hazard(s): {}.",
            a.audit.hazards.len(),
            labels.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }
    if !a.handlers.pairs.is_empty() {
        let pairs: Vec<String> = a.handlers.pairs.iter().map(|p| p.describe()).collect();
        out.push_str(&format!(" Existing delegation: {}.", join_limited(&pairs, 3)));
    }
    if !a.handlers.warnings.is_empty() {
        out.push_str(&format!(
            " {} delegation warning(s) need review.",
            a.handlers.warnings.len()
        ));
    }
    out.push_str(&format!(" Worst rule finding on these items: {severity}."));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(v: serde_json::Value) -> Vec<AutomationItem> {
        serde_json::from_value(v).expect("items")
    }

    fn finding(item_id: &str, severity: Severity) -> Finding {
        Finding {
            rule_id: "X".to_string(),
            layer: crate::core::RuleLayer::Risk,
            severity,
            item_id: Some(item_id.to_string()),
            item_name: None,
            object_name: None,
            message: String::new(),
        }
    }

    #[test]
    fn fragmented_triggers_produce_dispatch_trigger_recommendation() {
        let items = items(json!([
            {"id": "1", "kind": "scripted-trigger", "apiName": "TA", "objectName": "Account",
             "isActive": true, "triggerEvents": ["before update"]},
            {"id": "2", "kind": "scripted-trigger", "apiName": "TB", "objectName": "Account",
             "isActive": true, "triggerEvents": ["before update"]}
        ]));
        let findings = vec![finding("1", Severity::Error), finding("2", Severity::Warning)];
        let recs = synthesize(&items, &findings, &CustomerProfile::default());
        assert_eq!(recs.len(), 1);
        let rec = &recs[0];
        assert_eq!(rec.id, "apex_fragmented:Account");
        assert_eq!(rec.severity, Severity::Error);
        assert_eq!(rec.effort_estimate, crate::core::Effort::High);
        assert_eq!(rec.priority_score, 100 + 10 - 25);
        assert!(rec.steps.iter().any(|s| s.text.contains("single dispatch trigger")));
        assert!(rec.steps.iter().any(|s| s.warning && s.text.contains("TA, TB")));
        let numbers: Vec<usize> = rec.steps.iter().map(|s| s.step).collect();
        assert_eq!(numbers, (1..=rec.steps.len()).collect::<Vec<_>>());
        assert!(
            rec.steps
                .last()
                .is_some_and(|s| s.text.contains("regression testing"))
        );
    }

    #[test]
    fn clean_objects_produce_no_object_recommendation() {
        let items = items(json!([
            {"id": "1", "kind": "scripted-trigger", "apiName": "T1", "objectName": "Case", "isActive": true}
        ]));
        assert!(synthesize(&items, &[], &CustomerProfile::default()).is_empty());
    }

    #[test]
    fn ranking_is_descending_with_stable_ties() {
        let items = items(json!([
            {"id": "1", "kind": "scripted-trigger", "apiName": "T1", "objectName": "B", "isActive": true},
            {"id": "2", "kind": "scripted-trigger", "apiName": "T2", "objectName": "B", "isActive": true},
            {"id": "3", "kind": "scripted-trigger", "apiName": "T3", "objectName": "A", "isActive": true},
            {"id": "4", "kind": "scripted-trigger", "apiName": "T4", "objectName": "A", "isActive": true},
            {"id": "5", "kind": "legacy-rule", "apiName": "W", "objectName": "C", "isActive": true}
        ]));
        let recs = synthesize(&items, &[finding("5", Severity::Error)], &CustomerProfile::default());
        let scores: Vec<i64> = recs.iter().map(|r| r.priority_score).collect();
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(scores, sorted);
        let a = recs.iter().position(|r| r.id == "apex_fragmented:A").expect("A");
        let b = recs.iter().position(|r| r.id == "apex_fragmented:B").expect("B");
        assert!(a < b);
    }

    #[test]
    fn preference_selects_path_text() {
        let items = items(json!([
            {"id": "1", "kind": "legacy-rule", "apiName": "W", "objectName": "Lead", "isActive": true},
            {"id": "2", "kind": "record-triggered-flow", "apiName": "F", "objectName": "Lead", "isActive": true}
        ]));
        let flow = synthesize(&items, &[], &CustomerProfile::default());
        let apex = synthesize(
            &items,
            &[],
            &CustomerProfile {
                automation_preference: AutomationPreference::ApexFirst,
                ..CustomerProfile::default()
            },
        );
        let pick = |recs: &[Recommendation]| {
            recs.iter()
                .find(|r| r.pattern == Pattern::DeprecatedPlusFlow)
                .map(|r| r.recommended_path.clone())
                .expect("rec")
        };
        assert_ne!(pick(&flow), pick(&apex));
    }
}
