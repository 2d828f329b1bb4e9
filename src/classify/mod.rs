use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::{AutomationItem, AutomationKind, Pattern, TriggerEvent, group_active_by_object};

/// Active automation on one object, split into the three buckets the
/// classifier reasons about.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StackComposition<'a> {
    #[serde(serialize_with = "serialize_names")]
    pub legacy: Vec<&'a AutomationItem>,
    #[serde(serialize_with = "serialize_names")]
    pub flows: Vec<&'a AutomationItem>,
    #[serde(serialize_with = "serialize_names")]
    pub triggers: Vec<&'a AutomationItem>,
}

fn serialize_names<S>(items: &[&AutomationItem], s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.collect_seq(items.iter().map(|i| i.api_name.as_str()))
}

impl<'a> StackComposition<'a> {
    pub fn of<I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a AutomationItem>,
    {
        let mut out = Self::default();
        for item in items.into_iter().filter(|i| i.is_active) {
            match item.kind {
                AutomationKind::LegacyRule | AutomationKind::LegacyBranchingProcess => {
                    out.legacy.push(item)
                }
                AutomationKind::RecordTriggeredFlow => out.flows.push(item),
                AutomationKind::ScriptedTrigger => out.triggers.push(item),
                _ => {}
            }
        }
        for bucket in [&mut out.legacy, &mut out.flows, &mut out.triggers] {
            bucket.sort_by(|a, b| a.api_name.cmp(&b.api_name).then_with(|| a.id.cmp(&b.id)));
        }
        out
    }

    /// Events claimed by two or more flows, with the flows claiming them.
    /// A flow with no recognized event counts as after-save.
    pub fn flow_event_collisions(&self) -> BTreeMap<TriggerEvent, Vec<&'a AutomationItem>> {
        let mut by_event: BTreeMap<TriggerEvent, Vec<&'a AutomationItem>> = BTreeMap::new();
        for &flow in &self.flows {
            if flow.trigger_events.is_empty() {
                by_event.entry(TriggerEvent::AfterSave).or_default().push(flow);
            }
            for event in &flow.trigger_events {
                by_event.entry(*event).or_default().push(flow);
            }
        }
        by_event.retain(|_, flows| flows.len() >= 2);
        by_event
    }

    pub fn classify(&self) -> Pattern {
        let legacy = !self.legacy.is_empty();
        let flow = !self.flows.is_empty();
        let scripted = !self.triggers.is_empty();
        match (legacy, flow, scripted) {
            (true, true, true) => Pattern::DeprecatedPlusMixed,
            (true, true, false) => Pattern::DeprecatedPlusFlow,
            (true, false, true) => Pattern::DeprecatedPlusApex,
            (true, false, false) => Pattern::DeprecatedOnly,
            (false, true, true) => Pattern::FlowAndApex,
            (false, _, true) if self.triggers.len() >= 2 => Pattern::ApexFragmented,
            (false, true, false) if !self.flow_event_collisions().is_empty() => {
                Pattern::FlowFragmented
            }
            _ => Pattern::Clean,
        }
    }
}

/// Classifies the active automation on one object.
pub fn classify_stack<'a, I>(items: I) -> Pattern
where
    I: IntoIterator<Item = &'a AutomationItem>,
{
    StackComposition::of(items).classify()
}

/// One row of the per-object classification table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectClassification {
    pub object: String,
    pub pattern: Pattern,
    pub active_items: usize,
    pub legacy: usize,
    pub flows: usize,
    pub triggers: usize,
}

pub fn classify_objects(items: &[AutomationItem]) -> Vec<ObjectClassification> {
    group_active_by_object(items)
        .into_iter()
        .map(|(object, object_items)| {
            let c = StackComposition::of(object_items.iter().copied());
            ObjectClassification {
                object: object.to_string(),
                pattern: c.classify(),
                active_items: object_items.len(),
                legacy: c.legacy.len(),
                flows: c.flows.len(),
                triggers: c.triggers.len(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: &str, kind: &str, events: &[&str]) -> AutomationItem {
        serde_json::from_value(json!({
            "id": id, "kind": kind, "apiName": format!("N{id}"), "objectName": "Account",
            "isActive": true, "triggerEvents": events
        }))
        .expect("item")
    }

    #[test]
    fn decision_table_first_match_wins() {
        let wfr = item("1", "legacy-rule", &[]);
        let pb = item("2", "legacy-branching-process", &[]);
        let flow = item("3", "record-triggered-flow", &["after save"]);
        let trig = item("4", "scripted-trigger", &["before update"]);
        let trig2 = item("5", "scripted-trigger", &["after update"]);

        assert_eq!(classify_stack([&wfr, &flow, &trig]), Pattern::DeprecatedPlusMixed);
        assert_eq!(classify_stack([&pb, &flow]), Pattern::DeprecatedPlusFlow);
        assert_eq!(classify_stack([&wfr, &trig, &trig2]), Pattern::DeprecatedPlusApex);
        assert_eq!(classify_stack([&wfr, &pb]), Pattern::DeprecatedOnly);
        assert_eq!(classify_stack([&flow, &trig, &trig2]), Pattern::FlowAndApex);
        assert_eq!(classify_stack([&trig, &trig2]), Pattern::ApexFragmented);
        assert_eq!(classify_stack([&trig]), Pattern::Clean);
        assert_eq!(classify_stack([&flow]), Pattern::Clean);
    }

    #[test]
    fn flow_fragmentation_requires_event_collision() {
        let a = item("1", "record-triggered-flow", &["before save"]);
        let b = item("2", "record-triggered-flow", &["after save"]);
        assert_eq!(classify_stack([&a, &b]), Pattern::Clean);

        let c = item("3", "record-triggered-flow", &["after update"]);
        assert_eq!(classify_stack([&a, &b, &c]), Pattern::FlowFragmented);

        let no_events = item("4", "record-triggered-flow", &[]);
        assert_eq!(classify_stack([&b, &no_events]), Pattern::FlowFragmented);
    }

    #[test]
    fn inactive_and_non_participating_kinds_are_ignored() {
        let mut off = item("1", "legacy-rule", &[]);
        off.is_active = false;
        let screen = item("2", "screen-flow", &[]);
        let class = item("3", "scripted-class", &[]);
        assert_eq!(classify_stack([&off, &screen, &class]), Pattern::Clean);
        assert_eq!(classify_stack(std::iter::empty()), Pattern::Clean);
    }

    #[test]
    fn classify_objects_lists_every_object_with_active_automation() {
        let mut case_trigger = item("9", "scripted-trigger", &[]);
        case_trigger.object_name = Some("Case".to_string());
        let items = vec![
            item("1", "scripted-trigger", &[]),
            item("2", "scripted-trigger", &[]),
            case_trigger,
        ];
        let rows = classify_objects(&items);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].object, "Account");
        assert_eq!(rows[0].pattern, Pattern::ApexFragmented);
        assert_eq!(rows[0].triggers, 2);
        assert_eq!(rows[1].pattern, Pattern::Clean);
    }
}
