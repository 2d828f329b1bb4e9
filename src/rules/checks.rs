use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::core::{AutomationItem, AutomationKind, TriggerEvent, group_active_by_object};
use crate::rules::RuleContext;
use crate::rules::builtin;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("check `{check}` cannot run as a {requested} rule")]
    ScopeMismatch {
        check: &'static str,
        requested: &'static str,
    },
}

/// One offending item reported by a cross-item check.
#[derive(Debug, Clone)]
pub struct CrossHit<'a> {
    pub item: &'a AutomationItem,
    pub message: String,
}

/// Heuristic bound to a built-in rule id.
pub trait RuleCheck {
    fn name(&self) -> &'static str;

    fn check_item(&self, item: &AutomationItem, ctx: &RuleContext) -> Result<bool, CheckError>;

    fn check_all<'a>(
        &self,
        items: &'a [AutomationItem],
        ctx: &RuleContext,
    ) -> Result<Vec<CrossHit<'a>>, CheckError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinCheck {
    NamingConvention,
    InlineTriggerLogic,
    LoopQueries,
    MultipleTriggers,
    FlowEventCollision,
    FieldWriteOverlap,
    LegacyRetrigger,
}

impl BuiltinCheck {
    const fn is_cross_item(self) -> bool {
        matches!(
            self,
            BuiltinCheck::MultipleTriggers
                | BuiltinCheck::FlowEventCollision
                | BuiltinCheck::FieldWriteOverlap
                | BuiltinCheck::LegacyRetrigger
        )
    }
}

impl RuleCheck for BuiltinCheck {
    fn name(&self) -> &'static str {
        match self {
            BuiltinCheck::NamingConvention => "naming-convention",
            BuiltinCheck::InlineTriggerLogic => "inline-trigger-logic",
            BuiltinCheck::LoopQueries => "loop-queries",
            BuiltinCheck::MultipleTriggers => "multiple-triggers",
            BuiltinCheck::FlowEventCollision => "flow-event-collision",
            BuiltinCheck::FieldWriteOverlap => "field-write-overlap",
            BuiltinCheck::LegacyRetrigger => "legacy-retrigger",
        }
    }

    fn check_item(&self, item: &AutomationItem, ctx: &RuleContext) -> Result<bool, CheckError> {
        if self.is_cross_item() {
            return Err(CheckError::ScopeMismatch {
                check: self.name(),
                requested: "per-item",
            });
        }
        let meta = item.meta();
        Ok(match self {
            BuiltinCheck::NamingConvention => {
                let Some(pattern) = ctx.naming_pattern() else {
                    return Ok(false);
                };
                !item.is_managed_package && !pattern.is_match(&item.api_name)
            }
            BuiltinCheck::InlineTriggerLogic => {
                let delegates = meta.handler_class.is_some()
                    || !meta.dispatch_calls.is_empty()
                    || ctx.classes().resolve(item).is_some();
                item.kind == AutomationKind::ScriptedTrigger
                    && (meta.has_inline_data_mutation || meta.has_inline_query)
                    && !delegates
            }
            BuiltinCheck::LoopQueries => meta.has_query_in_loop || meta.has_data_mutation_in_loop,
            _ => false,
        })
    }

    fn check_all<'a>(
        &self,
        items: &'a [AutomationItem],
        _ctx: &RuleContext,
    ) -> Result<Vec<CrossHit<'a>>, CheckError> {
        if !self.is_cross_item() {
            return Err(CheckError::ScopeMismatch {
                check: self.name(),
                requested: "cross-item",
            });
        }
        let groups = group_active_by_object(items);
        let mut hits = Vec::new();
        for (object, group) in groups {
            match self {
                BuiltinCheck::MultipleTriggers => multiple_triggers(object, &group, &mut hits),
                BuiltinCheck::FlowEventCollision => flow_event_collision(object, &group, &mut hits),
                BuiltinCheck::FieldWriteOverlap => field_write_overlap(object, &group, &mut hits),
                BuiltinCheck::LegacyRetrigger => legacy_retrigger(object, &group, &mut hits),
                _ => {}
            }
        }
        Ok(hits)
    }
}

fn sorted_of_kind<'a>(group: &[&'a AutomationItem], kind: AutomationKind) -> Vec<&'a AutomationItem> {
    let mut out: Vec<&AutomationItem> = group.iter().copied().filter(|i| i.kind == kind).collect();
    out.sort_by(|a, b| a.api_name.cmp(&b.api_name));
    out
}

fn names(items: &[&AutomationItem]) -> String {
    items
        .iter()
        .map(|i| i.api_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn multiple_triggers<'a>(object: &str, group: &[&'a AutomationItem], hits: &mut Vec<CrossHit<'a>>) {
    let triggers = sorted_of_kind(group, AutomationKind::ScriptedTrigger);
    if triggers.len() < 2 {
        return;
    }
    hits.push(CrossHit {
        item: triggers[0],
        message: format!(
            "{object} has {} active triggers ({}); the platform does not guarantee the order in which they run.",
            triggers.len(),
            names(&triggers)
        ),
    });
}

fn flow_event_collision<'a>(
    object: &str,
    group: &[&'a AutomationItem],
    hits: &mut Vec<CrossHit<'a>>,
) {
    let flows = sorted_of_kind(group, AutomationKind::RecordTriggeredFlow);
    let mut by_event: BTreeMap<TriggerEvent, Vec<&AutomationItem>> = BTreeMap::new();
    for flow in flows {
        if flow.trigger_events.is_empty() {
            by_event.entry(TriggerEvent::AfterSave).or_default().push(flow);
        }
        for event in &flow.trigger_events {
            by_event.entry(*event).or_default().push(flow);
        }
    }
    for (event, flows) in by_event {
        if flows.len() < 2 {
            continue;
        }
        hits.push(CrossHit {
            item: flows[0],
            message: format!(
                "{} record-triggered flows on {object} share the {event} event ({}); consolidate them or set an explicit trigger order.",
                flows.len(),
                names(&flows)
            ),
        });
    }
}

fn field_write_overlap<'a>(
    object: &str,
    group: &[&'a AutomationItem],
    hits: &mut Vec<CrossHit<'a>>,
) {
    let mut writers: BTreeMap<&str, BTreeSet<(&str, usize)>> = BTreeMap::new();
    for (idx, item) in group.iter().enumerate() {
        for field in &item.meta().field_update_fields {
            writers
                .entry(field.as_str())
                .or_default()
                .insert((item.api_name.as_str(), idx));
        }
    }
    for (field, set) in writers {
        if set.len() < 2 {
            continue;
        }
        let Some(&(_, first)) = set.iter().next() else {
            continue;
        };
        let writer_names: Vec<&str> = set.iter().map(|(name, _)| *name).collect();
        hits.push(CrossHit {
            item: group[first],
            message: format!(
                "{object}.{field} is written by {} automations ({}); the last writer silently overrides the others.",
                writer_names.len(),
                writer_names.join(", ")
            ),
        });
    }
}

fn legacy_retrigger<'a>(object: &str, group: &[&'a AutomationItem], hits: &mut Vec<CrossHit<'a>>) {
    let triggers = sorted_of_kind(group, AutomationKind::ScriptedTrigger);
    if triggers.is_empty() {
        return;
    }
    for rule in sorted_of_kind(group, AutomationKind::LegacyRule) {
        let fields: Vec<&str> = rule
            .meta()
            .field_update_fields
            .iter()
            .map(String::as_str)
            .collect();
        if fields.is_empty() {
            continue;
        }
        hits.push(CrossHit {
            item: rule,
            message: format!(
                "{} updates {} on {object}, which re-saves the record and fires {} again.",
                rule.api_name,
                crate::core::join_limited(&fields, 3),
                names(&triggers)
            ),
        });
    }
}

/// Explicit rule id to heuristic mapping, built once per process.
#[derive(Debug, Clone)]
pub struct CheckRegistry {
    by_rule: BTreeMap<&'static str, BuiltinCheck>,
}

impl CheckRegistry {
    pub fn builtin() -> Self {
        let by_rule = BTreeMap::from([
            (builtin::NAMING_CONVENTION, BuiltinCheck::NamingConvention),
            (builtin::INLINE_TRIGGER_LOGIC, BuiltinCheck::InlineTriggerLogic),
            (builtin::LOOP_QUERIES, BuiltinCheck::LoopQueries),
            (builtin::MULTIPLE_TRIGGERS, BuiltinCheck::MultipleTriggers),
            (builtin::FLOW_EVENT_COLLISION, BuiltinCheck::FlowEventCollision),
            (builtin::FIELD_WRITE_OVERLAP, BuiltinCheck::FieldWriteOverlap),
            (builtin::LEGACY_RETRIGGER, BuiltinCheck::LegacyRetrigger),
        ]);
        Self { by_rule }
    }

    pub fn get(&self, rule_id: &str) -> Option<BuiltinCheck> {
        self.by_rule.get(rule_id).copied()
    }
}
