//! Links scripted triggers to the class they delegate to and flags the
//! delegation anti-patterns that matter for consolidation.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::core::{AutomationItem, AutomationKind, join_limited};

static DISPATCH_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:new\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*[.(]").expect("dispatch regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolvedVia {
    HandlerClass,
    DispatchCall,
    NamingConvention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerWarningKind {
    SameObjectMutation,
    CrossObjectMutation,
    InlineLogicWithoutHandler,
}

#[derive(Debug, Clone)]
pub struct HandlerPair<'a> {
    pub trigger: &'a AutomationItem,
    pub class: &'a AutomationItem,
    pub via: ResolvedVia,
}

impl HandlerPair<'_> {
    pub fn describe(&self) -> String {
        format!("{} → {}", self.trigger.api_name, self.class.api_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerWarning {
    pub kind: HandlerWarningKind,
    pub trigger: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct HandlerReport<'a> {
    pub pairs: Vec<HandlerPair<'a>>,
    pub unresolved: Vec<&'a AutomationItem>,
    pub warnings: Vec<HandlerWarning>,
}

/// Scripted classes keyed by lower-cased name.
#[derive(Debug, Clone, Default)]
pub struct ClassIndex<'a> {
    by_name: BTreeMap<String, &'a AutomationItem>,
}

impl<'a> ClassIndex<'a> {
    pub fn new(items: &'a [AutomationItem]) -> Self {
        let mut by_name = BTreeMap::new();
        for item in items.iter().filter(|i| i.kind == AutomationKind::ScriptedClass) {
            by_name
                .entry(item.api_name.to_ascii_lowercase())
                .or_insert(item);
        }
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<&'a AutomationItem> {
        self.by_name.get(&name.trim().to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Finds the delegate class of one trigger.
    pub fn resolve(&self, trigger: &AutomationItem) -> Option<(&'a AutomationItem, ResolvedVia)> {
        let meta = trigger.meta();
        if let Some(class) = meta.handler_class.as_deref().and_then(|n| self.get(n)) {
            return Some((class, ResolvedVia::HandlerClass));
        }
        for call in &meta.dispatch_calls {
            let Some(caps) = DISPATCH_TARGET.captures(call) else {
                continue;
            };
            if let Some(class) = self.get(&caps[1]) {
                return Some((class, ResolvedVia::DispatchCall));
            }
        }
        let mut candidates = vec![format!("{}Handler", trigger.api_name)];
        if let Some(object) = trigger.object_name.as_deref() {
            candidates.push(format!("{}TriggerHandler", object.replace("__c", "")));
            candidates.push(format!("{object}TriggerHandler"));
        }
        candidates
            .iter()
            .find_map(|name| self.get(name))
            .map(|class| (class, ResolvedVia::NamingConvention))
    }
}

/// Resolves handlers for the active triggers among `object_items` and
/// derives the delegation warnings for `object`.
pub fn resolve_handlers<'a>(
    object: &str,
    object_items: &[&'a AutomationItem],
    classes: &ClassIndex<'a>,
) -> HandlerReport<'a> {
    let mut report = HandlerReport::default();
    let mut triggers: Vec<&'a AutomationItem> = object_items
        .iter()
        .copied()
        .filter(|i| i.is_active && i.kind == AutomationKind::ScriptedTrigger)
        .collect();
    triggers.sort_by(|a, b| a.api_name.cmp(&b.api_name));

    for trigger in triggers {
        match classes.resolve(trigger) {
            Some((class, via)) => {
                let others = object_items
                    .iter()
                    .filter(|i| i.is_active && i.id != trigger.id)
                    .count();
                push_mutation_warnings(object, trigger, class, others, &mut report.warnings);
                report.pairs.push(HandlerPair {
                    trigger,
                    class,
                    via,
                });
            }
            None => {
                if trigger.meta().has_inline_data_mutation {
                    report.warnings.push(HandlerWarning {
                        kind: HandlerWarningKind::InlineLogicWithoutHandler,
                        trigger: trigger.api_name.clone(),
                        class: None,
                        text: format!(
                            "Trigger {} performs data mutation inline with no handler class; move the logic into a handler before consolidating.",
                            trigger.api_name
                        ),
                    });
                }
                report.unresolved.push(trigger);
            }
        }
    }
    report
}

fn push_mutation_warnings(
    object: &str,
    trigger: &AutomationItem,
    class: &AutomationItem,
    other_active: usize,
    out: &mut Vec<HandlerWarning>,
) {
    let mutated = &class.meta().mutated_objects;
    let same = mutated.iter().any(|o| o.eq_ignore_ascii_case(object));
    if same && other_active > 0 {
        out.push(HandlerWarning {
            kind: HandlerWarningKind::SameObjectMutation,
            trigger: trigger.api_name.clone(),
            class: Some(class.api_name.clone()),
            text: format!(
                "Handler {} (called from {}) writes {object} records while {other_active} other active automation(s) also target {object}; audit for duplicate writes.",
                class.api_name, trigger.api_name
            ),
        });
    }

    let cross: Vec<&str> = mutated
        .iter()
        .filter(|o| !o.eq_ignore_ascii_case(object))
        .map(String::as_str)
        .collect();
    if !cross.is_empty() {
        out.push(HandlerWarning {
            kind: HandlerWarningKind::CrossObjectMutation,
            trigger: trigger.api_name.clone(),
            class: Some(class.api_name.clone()),
            text: format!(
                "Handler {} (called from {}) also mutates {}; cross-object writes share governor limits and can fire automation on those objects.",
                class.api_name,
                trigger.api_name,
                join_limited(&cross, 3)
            ),
        });
    }
}
