use crate::core::{AutomationPreference, Pattern, Step};
use crate::recommend::{ObjectAnalysis, names};

pub const REGRESSION_STEP: &str = "Deactivate the replaced automation only after regression testing the consolidated logic in a sandbox, including bulk updates and deletes.";

/// Numbered step accumulator.
#[derive(Debug, Default)]
pub struct StepList {
    steps: Vec<Step>,
}

impl StepList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: impl Into<String>) {
        self.add(text.into(), false);
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.add(text.into(), true);
    }

    fn add(&mut self, text: String, warning: bool) {
        self.steps.push(Step {
            step: self.steps.len() + 1,
            text,
            warning,
        });
    }

    pub fn finish(mut self) -> Vec<Step> {
        self.push(REGRESSION_STEP);
        self.steps
    }
}

/// Sequence listing, then hazard and handler warnings, then the
/// pattern-specific consolidation instructions.
pub fn object_steps(a: &ObjectAnalysis<'_>, preference: AutomationPreference) -> Vec<Step> {
    let mut steps = StepList::new();
    // Listed for 2+ participating items, including items sharing one phase.
    if a.audit.participant_count() >= 2 {
        steps.push(a.audit.format_sequence());
    }
    for hazard in &a.audit.hazards {
        steps.warn(hazard.text.clone());
    }
    for warning in &a.handlers.warnings {
        steps.warn(warning.text.clone());
    }
    if !a.handlers.pairs.is_empty() {
        let pairs: Vec<String> = a.handlers.pairs.iter().map(|p| p.describe()).collect();
        steps.push(format!(
            "Reuse the existing handler delegation ({}) as the home for consolidated trigger logic.",
            pairs.join(", ")
        ));
    }
    consolidation_steps(a, preference, &mut steps);
    steps.finish()
}

fn consolidation_steps(a: &ObjectAnalysis<'_>, preference: AutomationPreference, steps: &mut StepList) {
    let c = &a.composition;
    let object = a.object;
    let flow_first = preference != AutomationPreference::ApexFirst;
    let inventory = |steps: &mut StepList| {
        steps.push(format!(
            "Inventory the fields written by legacy automation {} and give each field a single owner.",
            names(&c.legacy)
        ));
    };
    let merge_triggers = |steps: &mut StepList| {
        if c.triggers.len() >= 2 {
            steps.push(format!(
                "Merge triggers {} into a single dispatch trigger on {object} that delegates to one handler class and calls its methods in an explicit order.",
                names(&c.triggers)
            ));
        }
    };

    match a.pattern {
        Pattern::DeprecatedPlusMixed => {
            inventory(steps);
            if flow_first {
                steps.push(format!(
                    "Migrate {} into the record-triggered flows {} (before-save for same-record updates, after-save for related records).",
                    names(&c.legacy),
                    names(&c.flows)
                ));
            } else {
                steps.push(format!(
                    "Port {} and the logic of flows {} into the handler class behind {}.",
                    names(&c.legacy),
                    names(&c.flows),
                    names(&c.triggers)
                ));
            }
            merge_triggers(steps);
        }
        Pattern::DeprecatedPlusFlow => {
            inventory(steps);
            if flow_first {
                steps.push(format!(
                    "Rebuild the logic of {} inside {}: same-record field updates in a before-save flow, related-record updates after save.",
                    names(&c.legacy),
                    names(&c.flows)
                ));
            } else {
                steps.push(format!(
                    "Create one trigger on {object} with a handler class and port {} and {} into it.",
                    names(&c.legacy),
                    names(&c.flows)
                ));
            }
        }
        Pattern::DeprecatedPlusApex => {
            inventory(steps);
            if preference == AutomationPreference::FlowFirst {
                steps.push(format!(
                    "Move the field updates of {} into a before-save flow on {object} so they no longer re-fire {}.",
                    names(&c.legacy),
                    names(&c.triggers)
                ));
            } else {
                steps.push(format!(
                    "Port {} into the handler class of {} so the updates happen before the record is saved.",
                    names(&c.legacy),
                    names(&c.triggers)
                ));
            }
            merge_triggers(steps);
        }
        Pattern::DeprecatedOnly => {
            if flow_first {
                steps.push(format!(
                    "Run the platform migration tool on {} to generate equivalent record-triggered flows.",
                    names(&c.legacy)
                ));
                steps.push(format!(
                    "Combine the migrated flows into one before-save and one after-save flow on {object}."
                ));
            } else {
                steps.push(format!(
                    "Implement the logic of {} in a single trigger on {object} with a handler class.",
                    names(&c.legacy)
                ));
            }
        }
        Pattern::FlowAndApex => {
            steps.push(format!(
                "List the fields written by both flows {} and triggers {}, and give each field one owner.",
                names(&c.flows),
                names(&c.triggers)
            ));
            if flow_first {
                steps.push(format!(
                    "Move same-record field updates out of {} into a before-save flow; keep code-only logic in a handler.",
                    names(&c.triggers)
                ));
            } else {
                steps.push(format!(
                    "Move the logic of {} into the trigger handler and retire the flows.",
                    names(&c.flows)
                ));
            }
            merge_triggers(steps);
        }
        Pattern::ApexFragmented => {
            steps.push(format!(
                "Create a single dispatch trigger on {object} covering every event handled by {}.",
                names(&c.triggers)
            ));
            steps.push(
                "Move the body of each existing trigger into a handler method and call the methods from the dispatch trigger in an explicit order.",
            );
            if preference == AutomationPreference::FlowFirst {
                steps.push("Move plain same-record field updates from the handler into a before-save flow.");
            }
        }
        Pattern::FlowFragmented => {
            for (event, flows) in c.flow_event_collisions() {
                steps.push(format!(
                    "Flows {} all run on {event}: merge them into one flow with decision elements or set explicit trigger order values.",
                    names(&flows)
                ));
            }
        }
        Pattern::Clean
        | Pattern::LegacyMigration
        | Pattern::Undocumented
        | Pattern::InactiveCleanup => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AutomationItem;
    use crate::handlers::ClassIndex;
    use serde_json::json;

    #[test]
    fn warnings_precede_instructions_and_regression_step_is_last() {
        let items: Vec<AutomationItem> = serde_json::from_value(json!([
            {"id": "1", "kind": "legacy-rule", "apiName": "WFR1", "objectName": "Account", "isActive": true,
             "structuredMetadata": {"fieldUpdateFields": ["Status__c"]}},
            {"id": "2", "kind": "scripted-trigger", "apiName": "T1", "objectName": "Account", "isActive": true,
             "triggerEvents": ["after update"]}
        ]))
        .expect("items");
        let classes = ClassIndex::new(&items);
        let analysis = ObjectAnalysis::new("Account", items.iter().collect(), &classes);
        assert_eq!(analysis.pattern, Pattern::DeprecatedPlusApex);

        let steps = object_steps(&analysis, AutomationPreference::FlowFirst);
        assert!(steps[0].text.starts_with("Current execution order on save:"));
        assert!(steps[1].warning);
        assert!(steps[1].text.contains("Status__c"));
        let first_plain_after_warning = steps.iter().skip(2).position(|s| !s.warning).expect("instructions");
        assert!(steps[2..][first_plain_after_warning..].iter().all(|s| !s.warning));
        assert_eq!(steps.last().map(|s| s.text.as_str()), Some(REGRESSION_STEP));
    }

    #[test]
    fn flow_fragmented_steps_name_each_colliding_event() {
        let items: Vec<AutomationItem> = serde_json::from_value(json!([
            {"id": "1", "kind": "record-triggered-flow", "apiName": "F1", "objectName": "Case", "isActive": true,
             "triggerEvents": ["after save"]},
            {"id": "2", "kind": "record-triggered-flow", "apiName": "F2", "objectName": "Case", "isActive": true,
             "triggerEvents": ["after update"]}
        ]))
        .expect("items");
        let classes = ClassIndex::new(&items);
        let analysis = ObjectAnalysis::new("Case", items.iter().collect(), &classes);
        let steps = object_steps(&analysis, AutomationPreference::Balanced);
        assert!(steps.iter().any(|s| s.text.contains("F1, F2 all run on after save")));
    }
}
