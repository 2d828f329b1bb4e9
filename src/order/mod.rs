//! Static model of the platform's save-order lifecycle.
//!
//! Active items on one object are expanded into `(item, phase)` entries, sorted
//! by phase and API name, and inspected for ordering and re-save hazards. Nothing
//! is executed; re-entry caused by legacy field updates is flagged, not simulated.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::core::{AutomationItem, AutomationKind, join_limited};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    BeforeSaveFlow,
    BeforeTrigger,
    AfterTrigger,
    LegacyFieldUpdate,
    LegacyProcess,
    AfterSaveFlow,
}

impl Phase {
    pub const fn number(self) -> u8 {
        match self {
            Phase::BeforeSaveFlow => 1,
            Phase::BeforeTrigger => 2,
            Phase::AfterTrigger => 3,
            Phase::LegacyFieldUpdate => 4,
            Phase::LegacyProcess => 5,
            Phase::AfterSaveFlow => 6,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Phase::BeforeSaveFlow => "before-save flow",
            Phase::BeforeTrigger => "before trigger",
            Phase::AfterTrigger => "after trigger",
            Phase::LegacyFieldUpdate => "legacy field update",
            Phase::LegacyProcess => "legacy process",
            Phase::AfterSaveFlow => "after-save flow",
        }
    }

    pub const fn is_scripted(self) -> bool {
        matches!(self, Phase::BeforeTrigger | Phase::AfterTrigger)
    }

    pub fn for_item(item: &AutomationItem) -> Vec<Phase> {
        let before = item.has_before_event();
        let after = item.has_after_event();
        match item.kind {
            AutomationKind::RecordTriggeredFlow => {
                let mut phases = Vec::new();
                if before {
                    phases.push(Phase::BeforeSaveFlow);
                }
                if after || !before {
                    phases.push(Phase::AfterSaveFlow);
                }
                phases
            }
            AutomationKind::ScriptedTrigger => {
                let mut phases = Vec::new();
                if before || !after {
                    phases.push(Phase::BeforeTrigger);
                }
                if after {
                    phases.push(Phase::AfterTrigger);
                }
                phases
            }
            AutomationKind::LegacyRule => vec![Phase::LegacyFieldUpdate],
            AutomationKind::LegacyBranchingProcess => vec![Phase::LegacyProcess],
            AutomationKind::AutolaunchedFlow
            | AutomationKind::ScreenFlow
            | AutomationKind::ScriptedClass => Vec::new(),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase {}: {}", self.number(), self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceEntry {
    pub name: String,
    pub kind: AutomationKind,
    pub phase: u8,
    pub phase_label: String,
    #[serde(skip)]
    pub item_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardType {
    UndefinedOrder,
    FlowOrdering,
    RetriggerCascade,
    ProcessRetrigger,
    FieldConflict,
}

impl HazardType {
    pub const fn label(self) -> &'static str {
        match self {
            HazardType::UndefinedOrder => "undefined order",
            HazardType::FlowOrdering => "flow ordering fragility",
            HazardType::RetriggerCascade => "re-trigger cascade",
            HazardType::ProcessRetrigger => "process re-trigger",
            HazardType::FieldConflict => "field write conflict",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardLevel {
    Warning,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldWriter {
    pub name: String,
    pub phase: u8,
    pub phase_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldConflict {
    pub field: String,
    pub writers: Vec<FieldWriter>,
    pub winner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hazard {
    #[serde(rename = "type")]
    pub hazard_type: HazardType,
    pub severity: HazardLevel,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<FieldConflict>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderAudit {
    pub sequence: Vec<SequenceEntry>,
    pub hazards: Vec<Hazard>,
}

impl OrderAudit {
    /// Distinct items that occupy at least one phase.
    pub fn participant_count(&self) -> usize {
        self.sequence
            .iter()
            .map(|e| e.item_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn distinct_phases(&self) -> usize {
        self.sequence
            .iter()
            .map(|e| e.phase)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// 1-indexed listing of the computed order.
    pub fn format_sequence(&self) -> String {
        let mut out = String::from("Current execution order on save:");
        for (i, entry) in self.sequence.iter().enumerate() {
            out.push_str(&format!(
                "\n{}. [phase {}: {}] {} ({})",
                i + 1,
                entry.phase,
                entry.phase_label,
                entry.name,
                entry.kind
            ));
        }
        out
    }
}

/// Computes the ordered phase sequence and hazard list for the active items
/// of one object. Inactive items are ignored.
pub fn audit_order_of_execution<'a, I>(items: I) -> OrderAudit
where
    I: IntoIterator<Item = &'a AutomationItem>,
{
    let mut entries: Vec<(Phase, &AutomationItem)> = Vec::new();
    for item in items.into_iter().filter(|i| i.is_active) {
        for phase in Phase::for_item(item) {
            entries.push((phase, item));
        }
    }
    entries.sort_by(|(pa, a), (pb, b)| {
        pa.cmp(pb)
            .then_with(|| a.api_name.cmp(&b.api_name))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut groups: BTreeMap<Phase, Vec<&AutomationItem>> = BTreeMap::new();
    for (phase, item) in &entries {
        groups.entry(*phase).or_default().push(item);
    }

    let mut hazards = Vec::new();
    undefined_order(&groups, &mut hazards);
    flow_ordering(&groups, &mut hazards);
    legacy_retrigger(&groups, &mut hazards);
    process_retrigger(&groups, &mut hazards);
    field_conflicts(&entries, &mut hazards);

    let sequence = entries
        .iter()
        .map(|(phase, item)| SequenceEntry {
            name: item.api_name.clone(),
            kind: item.kind,
            phase: phase.number(),
            phase_label: phase.label().to_string(),
            item_id: item.id.clone(),
        })
        .collect();

    OrderAudit { sequence, hazards }
}

fn names_in(group: Option<&Vec<&AutomationItem>>) -> Vec<String> {
    group
        .map(|g| g.iter().map(|i| i.api_name.clone()).collect())
        .unwrap_or_default()
}

fn undefined_order(groups: &BTreeMap<Phase, Vec<&AutomationItem>>, hazards: &mut Vec<Hazard>) {
    for phase in [Phase::BeforeTrigger, Phase::AfterTrigger] {
        let names = names_in(groups.get(&phase));
        if names.len() < 2 {
            continue;
        }
        hazards.push(Hazard {
            hazard_type: HazardType::UndefinedOrder,
            severity: HazardLevel::High,
            text: format!(
                "Undefined order: triggers {} all run in {phase}; the platform does not guarantee which runs first.",
                names.join(", ")
            ),
            items: names,
            conflict: None,
        });
    }
}

fn flow_ordering(groups: &BTreeMap<Phase, Vec<&AutomationItem>>, hazards: &mut Vec<Hazard>) {
    for phase in [Phase::BeforeSaveFlow, Phase::AfterSaveFlow] {
        let names = names_in(groups.get(&phase));
        if names.len() < 2 {
            continue;
        }
        hazards.push(Hazard {
            hazard_type: HazardType::FlowOrdering,
            severity: HazardLevel::Warning,
            text: format!(
                "Flow ordering: {} flows share {phase}; without explicit trigger order values they fire alphabetically: {}.",
                names.len(),
                names.join(" → ")
            ),
            items: names,
            conflict: None,
        });
    }
}

fn scripted_names(groups: &BTreeMap<Phase, Vec<&AutomationItem>>) -> Vec<String> {
    [Phase::BeforeTrigger, Phase::AfterTrigger]
        .iter()
        .filter_map(|p| groups.get(p))
        .flatten()
        .map(|i| i.api_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn written_fields(writers: &[&AutomationItem]) -> Vec<String> {
    writers
        .iter()
        .flat_map(|w| w.meta().field_update_fields.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn legacy_retrigger(groups: &BTreeMap<Phase, Vec<&AutomationItem>>, hazards: &mut Vec<Hazard>) {
    let refired = scripted_names(groups);
    if refired.is_empty() {
        return;
    }
    let writers: Vec<&AutomationItem> = groups
        .get(&Phase::LegacyFieldUpdate)
        .into_iter()
        .flatten()
        .copied()
        .filter(|i| !i.meta().field_update_fields.is_empty())
        .collect();
    if writers.is_empty() {
        return;
    }
    let writer_names: Vec<String> = writers.iter().map(|w| w.api_name.clone()).collect();
    let fields = written_fields(&writers);
    hazards.push(Hazard {
        hazard_type: HazardType::RetriggerCascade,
        severity: HazardLevel::High,
        text: format!(
            "Re-trigger cascade: legacy field update {} writes {}, which re-saves the record and re-runs phases 1-3, firing triggers {} a second time.",
            writer_names.join(", "),
            join_limited(&fields, 3),
            refired.join(", ")
        ),
        items: writer_names.into_iter().chain(refired).collect(),
        conflict: None,
    });
}

fn process_retrigger(groups: &BTreeMap<Phase, Vec<&AutomationItem>>, hazards: &mut Vec<Hazard>) {
    let refired = scripted_names(groups);
    let Some(processes) = groups.get(&Phase::LegacyProcess) else {
        return;
    };
    if refired.is_empty() || processes.is_empty() {
        return;
    }
    let writers: Vec<&AutomationItem> = processes
        .iter()
        .copied()
        .filter(|i| !i.meta().field_update_fields.is_empty())
        .collect();

    if writers.is_empty() {
        let names: Vec<String> = processes.iter().map(|p| p.api_name.clone()).collect();
        hazards.push(Hazard {
            hazard_type: HazardType::ProcessRetrigger,
            severity: HazardLevel::Warning,
            text: format!(
                "Process re-trigger: legacy process {} runs after triggers {}; any record update it makes re-fires them (field-level detail unavailable).",
                names.join(", "),
                refired.join(", ")
            ),
            items: names.into_iter().chain(refired).collect(),
            conflict: None,
        });
        return;
    }

    let writer_names: Vec<String> = writers.iter().map(|w| w.api_name.clone()).collect();
    let fields = written_fields(&writers);
    hazards.push(Hazard {
        hazard_type: HazardType::ProcessRetrigger,
        severity: HazardLevel::High,
        text: format!(
            "Process re-trigger: legacy process {} updates {}, which re-saves the record and fires triggers {} a second time.",
            writer_names.join(", "),
            join_limited(&fields, 3),
            refired.join(", ")
        ),
        items: writer_names.into_iter().chain(refired).collect(),
        conflict: None,
    });
}

fn field_conflicts(entries: &[(Phase, &AutomationItem)], hazards: &mut Vec<Hazard>) {
    // field -> item id -> (latest phase, item)
    let mut writers: BTreeMap<&str, BTreeMap<&str, (Phase, &AutomationItem)>> = BTreeMap::new();
    for (phase, item) in entries {
        for field in &item.meta().field_update_fields {
            let slot = writers
                .entry(field.as_str())
                .or_default()
                .entry(item.id.as_str())
                .or_insert((*phase, item));
            if *phase > slot.0 {
                slot.0 = *phase;
            }
        }
    }

    for (field, by_item) in writers {
        if by_item.len() < 2 {
            continue;
        }
        let mut list: Vec<(Phase, &AutomationItem)> = by_item.into_values().collect();
        list.sort_by(|(pa, a), (pb, b)| pa.cmp(pb).then_with(|| a.api_name.cmp(&b.api_name)));
        let Some(&(winner_phase, winner)) = list.last() else {
            continue;
        };
        let tied = list
            .iter()
            .filter(|(p, _)| *p == winner_phase)
            .count()
            > 1;

        let annotated: Vec<String> = list
            .iter()
            .map(|(p, i)| format!("{} [{p}]", i.api_name))
            .collect();
        let mut text = format!(
            "Field conflict on {field}: written by {}; {} runs in the latest phase, so its write wins.",
            annotated.join(", "),
            winner.api_name
        );
        if tied && winner_phase.is_scripted() {
            text.push_str(&format!(
                " Order within {winner_phase} is undefined, so the effective value is not deterministic."
            ));
        }
        hazards.push(Hazard {
            hazard_type: HazardType::FieldConflict,
            severity: HazardLevel::Warning,
            text,
            items: list.iter().map(|(_, i)| i.api_name.clone()).collect(),
            conflict: Some(FieldConflict {
                field: field.to_string(),
                writers: list
                    .iter()
                    .map(|(p, i)| FieldWriter {
                        name: i.api_name.clone(),
                        phase: p.number(),
                        phase_label: p.label().to_string(),
                    })
                    .collect(),
                winner: winner.api_name.clone(),
            }),
        });
    }
}
