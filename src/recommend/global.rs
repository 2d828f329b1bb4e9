use std::collections::{BTreeMap, BTreeSet};

use crate::core::{
    AutomationItem, AutomationKind, AutomationPreference, Pattern, Recommendation,
    RecommendationStatus, Severity, group_active_by_object, join_limited,
};
use crate::recommend::paths::{housekeeping_paths, paths_for};
use crate::recommend::scoring::{effort_for, priority_score};
use crate::recommend::steps::StepList;
use crate::recommend::{SeverityIndex, names, worst_severity};

/// Minimum item count before an org-level housekeeping recommendation is raised.
pub const HOUSEKEEPING_THRESHOLD: usize = 3;

const ORG: &str = "org";

/// Id suffix for legacy items bound to no object. `@` never appears in an
/// object API name.
const NO_OBJECT_ID: &str = "@no-object";

pub fn global_recommendations(
    items: &[AutomationItem],
    index: &SeverityIndex<'_>,
    preference: AutomationPreference,
) -> Vec<Recommendation> {
    let mut out = Vec::new();
    out.extend(undocumented(items));
    out.extend(inactive_cleanup(items));
    out.extend(legacy_migration(items, index, preference));
    out
}

fn housekeeping(
    pattern: Pattern,
    matched: Vec<&AutomationItem>,
    title: String,
    rationale: String,
    steps: StepList,
) -> Option<Recommendation> {
    let paths = housekeeping_paths(pattern)?;
    let affected: BTreeSet<String> = matched.iter().map(|i| i.id.clone()).collect();
    let effort = effort_for(pattern, affected.len());
    Some(Recommendation {
        id: format!("{pattern}:{ORG}"),
        object_name: None,
        pattern,
        title,
        rationale,
        steps: steps.finish(),
        recommended_path: paths.recommended.to_string(),
        alternative_path: paths.alternative.to_string(),
        severity: Severity::Info,
        effort_estimate: effort,
        priority_score: priority_score(Severity::Info, affected.len(), effort),
        affected_item_ids: affected,
        status: RecommendationStatus::Open,
    })
}

fn sorted_by_name(mut items: Vec<&AutomationItem>) -> Vec<&AutomationItem> {
    items.sort_by(|a, b| a.api_name.cmp(&b.api_name).then_with(|| a.id.cmp(&b.id)));
    items
}

fn undocumented(items: &[AutomationItem]) -> Option<Recommendation> {
    let matched = sorted_by_name(
        items
            .iter()
            .filter(|i| i.is_active && !i.is_managed_package && !i.has_description)
            .collect(),
    );
    if matched.len() < HOUSEKEEPING_THRESHOLD {
        return None;
    }
    let mut steps = StepList::new();
    steps.push(format!("Add a description to {}.", names(&matched)));
    steps.push("Record in each description the fields the automation writes and the team that owns it.");
    housekeeping(
        Pattern::Undocumented,
        matched.clone(),
        format!("Document {} active automation item(s) without a description", matched.len()),
        format!(
            "{} active, non-managed automation item(s) have no description, which slows every consolidation review: {}.",
            matched.len(),
            names(&matched)
        ),
        steps,
    )
}

fn inactive_cleanup(items: &[AutomationItem]) -> Option<Recommendation> {
    let matched = sorted_by_name(
        items
            .iter()
            .filter(|i| !i.is_active && !i.is_managed_package)
            .collect(),
    );
    if matched.len() < HOUSEKEEPING_THRESHOLD {
        return None;
    }
    let mut steps = StepList::new();
    steps.push(format!(
        "Confirm that nothing references the inactive items {}.",
        names(&matched)
    ));
    steps.push("Export their definitions to source control before deleting them.");
    housekeeping(
        Pattern::InactiveCleanup,
        matched.clone(),
        format!("Remove {} inactive automation item(s)", matched.len()),
        format!(
            "{} inactive, non-managed automation item(s) remain in the org and clutter every audit: {}.",
            matched.len(),
            names(&matched)
        ),
        steps,
    )
}

/// Preferred consolidation target for legacy items on one object.
fn migration_target<'a>(
    others: &[&'a AutomationItem],
    preference: AutomationPreference,
) -> Option<&'a AutomationItem> {
    let first_of = |kind: AutomationKind| {
        others
            .iter()
            .copied()
            .filter(|i| i.kind == kind)
            .min_by(|a, b| a.api_name.cmp(&b.api_name))
    };
    let flow = first_of(AutomationKind::RecordTriggeredFlow);
    let trigger = first_of(AutomationKind::ScriptedTrigger);
    match preference {
        AutomationPreference::ApexFirst => trigger.or(flow),
        AutomationPreference::FlowFirst | AutomationPreference::Balanced => flow.or(trigger),
    }
}

fn legacy_migration(
    items: &[AutomationItem],
    index: &SeverityIndex<'_>,
    preference: AutomationPreference,
) -> Vec<Recommendation> {
    let mut groups: BTreeMap<Option<&str>, (Vec<&AutomationItem>, Vec<&AutomationItem>)> =
        BTreeMap::new();
    for (object, members) in group_active_by_object(items) {
        let (legacy, others): (Vec<&AutomationItem>, Vec<&AutomationItem>) =
            members.into_iter().partition(|i| i.kind.is_legacy());
        if !legacy.is_empty() {
            groups.insert(Some(object), (legacy, others));
        }
    }
    let unbound: Vec<&AutomationItem> = items
        .iter()
        .filter(|i| i.is_active && i.kind.is_legacy() && i.object_name.is_none())
        .collect();
    if !unbound.is_empty() {
        groups.insert(None, (unbound, Vec::new()));
    }

    let mut out = Vec::new();
    for (object, (legacy, others)) in groups {
        let legacy = sorted_by_name(legacy);
        let Some(paths) = paths_for(Pattern::LegacyMigration, preference) else {
            continue;
        };
        let target = migration_target(&others, preference);
        let scope = match object {
            Some(object) => format!("on {object}"),
            None => "with no object".to_string(),
        };

        let target_sentence = match target {
            Some(t) if t.kind == AutomationKind::RecordTriggeredFlow => format!(
                " Consolidate into the existing flow {} rather than creating a new one.",
                t.api_name
            ),
            Some(t) => format!(
                " Consolidate into the existing trigger {} and its handler rather than adding automation.",
                t.api_name
            ),
            None => match object {
                Some(object) => format!(
                    " No modern automation exists on {object} yet; create a single before-save flow for same-record updates."
                ),
                None => String::new(),
            },
        };

        let severity = worst_severity(legacy.iter().copied(), index)
            .unwrap_or(Severity::Warning)
            .max(Severity::Warning);
        let affected: BTreeSet<String> = legacy.iter().map(|i| i.id.clone()).collect();
        let effort = effort_for(Pattern::LegacyMigration, affected.len());

        let mut steps = StepList::new();
        for item in &legacy {
            let fields: Vec<&str> = item
                .meta()
                .field_update_fields
                .iter()
                .map(String::as_str)
                .collect();
            if fields.is_empty() {
                steps.push(format!("Migrate {} ({}).", item.api_name, item.kind.label()));
            } else {
                steps.push(format!(
                    "Migrate {} ({}), which writes {}.",
                    item.api_name,
                    item.kind.label(),
                    join_limited(&fields, 3)
                ));
            }
        }
        if let Some(t) = target {
            steps.push(format!("Fold the migrated logic into {}.", t.api_name));
        }

        let kinds: BTreeSet<&str> = legacy.iter().map(|i| i.kind.label()).collect();
        let mut rationale = format!(
            "{} active {} {scope} use deprecated technology the platform is retiring: {}.",
            legacy.len(),
            kinds.into_iter().collect::<Vec<_>>().join(" and "),
            names(&legacy)
        );
        match target {
            Some(t) => rationale.push_str(&format!(
                " {} ({}) already runs {scope} and is the natural consolidation target.",
                t.api_name,
                t.kind.label()
            )),
            None => rationale.push_str(" No modern automation exists to absorb the logic."),
        }

        out.push(Recommendation {
            id: format!("{}:{}", Pattern::LegacyMigration, object.unwrap_or(NO_OBJECT_ID)),
            object_name: object.map(str::to_string),
            pattern: Pattern::LegacyMigration,
            title: format!("Migrate {} legacy automation item(s) {scope}", legacy.len()),
            rationale,
            steps: steps.finish(),
            recommended_path: format!("{}{target_sentence}", paths.recommended),
            alternative_path: paths.alternative.to_string(),
            severity,
            effort_estimate: effort,
            priority_score: priority_score(severity, affected.len(), effort),
            affected_item_ids: affected,
            status: RecommendationStatus::Open,
        });
    }
    out
}
