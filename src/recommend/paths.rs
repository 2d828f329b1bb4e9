use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::core::{AutomationPreference, Pattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathPair {
    pub recommended: &'static str,
    pub alternative: &'static str,
}

use AutomationPreference::{ApexFirst, Balanced, FlowFirst};

const PATH_TABLE: [(Pattern, AutomationPreference, PathPair); 24] = [
    (
        Pattern::DeprecatedPlusMixed,
        FlowFirst,
        PathPair {
            recommended: "Migrate every legacy rule and process into record-triggered flows (one before-save flow for same-record updates, one after-save flow for related records), then move trigger logic that flows can express into those flows. Keep one handler-based trigger only for logic that needs code.",
            alternative: "Consolidate legacy and flow logic into the trigger handler so a single trigger is the only entry point for the object.",
        },
    ),
    (
        Pattern::DeprecatedPlusMixed,
        ApexFirst,
        PathPair {
            recommended: "Port legacy rules, processes and flow logic into one trigger that delegates to a handler class, then retire the declarative automation once parity is tested.",
            alternative: "Migrate legacy automation into record-triggered flows and keep the trigger for complex logic, with explicit flow trigger order values.",
        },
    ),
    (
        Pattern::DeprecatedPlusMixed,
        Balanced,
        PathPair {
            recommended: "Migrate legacy automation to record-triggered flows for simple field updates and route complex or cross-object logic through one handler-based trigger. Document which technology owns each field.",
            alternative: "Choose a single technology for the object and consolidate everything into it.",
        },
    ),
    (
        Pattern::DeprecatedPlusFlow,
        FlowFirst,
        PathPair {
            recommended: "Fold legacy rule and process logic into the existing record-triggered flows: before-save for same-record field updates, after-save for related records.",
            alternative: "Rebuild the legacy logic as new flows with explicit trigger order values, then merge them once stable.",
        },
    ),
    (
        Pattern::DeprecatedPlusFlow,
        ApexFirst,
        PathPair {
            recommended: "Move legacy and flow logic into one trigger with a handler class, then deactivate the declarative automation.",
            alternative: "Fold legacy logic into the existing flows first and schedule the trigger migration separately.",
        },
    ),
    (
        Pattern::DeprecatedPlusFlow,
        Balanced,
        PathPair {
            recommended: "Fold legacy logic into the existing flows, keeping before-save flows for same-record updates.",
            alternative: "Move the combined logic into a handler-based trigger if the flows become hard to maintain.",
        },
    ),
    (
        Pattern::DeprecatedPlusApex,
        FlowFirst,
        PathPair {
            recommended: "Migrate legacy field updates to a before-save record-triggered flow and move trigger logic that flows can express into flows. Keep the trigger only for logic that needs code.",
            alternative: "Move legacy logic into the existing trigger's handler class so one code path owns the object.",
        },
    ),
    (
        Pattern::DeprecatedPlusApex,
        ApexFirst,
        PathPair {
            recommended: "Move legacy rule and process logic into the existing trigger's handler class and retire the legacy automation.",
            alternative: "Migrate legacy field updates to a before-save flow and leave the trigger unchanged.",
        },
    ),
    (
        Pattern::DeprecatedPlusApex,
        Balanced,
        PathPair {
            recommended: "Move legacy logic that touches the trigger's fields into its handler class and migrate the remaining field updates to a before-save flow.",
            alternative: "Consolidate all legacy logic into the trigger handler.",
        },
    ),
    (
        Pattern::DeprecatedOnly,
        FlowFirst,
        PathPair {
            recommended: "Migrate each legacy rule and process to record-triggered flows, combining them into one before-save and one after-save flow.",
            alternative: "Migrate one-to-one first, then merge flows that share an event.",
        },
    ),
    (
        Pattern::DeprecatedOnly,
        ApexFirst,
        PathPair {
            recommended: "Replace the legacy automation with a single trigger and handler class.",
            alternative: "Migrate to record-triggered flows where the logic is plain field updates.",
        },
    ),
    (
        Pattern::DeprecatedOnly,
        Balanced,
        PathPair {
            recommended: "Migrate to record-triggered flows (one before-save, one after-save) and move logic that needs code into a handler-based trigger.",
            alternative: "Migrate one-to-one to flows and consolidate later.",
        },
    ),
    (
        Pattern::FlowAndApex,
        FlowFirst,
        PathPair {
            recommended: "Move trigger logic that flows can express into the existing flows and reduce the trigger to code-only concerns behind a handler.",
            alternative: "Keep both technologies but set explicit flow trigger order values and document which one owns each field.",
        },
    ),
    (
        Pattern::FlowAndApex,
        ApexFirst,
        PathPair {
            recommended: "Move flow logic into the trigger handler and deactivate the flows.",
            alternative: "Keep flows for same-record field updates only and move everything else into the handler.",
        },
    ),
    (
        Pattern::FlowAndApex,
        Balanced,
        PathPair {
            recommended: "Split ownership: before-save flows for same-record field updates, a handler-based trigger for cross-object and complex logic. Remove overlapping writes.",
            alternative: "Consolidate into whichever technology already owns most of the logic.",
        },
    ),
    (
        Pattern::ApexFragmented,
        FlowFirst,
        PathPair {
            recommended: "Merge the triggers into a single dispatch trigger that delegates to a handler class, then move simple field updates to a before-save flow.",
            alternative: "Migrate the simplest trigger logic to flows first to reduce the number of triggers.",
        },
    ),
    (
        Pattern::ApexFragmented,
        ApexFirst,
        PathPair {
            recommended: "Merge all triggers into a single dispatch trigger that delegates to one handler class with explicitly ordered methods.",
            alternative: "Adopt a trigger framework with ordering metadata so each handler runs in a declared sequence.",
        },
    ),
    (
        Pattern::ApexFragmented,
        Balanced,
        PathPair {
            recommended: "Merge the triggers into a single dispatch trigger with a handler class; move straightforward field updates to a before-save flow.",
            alternative: "Merge all triggers into a single dispatch trigger and keep every piece of logic in code.",
        },
    ),
    (
        Pattern::FlowFragmented,
        FlowFirst,
        PathPair {
            recommended: "Merge flows that share an event into one flow per event using decision elements, or set explicit trigger order values on each.",
            alternative: "Keep the flows separate but assign explicit trigger order values and document the order.",
        },
    ),
    (
        Pattern::FlowFragmented,
        ApexFirst,
        PathPair {
            recommended: "Consolidate the colliding flows into a handler-based trigger with deterministic ordering.",
            alternative: "Merge flows per event and set explicit trigger order values.",
        },
    ),
    (
        Pattern::FlowFragmented,
        Balanced,
        PathPair {
            recommended: "Set explicit trigger order values now, then merge flows per event.",
            alternative: "Move the overlapping logic into a handler-based trigger.",
        },
    ),
    (
        Pattern::LegacyMigration,
        FlowFirst,
        PathPair {
            recommended: "Migrate active legacy rules and processes to record-triggered flows before the platform retires them.",
            alternative: "Rebuild the legacy logic in a handler-based trigger.",
        },
    ),
    (
        Pattern::LegacyMigration,
        ApexFirst,
        PathPair {
            recommended: "Rebuild active legacy logic in a handler-based trigger.",
            alternative: "Migrate to record-triggered flows with the platform migration tool.",
        },
    ),
    (
        Pattern::LegacyMigration,
        Balanced,
        PathPair {
            recommended: "Migrate to record-triggered flows and route complex branching logic to a handler-based trigger.",
            alternative: "Rebuild all legacy logic in a handler-based trigger.",
        },
    ),
];

static PATHS: LazyLock<BTreeMap<(Pattern, AutomationPreference), PathPair>> =
    LazyLock::new(|| {
        PATH_TABLE
            .iter()
            .map(|(pattern, pref, pair)| ((*pattern, *pref), *pair))
            .collect()
    });

/// Directional guidance for a pattern. `None` for patterns without a
/// direction (`clean`, org-level housekeeping).
pub fn paths_for(pattern: Pattern, preference: AutomationPreference) -> Option<PathPair> {
    PATHS.get(&(pattern, preference)).copied()
}

const HOUSEKEEPING_UNDOCUMENTED: PathPair = PathPair {
    recommended: "Add a description to each active automation stating its purpose, owner and the fields it writes.",
    alternative: "Document the automation in an external inventory linked from each item.",
};

const HOUSEKEEPING_INACTIVE: PathPair = PathPair {
    recommended: "Delete inactive automation that has no planned reuse after confirming nothing references it.",
    alternative: "Archive the definitions in source control, then delete them from the org.",
};

/// Paths for org-level housekeeping patterns, which do not vary by preference.
pub fn housekeeping_paths(pattern: Pattern) -> Option<PathPair> {
    match pattern {
        Pattern::Undocumented => Some(HOUSEKEEPING_UNDOCUMENTED),
        Pattern::InactiveCleanup => Some(HOUSEKEEPING_INACTIVE),
        _ => None,
    }
}
