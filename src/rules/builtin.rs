use std::collections::BTreeSet;

use serde_json::json;

use crate::core::{AutomationKind, CheckType, Condition, Operator, Rule, RuleLayer, Severity};

pub const ACTIVE_LEGACY_RULE: &str = "PLAT-001";
pub const ACTIVE_LEGACY_PROCESS: &str = "PLAT-002";
pub const MULTIPLE_TRIGGERS: &str = "PLAT-003";
pub const INLINE_TRIGGER_LOGIC: &str = "PLAT-004";
pub const MISSING_DESCRIPTION: &str = "QUAL-001";
pub const NAMING_CONVENTION: &str = "QUAL-002";
pub const HARDCODED_IDS: &str = "QUAL-003";
pub const LOOP_QUERIES: &str = "RISK-001";
pub const FIELD_WRITE_OVERLAP: &str = "RISK-002";
pub const FLOW_EVENT_COLLISION: &str = "RISK-003";
pub const LEGACY_RETRIGGER: &str = "RISK-004";
pub const INACTIVE_AUTOMATION: &str = "HOUSE-001";

struct RuleRow {
    id: &'static str,
    name: &'static str,
    layer: RuleLayer,
    severity: Severity,
    check_type: CheckType,
    applies_to: &'static [AutomationKind],
    message: &'static str,
}

const SCRIPTED: &[AutomationKind] = &[AutomationKind::ScriptedTrigger, AutomationKind::ScriptedClass];

pub fn builtin_rules() -> Vec<Rule> {
    let table: Vec<(RuleRow, Vec<Condition>)> = vec![
        (
            RuleRow {
                id: ACTIVE_LEGACY_RULE,
                name: "Active legacy rule",
                layer: RuleLayer::Platform,
                severity: Severity::Warning,
                check_type: CheckType::PerItem,
                applies_to: &[AutomationKind::LegacyRule],
                message: "{{apiName}} on {{objectName}} is an active legacy rule; the technology is deprecated and should be migrated to a record-triggered flow.",
            },
            vec![Condition::new("isActive", Operator::Eq, json!(true))],
        ),
        (
            RuleRow {
                id: ACTIVE_LEGACY_PROCESS,
                name: "Active legacy process",
                layer: RuleLayer::Platform,
                severity: Severity::Warning,
                check_type: CheckType::PerItem,
                applies_to: &[AutomationKind::LegacyBranchingProcess],
                message: "{{apiName}} on {{objectName}} is an active legacy process; the technology is deprecated and should be migrated to a record-triggered flow.",
            },
            vec![Condition::new("isActive", Operator::Eq, json!(true))],
        ),
        (
            RuleRow {
                id: MULTIPLE_TRIGGERS,
                name: "Multiple triggers on one object",
                layer: RuleLayer::Platform,
                severity: Severity::Error,
                check_type: CheckType::CrossItem,
                applies_to: &[AutomationKind::ScriptedTrigger],
                message: "{{detail}}",
            },
            vec![],
        ),
        (
            RuleRow {
                id: INLINE_TRIGGER_LOGIC,
                name: "Logic in trigger body",
                layer: RuleLayer::Platform,
                severity: Severity::Warning,
                check_type: CheckType::PerItem,
                applies_to: &[AutomationKind::ScriptedTrigger],
                message: "{{apiName}} queries or changes data inline instead of delegating to a handler class.",
            },
            vec![],
        ),
        (
            RuleRow {
                id: MISSING_DESCRIPTION,
                name: "Missing description",
                layer: RuleLayer::Quality,
                severity: Severity::Info,
                check_type: CheckType::PerItem,
                applies_to: &[],
                message: "{{apiName}} ({{kind}}) has no description.",
            },
            vec![
                Condition::new("hasDescription", Operator::Eq, json!(false)),
                Condition::new("isManagedPackage", Operator::Eq, json!(false)),
                Condition::new("isActive", Operator::Eq, json!(true)),
            ],
        ),
        (
            RuleRow {
                id: NAMING_CONVENTION,
                name: "Naming convention",
                layer: RuleLayer::Quality,
                severity: Severity::Info,
                check_type: CheckType::PerItem,
                applies_to: &[],
                message: "{{apiName}} does not follow the configured naming convention.",
            },
            vec![],
        ),
        (
            RuleRow {
                id: HARDCODED_IDS,
                name: "Hardcoded record ids",
                layer: RuleLayer::Quality,
                severity: Severity::Warning,
                check_type: CheckType::PerItem,
                applies_to: &[
                    AutomationKind::ScriptedTrigger,
                    AutomationKind::ScriptedClass,
                    AutomationKind::RecordTriggeredFlow,
                    AutomationKind::AutolaunchedFlow,
                    AutomationKind::ScreenFlow,
                ],
                message: "{{apiName}} references hardcoded record ids, which break between environments.",
            },
            vec![Condition::new("hasHardcodedIds", Operator::Eq, json!(true))],
        ),
        (
            RuleRow {
                id: LOOP_QUERIES,
                name: "Query or data change inside a loop",
                layer: RuleLayer::Risk,
                severity: Severity::Error,
                check_type: CheckType::PerItem,
                applies_to: SCRIPTED,
                message: "{{apiName}} runs queries or data changes inside a loop and will hit governor limits on bulk saves.",
            },
            vec![],
        ),
        (
            RuleRow {
                id: FIELD_WRITE_OVERLAP,
                name: "Field written by multiple automations",
                layer: RuleLayer::Risk,
                severity: Severity::Warning,
                check_type: CheckType::CrossItem,
                applies_to: &[],
                message: "{{detail}}",
            },
            vec![],
        ),
        (
            RuleRow {
                id: FLOW_EVENT_COLLISION,
                name: "Flows sharing a trigger event",
                layer: RuleLayer::Risk,
                severity: Severity::Warning,
                check_type: CheckType::CrossItem,
                applies_to: &[AutomationKind::RecordTriggeredFlow],
                message: "{{detail}}",
            },
            vec![],
        ),
        (
            RuleRow {
                id: LEGACY_RETRIGGER,
                name: "Legacy field update re-fires triggers",
                layer: RuleLayer::Risk,
                severity: Severity::Error,
                check_type: CheckType::CrossItem,
                applies_to: &[AutomationKind::LegacyRule],
                message: "{{detail}}",
            },
            vec![],
        ),
        (
            RuleRow {
                id: INACTIVE_AUTOMATION,
                name: "Inactive automation",
                layer: RuleLayer::Housekeeping,
                severity: Severity::Info,
                check_type: CheckType::PerItem,
                applies_to: &[],
                message: "{{apiName}} ({{kind}}) is inactive; remove it once it is confirmed unused.",
            },
            vec![
                Condition::new("isActive", Operator::Eq, json!(false)),
                Condition::new("isManagedPackage", Operator::Eq, json!(false)),
            ],
        ),
    ];

    table
        .into_iter()
        .enumerate()
        .map(|(i, (row, conditions))| Rule {
            id: row.id.to_string(),
            name: row.name.to_string(),
            layer: row.layer,
            severity: row.severity,
            check_type: row.check_type,
            applies_to: row.applies_to.iter().copied().collect::<BTreeSet<_>>(),
            conditions,
            message: row.message.to_string(),
            is_builtin: true,
            is_active: true,
            sort_order: (i as u32 + 1) * 10,
        })
        .collect()
}

pub fn is_builtin_id(id: &str) -> bool {
    builtin_rules().iter().any(|r| r.id == id)
}
