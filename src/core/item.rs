use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutomationKind {
    LegacyRule,
    LegacyBranchingProcess,
    RecordTriggeredFlow,
    AutolaunchedFlow,
    ScreenFlow,
    ScriptedTrigger,
    ScriptedClass,
}

impl AutomationKind {
    pub const ALL: [AutomationKind; 7] = [
        AutomationKind::LegacyRule,
        AutomationKind::LegacyBranchingProcess,
        AutomationKind::RecordTriggeredFlow,
        AutomationKind::AutolaunchedFlow,
        AutomationKind::ScreenFlow,
        AutomationKind::ScriptedTrigger,
        AutomationKind::ScriptedClass,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            AutomationKind::LegacyRule => "legacy-rule",
            AutomationKind::LegacyBranchingProcess => "legacy-branching-process",
            AutomationKind::RecordTriggeredFlow => "record-triggered-flow",
            AutomationKind::AutolaunchedFlow => "autolaunched-flow",
            AutomationKind::ScreenFlow => "screen-flow",
            AutomationKind::ScriptedTrigger => "scripted-trigger",
            AutomationKind::ScriptedClass => "scripted-class",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            AutomationKind::LegacyRule => "legacy rule",
            AutomationKind::LegacyBranchingProcess => "legacy process",
            AutomationKind::RecordTriggeredFlow => "record-triggered flow",
            AutomationKind::AutolaunchedFlow => "autolaunched flow",
            AutomationKind::ScreenFlow => "screen flow",
            AutomationKind::ScriptedTrigger => "trigger",
            AutomationKind::ScriptedClass => "class",
        }
    }

    /// Deprecated declarative technology.
    pub const fn is_legacy(self) -> bool {
        matches!(
            self,
            AutomationKind::LegacyRule | AutomationKind::LegacyBranchingProcess
        )
    }
}

impl fmt::Display for AutomationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutomationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase().replace('_', "-");
        AutomationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown automation kind: {s}"))
    }
}

/// Canonical save-lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TriggerEvent {
    #[serde(rename = "before save")]
    BeforeSave,
    #[serde(rename = "after save")]
    AfterSave,
    #[serde(rename = "before delete")]
    BeforeDelete,
}

impl TriggerEvent {
    pub const fn as_str(self) -> &'static str {
        match self {
            TriggerEvent::BeforeSave => "before save",
            TriggerEvent::AfterSave => "after save",
            TriggerEvent::BeforeDelete => "before delete",
        }
    }

    pub const fn is_before(self) -> bool {
        matches!(self, TriggerEvent::BeforeSave | TriggerEvent::BeforeDelete)
    }

    /// Maps raw parser event names onto the canonical set. After-side delete and
    /// undelete events share the after-save slot.
    pub fn normalize(raw: &str) -> Option<TriggerEvent> {
        let s = raw
            .trim()
            .to_ascii_lowercase()
            .replace(['_', '-'], " ");
        let s: Vec<&str> = s.split_whitespace().collect();
        match s.as_slice() {
            ["before", "insert" | "update" | "save" | "create"] => Some(TriggerEvent::BeforeSave),
            ["after", "insert" | "update" | "save" | "create" | "undelete" | "delete"] => {
                Some(TriggerEvent::AfterSave)
            }
            ["before", "delete"] => Some(TriggerEvent::BeforeDelete),
            ["beforeinsert" | "beforeupdate" | "beforesave"] => Some(TriggerEvent::BeforeSave),
            ["afterinsert" | "afterupdate" | "aftersave" | "afterundelete" | "afterdelete"] => {
                Some(TriggerEvent::AfterSave)
            }
            ["beforedelete"] => Some(TriggerEvent::BeforeDelete),
            _ => None,
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StructuredMetadata {
    #[serde(deserialize_with = "null_as_default")]
    pub field_update_fields: BTreeSet<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub action_types: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler_class: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub dispatch_calls: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub has_inline_data_mutation: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub has_inline_query: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub has_query_in_loop: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub has_data_mutation_in_loop: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub has_hardcoded_ids: bool,
    #[serde(skip_serializing_if = "BTreeSet::is_empty", deserialize_with = "null_as_default")]
    pub mutated_objects: BTreeSet<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationItem {
    pub id: String,
    pub kind: AutomationKind,
    pub api_name: String,
    #[serde(default)]
    pub object_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_events")]
    pub trigger_events: BTreeSet<TriggerEvent>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_description: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_managed_package: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub structured_metadata: StructuredMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl AutomationItem {
    pub fn meta(&self) -> &StructuredMetadata {
        &self.structured_metadata
    }

    pub fn has_before_event(&self) -> bool {
        self.trigger_events.iter().any(|e| e.is_before())
    }

    pub fn has_after_event(&self) -> bool {
        self.trigger_events.iter().any(|e| !e.is_before())
    }

    pub fn on_object(&self, object: &str) -> bool {
        self.object_name
            .as_deref()
            .is_some_and(|o| o.eq_ignore_ascii_case(object))
    }

    /// Attribute lookup used by declarative conditions and message templates.
    /// Accepts item attributes (`apiName`) and metadata keys, optionally
    /// prefixed with `structuredMetadata.`.
    pub fn field_value(&self, field: &str) -> Option<Value> {
        let field = field.trim();
        match field {
            "id" => return Some(Value::String(self.id.clone())),
            "kind" => return Some(Value::String(self.kind.as_str().to_string())),
            "apiName" | "name" => return Some(Value::String(self.api_name.clone())),
            "objectName" | "object" => {
                return self.object_name.clone().map(Value::String);
            }
            "triggerEvents" => {
                return Some(Value::Array(
                    self.trigger_events
                        .iter()
                        .map(|e| Value::String(e.as_str().to_string()))
                        .collect(),
                ));
            }
            "isActive" => return Some(Value::Bool(self.is_active)),
            "hasDescription" => return Some(Value::Bool(self.has_description)),
            "isManagedPackage" => return Some(Value::Bool(self.is_managed_package)),
            "summary" => return self.summary.clone().map(Value::String),
            _ => {}
        }

        let key = field.strip_prefix("structuredMetadata.").unwrap_or(field);
        let Ok(Value::Object(meta)) = serde_json::to_value(&self.structured_metadata) else {
            return None;
        };
        meta.get(key).cloned().filter(|v| !v.is_null())
    }
}

/// Parsers write `null` for absent values; treat it like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_events<'de, D>(deserializer: D) -> Result<BTreeSet<TriggerEvent>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<String>> = Option::deserialize(deserializer)?;
    let mut events = BTreeSet::new();
    for event in raw.unwrap_or_default() {
        match TriggerEvent::normalize(&event) {
            Some(e) => {
                events.insert(e);
            }
            None => tracing::debug!(event = %event, "dropping unrecognized trigger event"),
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_maps_dml_events_to_canonical_set() {
        assert_eq!(
            TriggerEvent::normalize("before update"),
            Some(TriggerEvent::BeforeSave)
        );
        assert_eq!(
            TriggerEvent::normalize("BEFORE_INSERT"),
            Some(TriggerEvent::BeforeSave)
        );
        assert_eq!(
            TriggerEvent::normalize("after undelete"),
            Some(TriggerEvent::AfterSave)
        );
        assert_eq!(
            TriggerEvent::normalize("before delete"),
            Some(TriggerEvent::BeforeDelete)
        );
        assert_eq!(TriggerEvent::normalize("on schedule"), None);
    }

    #[test]
    fn item_tolerates_missing_optional_fields() {
        let item: AutomationItem = serde_json::from_str(
            r#"{"id":"1","kind":"scripted-trigger","apiName":"T1","triggerEvents":["before update","after insert","bogus"]}"#,
        )
        .expect("parse item");
        assert!(!item.is_active);
        assert!(item.object_name.is_none());
        assert!(item.meta().field_update_fields.is_empty());
        assert_eq!(
            item.trigger_events.iter().copied().collect::<Vec<_>>(),
            vec![TriggerEvent::BeforeSave, TriggerEvent::AfterSave]
        );
    }

    #[test]
    fn item_treats_null_optional_fields_as_absent() {
        let item: AutomationItem = serde_json::from_str(
            r#"{"id":"1","kind":"legacy-rule","apiName":"W","objectName":null,"isActive":null,
                "hasDescription":null,"isManagedPackage":null,"triggerEvents":null,"structuredMetadata":null}"#,
        )
        .expect("parse item");
        assert!(!item.is_active && !item.has_description && !item.is_managed_package);
        assert_eq!(item.meta(), &StructuredMetadata::default());

        let item: AutomationItem = serde_json::from_str(
            r#"{"id":"2","kind":"scripted-trigger","apiName":"T","isActive":true,
                "structuredMetadata":{"fieldUpdateFields":null,"dispatchCalls":null,"hasInlineQuery":null,
                "mutatedObjects":null,"handlerClass":null,"hasQueryInLoop":true}}"#,
        )
        .expect("parse item");
        assert!(item.is_active);
        assert!(item.meta().field_update_fields.is_empty());
        assert!(item.meta().dispatch_calls.is_empty());
        assert!(!item.meta().has_inline_query);
        assert!(item.meta().has_query_in_loop);
        assert!(item.meta().extra.is_empty());
    }

    #[test]
    fn field_value_reads_metadata_with_or_without_prefix() {
        let item: AutomationItem = serde_json::from_str(
            r#"{"id":"1","kind":"scripted-trigger","apiName":"T1","structuredMetadata":{"hasInlineQuery":true,"customFlag":"x"}}"#,
        )
        .expect("parse item");
        assert_eq!(item.field_value("hasInlineQuery"), Some(Value::Bool(true)));
        assert_eq!(
            item.field_value("structuredMetadata.customFlag"),
            Some(Value::String("x".to_string()))
        );
        assert_eq!(item.field_value("handlerClass"), None);
        assert_eq!(
            item.field_value("kind"),
            Some(Value::String("scripted-trigger".to_string()))
        );
    }
}
