use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::core::{AutomationItem, Condition, Operator};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("placeholder regex is valid")
});

/// AND-combination of the condition list. An empty list never matches.
pub fn conditions_match(conditions: &[Condition], item: &AutomationItem) -> bool {
    !conditions.is_empty() && conditions.iter().all(|c| condition_matches(c, item))
}

/// Unsupported operators and missing fields evaluate to non-match.
pub fn condition_matches(condition: &Condition, item: &AutomationItem) -> bool {
    let Some(actual) = item.field_value(&condition.field) else {
        return false;
    };
    match condition.operator {
        Operator::Eq => values_equal(&actual, &condition.value),
        Operator::Ne => !values_equal(&actual, &condition.value),
        Operator::In => match &condition.value {
            Value::Array(set) => contained_in(&actual, set),
            _ => false,
        },
        Operator::NotIn => match &condition.value {
            Value::Array(set) => !contained_in(&actual, set),
            _ => false,
        },
        Operator::Unsupported => false,
    }
}

fn contained_in(actual: &Value, set: &[Value]) -> bool {
    match actual {
        Value::Array(values) => values
            .iter()
            .any(|v| set.iter().any(|s| values_equal(v, s))),
        scalar => set.iter().any(|s| values_equal(scalar, s)),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len()
                && x.iter().all(|v| y.iter().any(|w| values_equal(v, w)))
                && y.iter().all(|w| x.iter().any(|v| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Substitutes `{{field}}` tokens from the item's own attributes. Tokens named in
/// `extra` take precedence; unknown tokens render empty.
pub fn render_message(template: &str, item: &AutomationItem, extra: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            if let Some((_, v)) = extra.iter().find(|(k, _)| *k == key) {
                return (*v).to_string();
            }
            item.field_value(key)
                .map(|v| value_text(&v))
                .unwrap_or_default()
        })
        .into_owned()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(values) => values
            .iter()
            .map(value_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> AutomationItem {
        serde_json::from_value(json!({
            "id": "a1",
            "kind": "legacy-rule",
            "apiName": "WFR1",
            "objectName": "Account",
            "isActive": true,
            "structuredMetadata": { "fieldUpdateFields": ["Status__c", "Stage__c"] }
        }))
        .expect("item")
    }

    #[test]
    fn empty_condition_list_never_matches() {
        assert!(!conditions_match(&[], &item()));
    }

    #[test]
    fn eq_and_ne_compare_scalars() {
        let it = item();
        assert!(condition_matches(
            &Condition::new("isActive", Operator::Eq, json!(true)),
            &it
        ));
        assert!(condition_matches(
            &Condition::new("objectName", Operator::Ne, json!("Contact")),
            &it
        ));
        assert!(!condition_matches(
            &Condition::new("kind", Operator::Eq, json!("scripted-trigger")),
            &it
        ));
    }

    #[test]
    fn in_requires_a_set_value() {
        let it = item();
        assert!(condition_matches(
            &Condition::new("kind", Operator::In, json!(["legacy-rule", "screen-flow"])),
            &it
        ));
        assert!(!condition_matches(
            &Condition::new("kind", Operator::In, json!("legacy-rule")),
            &it
        ));
        assert!(!condition_matches(
            &Condition::new("kind", Operator::NotIn, json!("screen-flow")),
            &it
        ));
        assert!(condition_matches(
            &Condition::new("fieldUpdateFields", Operator::In, json!(["Stage__c"])),
            &it
        ));
        assert!(condition_matches(
            &Condition::new("fieldUpdateFields", Operator::NotIn, json!(["Other__c"])),
            &it
        ));
    }

    #[test]
    fn missing_field_and_unknown_operator_are_non_matches() {
        let it = item();
        assert!(!condition_matches(
            &Condition::new("noSuchField", Operator::Ne, json!("x")),
            &it
        ));
        let parsed: Condition =
            serde_json::from_value(json!({"field": "kind", "operator": "regex", "value": ".*"}))
                .expect("condition");
        assert_eq!(parsed.operator, Operator::Unsupported);
        assert!(!condition_matches(&parsed, &it));
    }

    #[test]
    fn render_substitutes_item_fields() {
        let msg = render_message(
            "{{apiName}} on {{ objectName }} writes {{fieldUpdateFields}}{{missing}}",
            &item(),
            &[],
        );
        assert_eq!(msg, "WFR1 on Account writes Stage__c, Status__c");
        assert_eq!(
            render_message("{{detail}}", &item(), &[("detail", "x")]),
            "x"
        );
    }
}
