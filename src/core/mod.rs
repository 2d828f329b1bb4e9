mod finding;
mod item;
mod profile;
mod recommendation;
mod report;
mod rule;
mod severity;

pub use finding::Finding;
pub use item::{AutomationItem, AutomationKind, StructuredMetadata, TriggerEvent};
pub use profile::{AutomationPreference, CustomerProfile};
pub use recommendation::{Effort, Pattern, Recommendation, RecommendationStatus, Step};
pub use report::{Report, ReportSummary};
pub use rule::{CheckType, Condition, Operator, Rule, RuleLayer};
pub use severity::Severity;

use std::collections::BTreeMap;

/// Items grouped by object name, compared case-insensitively like
/// [`AutomationItem::on_object`]. Each group is labelled with the
/// lexicographically smallest spelling seen. Items without an object are
/// skipped.
pub fn group_by_object<'a, I>(items: I) -> BTreeMap<&'a str, Vec<&'a AutomationItem>>
where
    I: IntoIterator<Item = &'a AutomationItem>,
{
    let mut groups: BTreeMap<String, (&'a str, Vec<&'a AutomationItem>)> = BTreeMap::new();
    for item in items {
        let Some(object) = item.object_name.as_deref() else {
            continue;
        };
        let (label, members) = groups
            .entry(object.to_ascii_lowercase())
            .or_insert((object, Vec::new()));
        if object < *label {
            *label = object;
        }
        members.push(item);
    }
    groups.into_values().collect()
}

/// Active items that target an object, keyed by object name.
pub fn group_active_by_object(items: &[AutomationItem]) -> BTreeMap<&str, Vec<&AutomationItem>> {
    group_by_object(items.iter().filter(|i| i.is_active))
}

/// `A, B, C (+2 more)`.
pub fn join_limited<S: AsRef<str>>(names: &[S], max: usize) -> String {
    let shown: Vec<&str> = names.iter().take(max).map(|s| s.as_ref()).collect();
    let mut out = shown.join(", ");
    if names.len() > max {
        out.push_str(&format!(" (+{} more)", names.len() - max));
    }
    out
}
