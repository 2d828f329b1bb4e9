use crate::core::{Effort, Pattern, Severity};

/// `(medium_at, high_at)` active-item thresholds per pattern; `None` means the
/// pattern is always high effort.
const fn thresholds(pattern: Pattern) -> Option<(usize, usize)> {
    match pattern {
        Pattern::DeprecatedPlusMixed | Pattern::ApexFragmented => None,
        Pattern::DeprecatedPlusFlow | Pattern::DeprecatedPlusApex | Pattern::FlowAndApex => {
            Some((3, 6))
        }
        Pattern::DeprecatedOnly | Pattern::LegacyMigration => Some((4, 8)),
        Pattern::FlowFragmented => Some((4, 7)),
        Pattern::Undocumented | Pattern::InactiveCleanup => Some((10, 25)),
        Pattern::Clean => Some((usize::MAX, usize::MAX)),
    }
}

pub fn effort_for(pattern: Pattern, active_count: usize) -> Effort {
    match thresholds(pattern) {
        None => Effort::High,
        Some((_, high)) if active_count >= high => Effort::High,
        Some((medium, _)) if active_count >= medium => Effort::Medium,
        Some(_) => Effort::Low,
    }
}

/// `severity weight + 5 per affected item - effort penalty`.
pub fn priority_score(severity: Severity, affected_count: usize, effort: Effort) -> i64 {
    let affected = i64::try_from(affected_count).unwrap_or(i64::MAX / 10);
    severity.weight() + 5 * affected - effort.penalty()
}
