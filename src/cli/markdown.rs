use std::fmt::Write as _;

use crate::core::{Finding, Recommendation, Report};

pub(super) fn format_report(report: &Report, include_steps: bool) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# stackaudit report");
    let _ = writeln!(out);
    let _ = writeln!(out, "- pass: `{}`", report.pass_id);
    let _ = writeln!(out, "- tool version: {}", report.tool_version);
    let _ = writeln!(out, "- generated at: {}", report.generated_at);
    let _ = writeln!(
        out,
        "- automation preference: {}",
        report.profile.automation_preference
    );
    let _ = writeln!(
        out,
        "- items: {} ({} active) on {} object(s)",
        report.summary.item_count, report.summary.active_item_count, report.summary.object_count
    );
    for note in &report.summary.notes {
        let _ = writeln!(out, "- note: {note}");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Recommendations ({})", report.recommendations.len());
    if report.recommendations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "_No recommendations._");
    }
    for rec in &report.recommendations {
        write_recommendation(&mut out, rec, include_steps);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Findings ({})", report.findings.len());
    if report.findings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "_No findings._");
    }

    let mut findings: Vec<&Finding> = report.findings.iter().collect();
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
    if !findings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "| severity | rule | item | object | message |");
        let _ = writeln!(out, "| --- | --- | --- | --- | --- |");
        for f in findings {
            let _ = writeln!(
                out,
                "| {} | `{}` | {} | {} | {} |",
                f.severity,
                f.rule_id,
                f.item_name.as_deref().unwrap_or("-"),
                f.object_name.as_deref().unwrap_or("-"),
                escape_cell(&f.message)
            );
        }
    }

    out
}

fn write_recommendation(out: &mut String, rec: &Recommendation, include_steps: bool) {
    let _ = writeln!(out);
    let _ = writeln!(out, "### {} (score {})", rec.title, rec.priority_score);
    let _ = writeln!(out, "- id: `{}`", rec.id);
    let _ = writeln!(out, "- pattern: {}", rec.pattern);
    let _ = writeln!(out, "- severity: {}", rec.severity);
    let _ = writeln!(out, "- effort: {}", rec.effort_estimate);
    let _ = writeln!(out, "- status: {}", rec.status);
    if !rec.affected_item_ids.is_empty() {
        let _ = writeln!(out, "- affected items:");
        for id in &rec.affected_item_ids {
            let _ = writeln!(out, "  - `{id}`");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", rec.rationale);
    let _ = writeln!(out);
    let _ = writeln!(out, "**Recommended:** {}", rec.recommended_path);
    let _ = writeln!(out);
    let _ = writeln!(out, "**Alternative:** {}", rec.alternative_path);

    if include_steps && !rec.steps.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "#### Steps");
        let _ = writeln!(out);
        for step in &rec.steps {
            let marker = if step.warning { "**Warning:** " } else { "" };
            let mut lines = step.text.lines();
            let first = lines.next().unwrap_or("");
            let _ = writeln!(out, "{}. {marker}{first}", step.step);
            for line in lines.filter(|l| !l.trim().is_empty()) {
                let _ = writeln!(out, "   - {}", line.trim());
            }
        }
    }
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}
