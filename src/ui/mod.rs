use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::classify::ObjectClassification;
use crate::core::{Finding, Recommendation, Report, Rule, Severity};
use crate::order::{HazardLevel, OrderAudit};

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub max_table_rows: usize,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(stderr, "  - re-run with `--verbose` for details");
    let _ = writeln!(
        stderr,
        "  - see `stackaudit --help` for available commands and options"
    );
}

pub fn print_audit(report: &Report, cfg: &UiConfig, include_steps: bool) {
    if cfg.quiet {
        return;
    }
    let s = &report.summary;
    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "summary: pass={}  items={} (active {})  objects={}  rules={}  findings={}  recommendations={}",
        report.pass_id,
        s.item_count,
        s.active_item_count,
        s.object_count,
        s.rule_count,
        s.finding_count,
        s.recommendation_count
    );
    for note in &s.notes {
        let _ = writeln!(out, "- {note}");
    }

    let rows = cfg.max_table_rows.min(report.recommendations.len());
    let _ = writeln!(out);
    if report.recommendations.len() > rows {
        let _ = writeln!(
            out,
            "recommendations ({rows} shown of {}):",
            report.recommendations.len()
        );
    } else {
        let _ = writeln!(out, "recommendations ({rows}):");
    }
    print_recommendations_table(&mut out, &report.recommendations, rows, cfg.color);

    if include_steps {
        for rec in report.recommendations.iter().take(rows) {
            let _ = writeln!(out);
            let _ = writeln!(out, "{} [{}]", rec.title, rec.id);
            for step in &rec.steps {
                let marker = if step.warning { "!" } else { " " };
                let mut lines = step.text.lines();
                if let Some(first) = lines.next() {
                    let _ = writeln!(out, " {marker}{:>3}. {first}", step.step);
                }
                for line in lines {
                    let _ = writeln!(out, "        {line}");
                }
            }
        }
    }

    let frows = cfg.max_table_rows.min(report.findings.len());
    let _ = writeln!(out);
    if report.findings.len() > frows {
        let _ = writeln!(out, "findings ({frows} shown of {}):", report.findings.len());
    } else {
        let _ = writeln!(out, "findings ({frows}):");
    }
    print_findings_table(&mut out, &report.findings, frows, cfg.color);

    if cfg.verbose && !s.failed_rules.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "failed rules: {}", s.failed_rules.join(", "));
    }
}

pub fn print_order(object: &str, audit: &OrderAudit, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    if audit.sequence.is_empty() {
        let _ = writeln!(out, "{object}: no active automation participates in the save order.");
        return;
    }
    let _ = writeln!(
        out,
        "{object}: {} item(s) across {} phase(s)",
        audit.participant_count(),
        audit.distinct_phases()
    );
    let _ = writeln!(out, "{}", audit.format_sequence());
    let _ = writeln!(out);
    if audit.hazards.is_empty() {
        let _ = writeln!(out, "hazards: none");
        return;
    }
    let _ = writeln!(out, "hazards ({}):", audit.hazards.len());
    for hazard in &audit.hazards {
        let level = pad_end_ansi(&format_hazard_level(hazard.severity, cfg.color), 7);
        let _ = writeln!(out, "  {level}  {}", hazard.text);
    }
}

pub fn print_classification(rows: &[ObjectClassification], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let label_object = "OBJECT";
    let label_pattern = "PATTERN";
    let object_w = rows
        .iter()
        .map(|r| visible_width_ansi(&r.object))
        .max()
        .unwrap_or(0)
        .max(label_object.len());
    let pattern_w = rows
        .iter()
        .map(|r| r.pattern.as_str().len())
        .max()
        .unwrap_or(0)
        .max(label_pattern.len());

    let _ = writeln!(
        out,
        "{}  {}  {}  {}  {}  {}",
        pad_end_display(label_object, object_w),
        pad_end_display(label_pattern, pattern_w),
        "ACTIVE",
        "LEGACY",
        " FLOWS",
        "TRIGGERS"
    );
    let _ = writeln!(
        out,
        "{}  {}  ------  ------  ------  --------",
        "-".repeat(object_w),
        "-".repeat(pattern_w)
    );
    for row in rows.iter().take(cfg.max_table_rows.max(1)) {
        let _ = writeln!(
            out,
            "{}  {}  {}  {}  {}  {}",
            pad_end_display(&row.object, object_w),
            pad_end_display(row.pattern.as_str(), pattern_w),
            pad_start_display(&row.active_items.to_string(), 6),
            pad_start_display(&row.legacy.to_string(), 6),
            pad_start_display(&row.flows.to_string(), 6),
            pad_start_display(&row.triggers.to_string(), 8)
        );
    }
    if rows.len() > cfg.max_table_rows.max(1) {
        let _ = writeln!(out, "... {} more object(s)", rows.len() - cfg.max_table_rows.max(1));
    }
}

pub fn print_rules(rules: &[Rule], active_ids: &[&str], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let id_w = rules
        .iter()
        .map(|r| visible_width_ansi(&r.id))
        .max()
        .unwrap_or(0)
        .max(2);
    let _ = writeln!(
        out,
        "{}  {}  {}  {}  {}  NAME",
        pad_end_display("ID", id_w),
        pad_end_display("LAYER", 12),
        pad_end_display("SEVERITY", 8),
        pad_end_display("SCOPE", 10),
        pad_end_display("ON", 3),
    );
    for rule in rules {
        let on = if active_ids.contains(&rule.id.as_str()) {
            "yes"
        } else {
            "no"
        };
        let severity = pad_end_ansi(&format_severity(rule.severity, cfg.color), 8);
        let origin = if rule.is_builtin { "" } else { " (custom)" };
        let _ = writeln!(
            out,
            "{}  {}  {severity}  {}  {}  {}{origin}",
            pad_end_display(&rule.id, id_w),
            pad_end_display(rule.layer.as_str(), 12),
            pad_end_display(rule.check_type.as_str(), 10),
            pad_end_display(on, 3),
            rule.name
        );
    }
}

pub fn print_status_change(pass_id: &str, rec: &Recommendation, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "pass {pass_id}: recommendation {} is now {}",
        rec.id, rec.status
    );
}

fn print_recommendations_table(
    out: &mut dyn Write,
    recs: &[Recommendation],
    rows: usize,
    color: bool,
) {
    let score_w = recs
        .iter()
        .take(rows)
        .map(|r| r.priority_score.to_string().len())
        .max()
        .unwrap_or(0)
        .max("SCORE".len());
    let _ = writeln!(
        out,
        "{}  {}  {}  {}  TITLE",
        pad_start_display("SCORE", score_w),
        pad_end_display("SEVERITY", 8),
        pad_end_display("EFFORT", 6),
        pad_end_display("STATUS", 9),
    );
    let _ = writeln!(
        out,
        "{}  --------  ------  ---------  -----",
        "-".repeat(score_w)
    );
    for rec in recs.iter().take(rows) {
        let _ = writeln!(
            out,
            "{}  {}  {}  {}  {}",
            pad_start_display(&rec.priority_score.to_string(), score_w),
            pad_end_ansi(&format_severity(rec.severity, color), 8),
            pad_end_display(rec.effort_estimate.as_str(), 6),
            pad_end_display(rec.status.as_str(), 9),
            truncate_middle(&rec.title, 96)
        );
    }
}

fn print_findings_table(out: &mut dyn Write, findings: &[Finding], rows: usize, color: bool) {
    let rule_w = findings
        .iter()
        .take(rows)
        .map(|f| visible_width_ansi(&f.rule_id))
        .max()
        .unwrap_or(0)
        .max("RULE".len());
    let _ = writeln!(
        out,
        "{}  {}  MESSAGE",
        pad_end_display("RULE", rule_w),
        pad_end_display("SEVERITY", 8)
    );
    let _ = writeln!(out, "{}  --------  -------", "-".repeat(rule_w));
    for finding in findings.iter().take(rows) {
        let _ = writeln!(
            out,
            "{}  {}  {}",
            pad_end_display(&finding.rule_id, rule_w),
            pad_end_ansi(&format_severity(finding.severity, color), 8),
            truncate_middle(&finding.message, 110)
        );
    }
}

fn truncate_middle(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    if count <= max_chars || max_chars < 5 {
        return s.to_string();
    }
    let keep = max_chars - 3;
    let head = keep / 2 + keep % 2;
    let tail = keep / 2;
    let prefix: String = s.chars().take(head).collect();
    let suffix: String = s
        .chars()
        .rev()
        .take(tail)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{prefix}...{suffix}")
}

pub fn format_severity(severity: Severity, color: bool) -> String {
    let s = severity.as_str();
    if !color {
        return s.to_string();
    }
    let code = match severity {
        Severity::Info => "90",
        Severity::Warning => "33",
        Severity::Error => "31",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn format_hazard_level(level: HazardLevel, color: bool) -> String {
    let s = match level {
        HazardLevel::High => "HIGH",
        HazardLevel::Warning => "WARNING",
    };
    if !color {
        return s.to_string();
    }
    let code = match level {
        HazardLevel::High => "31",
        HazardLevel::Warning => "33",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn pad_end_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_start_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}
