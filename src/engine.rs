use std::collections::BTreeSet;
use std::time::Duration;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::{AutomationItem, CustomerProfile, Finding, Recommendation, Report, ReportSummary, Rule};
use crate::handlers::ClassIndex;
use crate::rules::{CheckRegistry, RuleContext, RuleStore};

pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub show_progress: bool,
}

/// Output of one pass, before the report envelope is attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub rule_count: usize,
    pub findings: Vec<Finding>,
    pub failed_rules: Vec<String>,
    pub recommendations: Vec<Recommendation>,
}

/// `(items, rules, profile) -> (findings, recommendations)`. `rules` is the
/// already filtered snapshot for this pass.
pub fn analyze(items: &[AutomationItem], rules: &[Rule], profile: &CustomerProfile) -> Analysis {
    analyze_with(items, rules, profile, &CheckRegistry::builtin())
}

pub fn analyze_with(
    items: &[AutomationItem],
    rules: &[Rule],
    profile: &CustomerProfile,
    registry: &CheckRegistry,
) -> Analysis {
    let ctx = RuleContext::new(profile).with_classes(ClassIndex::new(items));
    let evaluation = crate::rules::evaluate(items, rules, &ctx, registry);
    let recommendations = crate::recommend::synthesize(items, &evaluation.findings, profile);
    Analysis {
        rule_count: rules.len(),
        findings: evaluation.findings,
        failed_rules: evaluation.failed_rules,
        recommendations,
    }
}

#[derive(Debug, Clone)]
pub struct Engine {
    opts: EngineOptions,
    registry: CheckRegistry,
}

impl Engine {
    pub fn new(opts: EngineOptions) -> Self {
        Self {
            opts,
            registry: CheckRegistry::builtin(),
        }
    }

    /// Runs one full pass with the rule snapshot taken from `store` at call time.
    pub fn run_pass(
        &self,
        pass_id: &str,
        items: &[AutomationItem],
        store: &RuleStore,
        profile: &CustomerProfile,
    ) -> Report {
        use std::io::IsTerminal;
        let progress_enabled = self.opts.show_progress && std::io::stderr().is_terminal();
        let pb = if progress_enabled {
            let pb = indicatif::ProgressBar::new_spinner();
            pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            pb.set_message(format!("Analyzing {} automation item(s)...", items.len()));
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            None
        };

        let rules = store.active_for(profile);
        let analysis = analyze_with(items, &rules, profile, &self.registry);

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        tracing::debug!(
            pass = pass_id,
            findings = analysis.findings.len(),
            recommendations = analysis.recommendations.len(),
            "pass finished"
        );
        report_from_analysis(pass_id, items, profile, analysis)
    }
}

pub fn report_from_analysis(
    pass_id: &str,
    items: &[AutomationItem],
    profile: &CustomerProfile,
    analysis: Analysis,
) -> Report {
    let active_item_count = items.iter().filter(|i| i.is_active).count();
    let objects: BTreeSet<&str> = items
        .iter()
        .filter(|i| i.is_active)
        .filter_map(|i| i.object_name.as_deref())
        .collect();
    let object_recs = analysis
        .recommendations
        .iter()
        .filter(|r| r.object_name.is_some() && r.pattern != crate::core::Pattern::LegacyMigration)
        .count();

    let mut notes = vec![format!(
        "Evaluated {} rule(s) over {} item(s) on {} object(s).",
        analysis.rule_count,
        items.len(),
        objects.len()
    )];
    if objects.len() > object_recs {
        notes.push(format!(
            "{} object(s) have a clean automation stack and no consolidation recommendation.",
            objects.len() - object_recs
        ));
    }
    if !analysis.failed_rules.is_empty() {
        notes.push(format!(
            "Rule(s) {} failed and contributed no findings in this pass.",
            analysis.failed_rules.join(", ")
        ));
    }

    let generated_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());

    Report {
        schema_version: SCHEMA_VERSION.to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        pass_id: pass_id.to_string(),
        generated_at,
        profile: profile.clone(),
        summary: ReportSummary {
            item_count: items.len(),
            active_item_count,
            object_count: objects.len(),
            rule_count: analysis.rule_count,
            finding_count: analysis.findings.len(),
            recommendation_count: analysis.recommendations.len(),
            failed_rules: analysis.failed_rules,
            notes,
        },
        findings: analysis.findings,
        recommendations: analysis.recommendations,
    }
}
