use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::{AutomationPreference, CustomerProfile, Rule, RuleLayer};
use crate::rules::{RuleOverride, RuleStore};

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub profile: CustomerProfile,
    pub ui: UiConfig,
    pub report: ReportConfig,
    pub store: StoreConfig,
    pub rules: RulesConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportConfig {
    pub include_steps: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RulesConfig {
    pub overrides: Vec<RuleOverride>,
    pub custom: Vec<Rule>,
}

impl EffectiveConfig {
    pub fn defaults(home_dir: &Path) -> Self {
        Self {
            profile: CustomerProfile::default(),
            ui: UiConfig {
                color: true,
                max_table_rows: 20,
            },
            report: ReportConfig {
                include_steps: true,
            },
            store: StoreConfig {
                dir: home_dir.join(".config/stackaudit/passes"),
            },
            rules: RulesConfig::default(),
            config_path: None,
        }
    }

    /// Rule table for a pass: `base` (built-ins unless an external table is
    /// given) with configured overrides and custom rules applied.
    pub fn rule_store(&self, base: Option<RuleStore>) -> Result<RuleStore> {
        let mut store = base.unwrap_or_else(RuleStore::builtin);
        store.apply_overrides(&self.rules.overrides)?;
        for rule in &self.rules.custom {
            store.add_custom(rule.clone())?;
        }
        Ok(store)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    profile: Option<RawProfileConfig>,
    ui: Option<RawUiConfig>,
    report: Option<RawReportConfig>,
    store: Option<RawStoreConfig>,
    rules: Option<RawRulesConfig>,
}

#[derive(Debug, Deserialize)]
struct RawProfileConfig {
    automation_preference: Option<AutomationPreference>,
    active_rule_layers: Option<BTreeSet<RuleLayer>>,
    suppressed_rule_ids: Option<BTreeSet<String>>,
    naming_convention_pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUiConfig {
    color: Option<bool>,
    max_table_rows: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawReportConfig {
    include_steps: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawStoreConfig {
    dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawRulesConfig {
    #[serde(default)]
    overrides: Vec<RuleOverride>,
    #[serde(default)]
    custom: Vec<Rule>,
}

pub fn effective_home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("HOME is not set"))
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/stackaudit/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::defaults(home_dir);

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
        apply_raw_config(&mut cfg, raw, home_dir);
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg, home_dir)?;

    Ok(cfg)
}

fn expand_home(path: PathBuf, home_dir: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir.join(rest),
        Err(_) => path,
    }
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig, home_dir: &Path) {
    if let Some(profile) = raw.profile {
        if let Some(pref) = profile.automation_preference {
            cfg.profile.automation_preference = pref;
        }
        if let Some(layers) = profile.active_rule_layers {
            cfg.profile.active_rule_layers = layers;
        }
        if let Some(ids) = profile.suppressed_rule_ids {
            cfg.profile.suppressed_rule_ids = ids;
        }
        if let Some(pattern) = profile.naming_convention_pattern {
            cfg.profile.naming_convention_pattern = Some(pattern).filter(|p| !p.trim().is_empty());
        }
    }

    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
    }

    if let Some(report) = raw.report {
        if let Some(include_steps) = report.include_steps {
            cfg.report.include_steps = include_steps;
        }
    }

    if let Some(store) = raw.store {
        if let Some(dir) = store.dir {
            cfg.store.dir = expand_home(dir, home_dir);
        }
    }

    if let Some(rules) = raw.rules {
        cfg.rules.overrides = rules.overrides;
        cfg.rules.custom = rules.custom;
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn apply_env_overrides(cfg: &mut EffectiveConfig, home_dir: &Path) -> Result<()> {
    if let Ok(v) = std::env::var("STACKAUDIT_AUTOMATION_PREFERENCE") {
        cfg.profile.automation_preference = v
            .parse::<AutomationPreference>()
            .map_err(anyhow::Error::msg)
            .with_context(|| "STACKAUDIT_AUTOMATION_PREFERENCE")?;
    }
    if let Ok(v) = std::env::var("STACKAUDIT_ACTIVE_RULE_LAYERS") {
        let layers = split_list(&v)
            .iter()
            .map(|s| s.parse::<RuleLayer>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(anyhow::Error::msg)
            .with_context(|| "STACKAUDIT_ACTIVE_RULE_LAYERS")?;
        if !layers.is_empty() {
            cfg.profile.active_rule_layers = layers;
        }
    }
    if let Ok(v) = std::env::var("STACKAUDIT_SUPPRESSED_RULES") {
        cfg.profile.suppressed_rule_ids = split_list(&v).into_iter().collect();
    }
    if let Ok(v) = std::env::var("STACKAUDIT_NAMING_PATTERN") {
        let v = v.trim();
        cfg.profile.naming_convention_pattern = (!v.is_empty()).then(|| v.to_string());
    }
    if let Ok(v) = std::env::var("STACKAUDIT_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "STACKAUDIT_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("STACKAUDIT_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = v
            .trim()
            .parse::<usize>()
            .with_context(|| "STACKAUDIT_UI_MAX_TABLE_ROWS")?;
    }
    if let Ok(v) = std::env::var("STACKAUDIT_STORE_DIR") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.store.dir = expand_home(PathBuf::from(v), home_dir);
        }
    }

    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}
