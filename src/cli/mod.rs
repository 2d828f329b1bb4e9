use std::io;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::config::EffectiveConfig;
use crate::core::{AutomationItem, AutomationPreference, RecommendationStatus, Report, Severity};
use crate::engine::{Engine, EngineOptions};
use crate::rules::RuleStore;
use crate::store::{DEFAULT_PASS_ID, PassStore, StoreError};
use crate::ui::UiConfig;

mod markdown;

#[derive(Debug, Parser)]
#[command(
    name = "stackaudit",
    version,
    about = "Audit platform automation for execution-order hazards and produce ranked consolidation plans"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one full analysis pass over a snapshot.
    Audit(AuditArgs),
    /// Show the save-order sequence and hazards for one object.
    Order(OrderArgs),
    /// Classify the automation stack of every object.
    Classify(ClassifyArgs),
    /// List the effective rule table.
    Rules(RulesArgs),
    /// Print a stored pass.
    Show(ShowArgs),
    /// Set the workflow status of a stored recommendation.
    Status(StatusArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct AuditArgs {
    #[arg(long)]
    pub snapshot: PathBuf,
    /// JSON rule table replacing the built-in rules.
    #[arg(long)]
    pub rules: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_PASS_ID)]
    pub pass: String,
    #[arg(long)]
    pub save: bool,
    #[arg(long)]
    pub markdown: bool,
    #[arg(long)]
    pub fail_on: Option<Severity>,
    #[arg(long)]
    pub preference: Option<AutomationPreference>,
}

#[derive(Debug, Args)]
pub struct OrderArgs {
    #[arg(long)]
    pub snapshot: PathBuf,
    #[arg(long)]
    pub object: String,
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    #[arg(long)]
    pub snapshot: PathBuf,
}

#[derive(Debug, Args)]
pub struct RulesArgs {
    /// Include rules filtered out by the profile.
    #[arg(long)]
    pub all: bool,
    #[arg(long)]
    pub rules: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(long, default_value = DEFAULT_PASS_ID)]
    pub pass: String,
    #[arg(long)]
    pub markdown: bool,
    /// List stored pass ids instead of printing one pass.
    #[arg(long, conflicts_with = "markdown")]
    pub list: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[arg(long, default_value = DEFAULT_PASS_ID)]
    pub pass: String,
    #[arg(long)]
    pub recommendation: String,
    #[arg(long)]
    pub set: RecommendationStatus,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else {
        match EnvFilter::try_from_env("STACKAUDIT_LOG") {
            Ok(filter) => filter,
            Err(_) if cli.verbose => EnvFilter::new("stackaudit=debug"),
            Err(_) => EnvFilter::new("stackaudit=warn"),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::config::effective_home_dir()?;

    let env_config_path = std::env::var_os("STACKAUDIT_CONFIG").map(PathBuf::from);
    let mut cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_input_err)?;

    let color = stdout_is_tty && cfg.ui.color && !cli.no_color;
    let ui_cfg = UiConfig {
        color,
        stdout_is_tty,
        stderr_is_tty,
        max_table_rows: cfg.ui.max_table_rows,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };
    let pass_store = PassStore::new(cfg.store.dir.clone());

    match cli.command {
        Commands::Audit(args) => {
            if let Some(preference) = args.preference {
                cfg.profile.automation_preference = preference;
            }
            crate::store::validate_pass_id(&args.pass)
                .map_err(|e| crate::exit::invalid_input_err(e.into()))?;
            let items = load_snapshot(&args.snapshot)?;
            let rule_store = build_rule_store(&cfg, args.rules.as_deref())?;

            let engine = Engine::new(EngineOptions {
                show_progress: ui_cfg.stderr_is_tty && !cli.quiet && !cli.json,
            });
            let report = engine.run_pass(&args.pass, &items, &rule_store, &cfg.profile);

            if args.save {
                let path = pass_store.replace_pass(&report)?;
                if !cli.quiet && !cli.json {
                    eprintln!("saved pass {} to {}", report.pass_id, path.display());
                }
            }

            if cli.json {
                write_json(&report)?;
            } else if args.markdown {
                write_markdown(&report, cfg.report.include_steps)?;
            } else {
                crate::ui::print_audit(&report, &ui_cfg, cfg.report.include_steps);
            }

            if let Some(threshold) = args.fail_on {
                let hits = report
                    .findings
                    .iter()
                    .filter(|f| f.severity >= threshold)
                    .count();
                if hits > 0 {
                    return Err(crate::exit::findings_at_threshold(format!(
                        "{hits} finding(s) at or above {threshold}"
                    )));
                }
            }
        }
        Commands::Order(args) => {
            let items = load_snapshot(&args.snapshot)?;
            let object = args.object.trim();
            if object.is_empty() {
                return Err(crate::exit::invalid_input("--object must not be empty"));
            }
            let on_object: Vec<&AutomationItem> =
                items.iter().filter(|i| i.on_object(object)).collect();
            let audit = crate::order::audit_order_of_execution(on_object);
            if cli.json {
                write_json(&audit)?;
            } else {
                crate::ui::print_order(object, &audit, &ui_cfg);
            }
        }
        Commands::Classify(args) => {
            let items = load_snapshot(&args.snapshot)?;
            let rows = crate::classify::classify_objects(&items);
            if cli.json {
                write_json(&rows)?;
            } else {
                crate::ui::print_classification(&rows, &ui_cfg);
            }
        }
        Commands::Rules(args) => {
            let rule_store = build_rule_store(&cfg, args.rules.as_deref())?;
            let active = rule_store.active_for(&cfg.profile);
            let active_ids: Vec<&str> = active.iter().map(|r| r.id.as_str()).collect();
            let rules = if args.all {
                rule_store.all().to_vec()
            } else {
                active.clone()
            };
            if cli.json {
                write_json(&rules)?;
            } else {
                crate::ui::print_rules(&rules, &active_ids, &ui_cfg);
            }
        }
        Commands::Show(args) if args.list => {
            let ids = pass_store.list_passes()?;
            if cli.json {
                write_json(&ids)?;
            } else if ids.is_empty() {
                if !cli.quiet {
                    eprintln!("no stored passes in {}", pass_store.dir().display());
                }
            } else {
                for id in ids {
                    println!("{id}");
                }
            }
        }
        Commands::Show(args) => {
            let report = pass_store.load_pass(&args.pass).map_err(map_store_error)?;
            if cli.json {
                write_json(&report)?;
            } else if args.markdown {
                write_markdown(&report, cfg.report.include_steps)?;
            } else {
                crate::ui::print_audit(&report, &ui_cfg, cfg.report.include_steps);
            }
        }
        Commands::Status(args) => {
            let rec = pass_store
                .set_status(&args.pass, &args.recommendation, args.set)
                .map_err(map_store_error)?;
            if cli.json {
                write_json(&rec)?;
            } else {
                crate::ui::print_status_change(&args.pass, &rec, &ui_cfg);
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "stackaudit", &mut out);
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    write_json(&cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: use `stackaudit config --show`");
            }
        }
    }

    Ok(())
}

fn load_snapshot(path: &Path) -> Result<Vec<AutomationItem>> {
    crate::snapshot::load(path).map_err(crate::exit::invalid_input_err)
}

fn build_rule_store(cfg: &EffectiveConfig, table: Option<&Path>) -> Result<RuleStore> {
    let base = table
        .map(RuleStore::load_table)
        .transpose()
        .map_err(crate::exit::invalid_input_err)?;
    cfg.rule_store(base).map_err(crate::exit::invalid_input_err)
}

fn map_store_error(err: anyhow::Error) -> anyhow::Error {
    if err.downcast_ref::<StoreError>().is_some() {
        crate::exit::invalid_input_err(err)
    } else {
        err
    }
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn write_markdown(report: &Report, include_steps: bool) -> Result<()> {
    use std::io::Write;

    let markdown = markdown::format_report(report, include_steps);
    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(markdown.as_bytes()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_input(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}
