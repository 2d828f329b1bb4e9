use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

const ORG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/org.json");

fn stackaudit_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stackaudit"));
    cmd.env("HOME", home);
    cmd.env_remove("STACKAUDIT_CONFIG");
    cmd.env_remove("STACKAUDIT_LOG");
    cmd.env_remove("STACKAUDIT_AUTOMATION_PREFERENCE");
    cmd.env_remove("STACKAUDIT_ACTIVE_RULE_LAYERS");
    cmd.env_remove("STACKAUDIT_SUPPRESSED_RULES");
    cmd.env_remove("STACKAUDIT_NAMING_PATTERN");
    cmd.env_remove("STACKAUDIT_UI_COLOR");
    cmd.env_remove("STACKAUDIT_UI_MAX_TABLE_ROWS");
    cmd.env_remove("STACKAUDIT_STORE_DIR");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    stackaudit_cmd(home).args(args).output().expect("run stackaudit")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);

    let temp = std::env::temp_dir();
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let uniq = format!("stackaudit-config-test-{}-{seq}", std::process::id());
    let home = temp.join(uniq);
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

#[test]
fn config_show_prints_defaults_without_a_file() {
    let home = make_temp_home();
    let out = run(&home, &["config", "--show", "--json"]);
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["profile"]["automation_preference"], "flow-first");
    assert_eq!(v["ui"]["max_table_rows"], 20);
    assert_eq!(v["report"]["include_steps"], true);
    assert!(v.get("config_path").is_none());
    let store_dir = v["store"]["dir"].as_str().expect("store dir");
    assert!(store_dir.ends_with(".config/stackaudit/passes"), "dir={store_dir}");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn config_show_toml_round_trips_the_profile() {
    let home = make_temp_home();
    write_file(
        home.join(".config/stackaudit/config.toml").as_path(),
        br#"
[profile]
automation_preference = "balanced"
"#,
    );
    let out = run(&home, &["config", "--show"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("automation_preference = \"balanced\""), "stdout={stdout}");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn config_file_drives_profile_rules_and_store() {
    let home = make_temp_home();
    write_file(
        home.join(".config/stackaudit/config.toml").as_path(),
        br#"
[profile]
automation_preference = "apex-first"
suppressed_rule_ids = ["HOUSE-001"]

[store]
dir = "~/audits"

[[rules.overrides]]
id = "PLAT-001"
severity = "error"
"#,
    );

    let out = run(&home, &["audit", "--snapshot", ORG, "--json", "--save"]);
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["profile"]["automation_preference"], "apex-first");

    let findings = v["findings"].as_array().expect("findings");
    assert!(findings.iter().all(|f| f["rule_id"] != "HOUSE-001"));
    let legacy = findings
        .iter()
        .find(|f| f["rule_id"] == "PLAT-001")
        .expect("legacy rule finding");
    assert_eq!(legacy["severity"], "error");

    assert!(home.join("audits/default.json").exists());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn cli_preference_overrides_config_file() {
    let home = make_temp_home();
    write_file(
        home.join(".config/stackaudit/config.toml").as_path(),
        b"[profile]\nautomation_preference = \"apex-first\"\n",
    );
    let out = run(
        &home,
        &["audit", "--snapshot", ORG, "--json", "--preference", "balanced"],
    );
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["profile"]["automation_preference"], "balanced");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn explicit_config_path_wins_over_env_config_path() {
    let home = make_temp_home();
    let env_cfg = home.join("env.toml");
    let flag_cfg = home.join("flag.toml");
    write_file(&env_cfg, b"[ui]\nmax_table_rows = 5\n");
    write_file(&flag_cfg, b"[ui]\nmax_table_rows = 7\n");

    let out = stackaudit_cmd(&home)
        .env("STACKAUDIT_CONFIG", &env_cfg)
        .args(["config", "--show", "--json"])
        .output()
        .expect("run stackaudit");
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["ui"]["max_table_rows"], 5);

    let out = stackaudit_cmd(&home)
        .env("STACKAUDIT_CONFIG", &env_cfg)
        .args(["--config", flag_cfg.to_str().expect("utf8 path"), "config", "--show", "--json"])
        .output()
        .expect("run stackaudit");
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["ui"]["max_table_rows"], 7);
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn unknown_config_keys_are_rejected() {
    let home = make_temp_home();
    write_file(
        home.join(".config/stackaudit/config.toml").as_path(),
        b"[scan]\nexclude = []\n",
    );
    let out = run(&home, &["config", "--show", "--json"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}
