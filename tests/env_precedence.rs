use std::path::{Path, PathBuf};
use std::process::Command;
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

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);

    let temp = std::env::temp_dir();
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let uniq = format!("stackaudit-env-test-{}-{seq}", std::process::id());
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
fn env_overrides_config_file() {
    let home = make_temp_home();
    write_file(
        home.join(".config/stackaudit/config.toml").as_path(),
        br#"
[profile]
automation_preference = "apex-first"

[ui]
max_table_rows = 3
"#,
    );

    let out = stackaudit_cmd(&home)
        .env("STACKAUDIT_AUTOMATION_PREFERENCE", "balanced")
        .env("STACKAUDIT_UI_MAX_TABLE_ROWS", "9")
        .args(["config", "--show", "--json"])
        .output()
        .expect("run stackaudit");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["profile"]["automation_preference"], "balanced");
    assert_eq!(v["ui"]["max_table_rows"], 9);
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn cli_flag_overrides_env() {
    let home = make_temp_home();
    let out = stackaudit_cmd(&home)
        .env("STACKAUDIT_AUTOMATION_PREFERENCE", "balanced")
        .args(["audit", "--snapshot", ORG, "--json", "--preference", "apex-first"])
        .output()
        .expect("run stackaudit");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["profile"]["automation_preference"], "apex-first");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn active_layers_env_limits_rule_evaluation() {
    let home = make_temp_home();
    let out = stackaudit_cmd(&home)
        .env("STACKAUDIT_ACTIVE_RULE_LAYERS", "risk")
        .args(["audit", "--snapshot", ORG, "--json"])
        .output()
        .expect("run stackaudit");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    let findings = v["findings"].as_array().expect("findings");
    assert!(!findings.is_empty());
    assert!(findings.iter().all(|f| f["layer"] == "risk"), "findings={findings:?}");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn store_dir_env_redirects_saved_passes() {
    let home = make_temp_home();
    let store = home.join("elsewhere");
    let out = stackaudit_cmd(&home)
        .env("STACKAUDIT_STORE_DIR", &store)
        .args(["audit", "--snapshot", ORG, "--save", "--quiet"])
        .output()
        .expect("run stackaudit");
    assert!(out.status.success());
    assert!(store.join("default.json").exists());
    assert!(!home.join(".config/stackaudit/passes/default.json").exists());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn invalid_env_values_exit_2() {
    let home = make_temp_home();
    for (key, value) in [
        ("STACKAUDIT_UI_COLOR", "maybe"),
        ("STACKAUDIT_UI_MAX_TABLE_ROWS", "lots"),
        ("STACKAUDIT_AUTOMATION_PREFERENCE", "sideways"),
        ("STACKAUDIT_ACTIVE_RULE_LAYERS", "platform,bogus"),
    ] {
        let out = stackaudit_cmd(&home)
            .env(key, value)
            .args(["config", "--show"])
            .output()
            .expect("run stackaudit");
        assert_eq!(out.status.code(), Some(2), "{key}={value}");
    }
    let _ = std::fs::remove_dir_all(&home);
}
