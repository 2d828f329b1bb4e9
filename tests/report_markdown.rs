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
    let uniq = format!("stackaudit-report-md-test-{}-{seq}", std::process::id());
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
fn report_markdown_includes_recommendations_steps_and_findings() {
    let home = make_temp_home();

    let out = run(&home, &["audit", "--snapshot", ORG, "--markdown"]);
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("# stackaudit report"), "stdout={stdout}");
    assert!(stdout.contains("## Recommendations ("), "stdout={stdout}");
    assert!(stdout.contains("## Findings ("), "stdout={stdout}");
    assert!(stdout.contains("- id: `apex_fragmented:Account`"), "stdout={stdout}");
    assert!(stdout.contains("#### Steps"), "stdout={stdout}");
    assert!(stdout.contains("**Warning:**"), "stdout={stdout}");
    assert!(stdout.contains("| `PLAT-003` |"), "stdout={stdout}");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn report_markdown_can_hide_steps_via_config() {
    let home = make_temp_home();
    write_file(
        home.join(".config/stackaudit/config.toml").as_path(),
        b"[report]\ninclude_steps = false\n",
    );

    let out = run(&home, &["audit", "--snapshot", ORG, "--markdown"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(!stdout.contains("#### Steps"), "stdout={stdout}");
    assert!(stdout.contains("**Recommended:**"), "stdout={stdout}");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn stored_pass_renders_as_markdown() {
    let home = make_temp_home();
    let out = run(&home, &["audit", "--snapshot", ORG, "--save", "--quiet"]);
    assert!(out.status.success());

    let out = run(&home, &["show", "--markdown"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("- pass: `default`"), "stdout={stdout}");

    let _ = std::fs::remove_dir_all(&home);
}
