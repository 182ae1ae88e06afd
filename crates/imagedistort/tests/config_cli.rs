use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn run_config(config_dir: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_imagedistort"))
        .env("IMAGEDISTORT_CONFIG_DIR", config_dir)
        .env_remove("IMAGEDISTORT_CONFIG")
        .args(extra)
        .output()
        .expect("failed to run imagedistort config")
}

#[test]
fn config_where_reports_override_directory() {
    let root = TempDir::new().unwrap();
    let output = run_config(root.path(), &["config", "where"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&root.path().display().to_string()));
    assert!(stdout.contains("config.toml (missing)"), "stdout was: {stdout}");
}

#[test]
fn config_show_prints_defaults_without_a_file() {
    let root = TempDir::new().unwrap();
    let output = run_config(root.path(), &["config", "show"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("version = 1"), "stdout was: {stdout}");
    assert!(stdout.contains("[timeline]"));
    assert!(stdout.contains("rgb-shift"));
}

#[test]
fn config_show_reads_the_config_file() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("config.toml"),
        r#"
version = 1

[post]
order = ["rgb-shift"]
rgb_shift_amount = 0.25

[timeline]
enabled = false
"#,
    )
    .unwrap();

    let output = run_config(root.path(), &["config", "show"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("rgb_shift_amount = 0.25"), "stdout was: {stdout}");
    assert!(stdout.contains("enabled = false"));
    assert!(!stdout.contains("\"distortion\""));

    let located = run_config(root.path(), &["config", "where"]);
    assert!(String::from_utf8_lossy(&located.stdout).contains("(present)"));
}

#[test]
fn invalid_config_fails_loudly() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("config.toml"), "version = 7\n").unwrap();

    let output = run_config(root.path(), &["config", "show"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported config version"), "stderr was: {stderr}");
}
