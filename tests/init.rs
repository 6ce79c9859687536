use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_reviewbot"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "reviewbot init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".reviewbot.toml");
    assert!(config_path.exists(), ".reviewbot.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[review]"));
    assert!(content.contains("[llm]"));

    // Verify it's valid TOML that reviewbot-core can parse
    let config: reviewbot_core::AppConfig = toml::from_str(&content).unwrap();
    assert!(config.review.validate().is_ok());
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".reviewbot.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_reviewbot"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".reviewbot.toml")).unwrap();
    assert_eq!(content, "# existing");
}
