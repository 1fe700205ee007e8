//! Startup against real config and flags files.

use std::fs;

use flaglevel::config::{load_config, AppConfig};
use flaglevel::lifecycle::{self, StartupError};
use flaglevel::LogLevel;

mod common;

const FLAGS: &str = r#"
[flags.service-log-level]
enabled = true

[flags.service-log-level.variant]
name = "ACME.example.com"
enabled = true
payload = { value = '{"Global": " Verbose "}' }

[flags.unrelated]
enabled = true
"#;

fn write_config(dir: &std::path::Path) -> AppConfig {
    let config_path = dir.join("flaglevel.toml");
    let flags_path = dir.join("flags.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[flag]
flag_name = "service-log-level"
base_url = "https://acme.example.com/app"
global_log_level_key = "global"
default_variant_name = "default"
fallback_level = "warn"

[flag_source]
path = "{}"
poll_interval_secs = 1
"#,
            flags_path.display()
        ),
    )
    .unwrap();
    load_config(&config_path).unwrap()
}

#[tokio::test]
async fn test_initial_flags_applied_on_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    fs::write(&config.flag_source.path, FLAGS).unwrap();

    let (logger, log) = common::recording_logger();
    let service = lifecycle::start(config, None, logger).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let controller = service.stop().await.unwrap();
    assert_eq!(controller.current_level(), LogLevel::Verbose);
    assert_eq!(log.count(), 2);
}

#[tokio::test]
async fn test_unparsable_flags_stay_at_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    fs::write(&config.flag_source.path, "[flags\n").unwrap();

    let (logger, log) = common::recording_logger();
    let service = lifecycle::start(config, None, logger).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let controller = service.stop().await.unwrap();
    assert_eq!(controller.current_level(), LogLevel::Warn);
    assert!(!controller.subscription().is_armed());
    assert_eq!(log.count(), 0);
}

#[tokio::test]
async fn test_missing_flags_file_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let (logger, _) = common::recording_logger();
    let result = lifecycle::start(config, None, logger).await;
    assert!(matches!(result, Err(StartupError::Watch { .. })));
}
