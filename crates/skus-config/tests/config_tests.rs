// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading and diagnostics.

use skus_config::diagnostic::ConfigError;
use skus_config::{load_and_validate_str, load_config_from_str};

#[test]
fn full_config_deserializes() {
    let toml = r#"
[service]
name = "skus-test"
log_level = "debug"

[storage]
database_path = "/tmp/skus-test.db"
wal_mode = false

[dispatcher]
poll_interval_secs = 1
batch_size = 50
max_attempts = 3
claim_lease_secs = 120
signer_timeout_secs = 10

[credentials]
default_active_limit = 2

[credentials.active_limits]
leo = 10

[credentials.interval_ceilings]
leo = 3

[retrieval]
default_retry_after_secs = 2
avg_window = 20

[signer]
base_url = "https://signer.internal"
request_timeout_secs = 15

[prometheus]
enabled = false
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.service.name, "skus-test");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.dispatcher.batch_size, 50);
    assert_eq!(config.dispatcher.max_attempts, 3);
    assert_eq!(config.credentials.default_active_limit, 2);
    assert_eq!(config.credentials.active_limits.get("leo"), Some(&10));
    assert_eq!(config.credentials.interval_ceilings.get("leo"), Some(&3));
    assert_eq!(config.retrieval.avg_window, 20);
    assert_eq!(config.signer.base_url, "https://signer.internal");
    assert!(!config.prometheus.enabled);
}

#[test]
fn empty_config_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.service.name, "skus");
    assert_eq!(config.dispatcher.max_attempts, 5);
    assert_eq!(config.credentials.default_active_limit, 5);
    assert_eq!(config.retrieval.avg_window, 10);
    assert!(config.storage.database_path.ends_with("skus.db"));
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = "[dispatcher]\nbacth_size = 5\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "bacth_size");
            assert_eq!(suggestion.as_deref(), Some("batch_size"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telemetry]\nenabled = true\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[dispatcher]\nbatch_size = \"many\"\n").unwrap_err();
    assert!(
        matches!(&errors[0], ConfigError::InvalidType { key, .. } if key.contains("batch_size")),
        "got: {errors:?}"
    );
}

#[test]
fn semantic_validation_runs_after_parse() {
    let errors = load_and_validate_str("[retrieval]\navg_window = 0\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn raw_loader_skips_validation() {
    let config = load_config_from_str("[retrieval]\navg_window = 0\n").expect("parses");
    assert_eq!(config.retrieval.avg_window, 0);
}
