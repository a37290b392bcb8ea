// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::SkusConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates a deserialized configuration, collecting every failure.
pub fn validate_config(config: &SkusConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "service.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.service.log_level
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    let dispatcher = &config.dispatcher;
    for (key, value) in [
        ("poll_interval_secs", dispatcher.poll_interval_secs),
        ("batch_size", dispatcher.batch_size as u64),
        ("max_attempts", u64::from(dispatcher.max_attempts)),
        ("claim_lease_secs", dispatcher.claim_lease_secs),
        ("signer_timeout_secs", dispatcher.signer_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "dispatcher.{key} must be greater than 0"
            )));
        }
    }

    if dispatcher.claim_lease_secs != 0
        && dispatcher.claim_lease_secs <= dispatcher.signer_timeout_secs
    {
        errors.push(ConfigError::validation(format!(
            "dispatcher.claim_lease_secs ({}) must exceed dispatcher.signer_timeout_secs ({})",
            dispatcher.claim_lease_secs, dispatcher.signer_timeout_secs
        )));
    }

    for sku in config.credentials.active_limits.keys() {
        if sku.trim().is_empty() {
            errors.push(ConfigError::validation(
                "credentials.active_limits contains an empty SKU",
            ));
        }
    }

    for (sku, ceiling) in &config.credentials.interval_ceilings {
        if sku.trim().is_empty() {
            errors.push(ConfigError::validation(
                "credentials.interval_ceilings contains an empty SKU",
            ));
        }
        if *ceiling == 0 {
            errors.push(ConfigError::validation(format!(
                "credentials.interval_ceilings.{sku} must be at least 1"
            )));
        }
    }

    if config.retrieval.avg_window == 0 {
        errors.push(ConfigError::validation(
            "retrieval.avg_window must be greater than 0",
        ));
    }

    if config.retrieval.default_retry_after_secs == 0 {
        errors.push(ConfigError::validation(
            "retrieval.default_retry_after_secs must be greater than 0",
        ));
    }

    let url = config.signer.base_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(ConfigError::validation(format!(
            "signer.base_url must start with http:// or https://, got `{url}`"
        )));
    }

    if config.signer.request_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "signer.request_timeout_secs must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
