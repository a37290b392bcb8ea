// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-based layered configuration loading.
//!
//! Lookup order: `/etc/skus/skus.toml`, then `~/.config/skus/skus.toml`,
//! then `./skus.toml`, then `SKUS_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SkusConfig;

/// Config sections recognized in `SKUS_<SECTION>_<KEY>` variables.
const SECTIONS: &[&str] = &[
    "service",
    "storage",
    "dispatcher",
    "credentials",
    "retrieval",
    "signer",
    "prometheus",
];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/skus/skus.toml";
pub(crate) const LOCAL_CONFIG: &str = "skus.toml";

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("skus/skus.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<SkusConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over compiled defaults only.
pub fn load_config_from_str(toml_content: &str) -> Result<SkusConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SkusConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SkusConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SkusConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full layered figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SkusConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Maps `SKUS_DISPATCHER_BATCH_SIZE` to `dispatcher.batch_size`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys that contain underscores survive intact.
fn env_provider() -> Env {
    Env::prefixed("SKUS_").map(|key| {
        let key_str = key.as_str();
        for section in SECTIONS {
            if let Some(rest) = key_str
                .strip_prefix(section)
                .and_then(|r| r.strip_prefix('_'))
            {
                return format!("{section}.{rest}").into();
            }
        }
        key_str.to_string().into()
    })
}
