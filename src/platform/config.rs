//! Static bootstrap settings (`LydianSettings`), read once at process start
//! via the `config` crate from an optional TOML file plus `LYDIAN__`-prefixed
//! environment variables. Covers process-level settings that must exist
//! before any store can open (DB directory, RPC bind port, log level);
//! tunable runtime values live in the dynamic [`crate::config::ConfigStore`]
//! instead, which composes with this layer rather than replacing it.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LydianSettings {
    pub service: ServiceSettings,
    pub observability: ObservabilitySettings,
}

impl Default for LydianSettings {
    fn default() -> Self {
        Self { service: ServiceSettings::default(), observability: ObservabilitySettings::default() }
    }
}

impl LydianSettings {
    pub fn load() -> Result<Self> {
        Self::load_from_path(None::<PathBuf>)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path.as_ref()).format(FileFormat::Toml).required(true),
            );
        }

        builder = builder.add_source(Environment::with_prefix("LYDIAN").separator("__"));

        let config = builder.build()?;
        config.try_deserialize().context("invalid lydian settings")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// RPC listen port (`LYDIAN_PORT`).
    pub port: u16,
    pub db_dir: String,
    pub config_file: String,
    pub host_name: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            port: 5649,
            db_dir: "/var/lydian/db".to_string(),
            config_file: "/etc/lydian/lydian.conf".to_string(),
            host_name: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    pub log_level: String,
    pub metrics_port: u16,
    pub enable_metrics: bool,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self { log_level: "info".to_string(), metrics_port: 9100, enable_metrics: true }
    }
}
