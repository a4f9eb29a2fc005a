// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Configuration loader for [`crate::engine::AgentMeshEngine`].
//!
//! Supports two load strategies:
//!
//! 1. **TOML file** — [`load_config`] reads and deserialises a TOML file
//!    directly into a [`crate::config::Config`].
//! 2. **Environment variables** — [`load_config_from_env`] reads
//!    `AGENTMESH_`-prefixed environment variables over a
//!    [`crate::config::Config::default`] baseline.
//!
//! Both loaders are only available when the `config-loader` feature is
//! active, which implies `std`.
//!
//! # File format
//!
//! ```toml
//! revocation_threshold    = 300
//! max_delegation_depth    = 8
//! credential_ttl_ms       = 900000
//! decay_rate_per_hour     = 2.0
//! ```
//!
//! # Environment variables
//!
//! | Variable                            | Type    | Default  |
//! |--------------------------------------|---------|----------|
//! | `AGENTMESH_REVOCATION_THRESHOLD`     | u32     | 300      |
//! | `AGENTMESH_MAX_DELEGATION_DEPTH`     | u32     | 8        |
//! | `AGENTMESH_CREDENTIAL_TTL_MS`        | u64     | 900000   |
//! | `AGENTMESH_CREDENTIAL_ROTATION_LEAD_MS` | u64  | 300000   |
//! | `AGENTMESH_DECAY_INTERVAL_MS`        | u64     | 3600000  |
//! | `AGENTMESH_DECAY_RATE_PER_HOUR`      | f64     | 2.0      |
//! | `AGENTMESH_DECAY_FLOOR`              | f64     | 10.0     |
//! | `AGENTMESH_POLICY_EVAL_TIMEOUT_MS`   | u64     | 5        |
//! | `AGENTMESH_APPROVAL_TIMEOUT_MS`      | u64     | 30000    |

#![cfg(feature = "config-loader")]

use std::fmt;
use std::fs;
use std::num::{ParseFloatError, ParseIntError};

use crate::config::Config;

/// Errors that can occur while loading or parsing engine configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required file could not be opened.
    FileRead { path: String, source: std::io::Error },
    /// The TOML content could not be deserialised.
    TomlParse { source: toml::de::Error },
    /// A field could not be parsed to its expected type.
    ParseField { field: String, value: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileRead { path, source } => {
                write!(f, "failed to read config file \"{path}\": {source}")
            }
            ConfigError::TomlParse { source } => write!(f, "failed to parse TOML config: {source}"),
            ConfigError::ParseField { field, value, reason } => {
                write!(f, "field \"{field}\": cannot parse \"{value}\" — {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::FileRead { source, .. } => Some(source),
            ConfigError::TomlParse { source } => Some(source),
            ConfigError::ParseField { .. } => None,
        }
    }
}

/// Load a [`Config`] from a TOML file at `path`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or its content does
/// not match [`Config`]'s schema.
///
/// # Example
///
/// ```rust,no_run
/// use agentmesh_core::config_loader::load_config;
///
/// let config = load_config("/etc/agentmesh/engine.toml").unwrap();
/// println!("revocation threshold: {}", config.revocation_threshold);
/// ```
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::FileRead { path: path.to_owned(), source })?;
    toml::from_str::<Config>(&content).map_err(|source| ConfigError::TomlParse { source })
}

/// Load a [`Config`] starting from [`Config::default`], overriding scalar
/// fields from `AGENTMESH_`-prefixed environment variables. Dimension
/// weights and alphas are not overridable this way — use [`load_config`]
/// for anything beyond the engine-level scalar knobs.
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    let mut config = Config::default();
    config.revocation_threshold = read_env_u32("AGENTMESH_REVOCATION_THRESHOLD", config.revocation_threshold)?;
    config.max_delegation_depth = read_env_u32("AGENTMESH_MAX_DELEGATION_DEPTH", config.max_delegation_depth)?;
    config.credential_ttl_ms = read_env_u64("AGENTMESH_CREDENTIAL_TTL_MS", config.credential_ttl_ms)?;
    config.credential_rotation_lead_ms =
        read_env_u64("AGENTMESH_CREDENTIAL_ROTATION_LEAD_MS", config.credential_rotation_lead_ms)?;
    config.decay_interval_ms = read_env_u64("AGENTMESH_DECAY_INTERVAL_MS", config.decay_interval_ms)?;
    config.decay_rate_per_hour = read_env_f64("AGENTMESH_DECAY_RATE_PER_HOUR", config.decay_rate_per_hour)?;
    config.decay_floor = read_env_f64("AGENTMESH_DECAY_FLOOR", config.decay_floor)?;
    config.policy_eval_timeout_ms = read_env_u64("AGENTMESH_POLICY_EVAL_TIMEOUT_MS", config.policy_eval_timeout_ms)?;
    config.approval_timeout_ms = read_env_u64("AGENTMESH_APPROVAL_TIMEOUT_MS", config.approval_timeout_ms)?;
    Ok(config)
}

fn read_env_u32(key: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<u32>()
            .map_err(|source: ParseIntError| ConfigError::ParseField { field: key.to_owned(), value: val, reason: source.to_string() }),
        Err(_) => Ok(default),
    }
}

fn read_env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<u64>()
            .map_err(|source: ParseIntError| ConfigError::ParseField { field: key.to_owned(), value: val, reason: source.to_string() }),
        Err(_) => Ok(default),
    }
}

fn read_env_f64(key: &str, default: f64) -> Result<f64, ConfigError> {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<f64>()
            .map_err(|source: ParseFloatError| ConfigError::ParseField { field: key.to_owned(), value: val, reason: source.to_string() }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_loader_falls_back_to_defaults_when_unset() {
        let config = load_config_from_env().unwrap();
        assert_eq!(config.revocation_threshold, Config::default().revocation_threshold);
    }

    #[test]
    fn toml_loader_reports_missing_file() {
        let result = load_config("/nonexistent/agentmesh.toml");
        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }
}
