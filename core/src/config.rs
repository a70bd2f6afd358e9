//! Manager configuration.
//!
//! # Design
//! `ManagerConfig` is plain data with serde support so it can be embedded in
//! a larger application config. `from_env` covers the common case of tuning
//! a deployment without a config file.

use std::env;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Executors allowed to run at once unless configured otherwise.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

pub const ENV_MAX_CONCURRENT: &str = "NETQ_MAX_CONCURRENT";
pub const ENV_MIME_POLICY: &str = "NETQ_MIME_POLICY";

/// How the response MIME type is checked against the expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MimePolicy {
    /// A response whose MIME type equals the expected type is a fault.
    #[default]
    RejectMatching,
    /// A response whose MIME type differs from the expected type is a fault.
    RequireMatch,
}

impl MimePolicy {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "reject-matching" => Some(MimePolicy::RejectMatching),
            "require-match" => Some(MimePolicy::RequireMatch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub max_concurrent: usize,
    pub mime_policy: MimePolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            mime_policy: MimePolicy::default(),
        }
    }
}

impl ManagerConfig {
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_mime_policy(mut self, mime_policy: MimePolicy) -> Self {
        self.mime_policy = mime_policy;
        self
    }

    /// Defaults overridden by `NETQ_MAX_CONCURRENT` and `NETQ_MIME_POLICY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_MAX_CONCURRENT) {
            config.max_concurrent = match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_MAX_CONCURRENT,
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup(ENV_MIME_POLICY) {
            config.mime_policy =
                MimePolicy::parse(value.trim()).ok_or(ConfigError::InvalidValue {
                    key: ENV_MIME_POLICY,
                    value,
                })?;
        }
        Ok(config)
    }
}
