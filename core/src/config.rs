//! Bridge configuration.
//!
//! Everything has a default, so `BridgeConfig::default()` is a working
//! configuration. `from_env` overlays `BRIDGE_*` environment variables; the
//! struct also deserializes with serde for hosts that keep their own config
//! files.

use serde::Deserialize;

use crate::binding::DEFAULT_BINDING_NAME;
use crate::error::ConfigError;
use crate::route::RouteOptions;
use crate::scheduler::SchedulerConfig;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub scheduler: SchedulerConfig,
    pub routes: RouteOptions,
    pub binding_name: String,
    /// Register the built-in `/info` route.
    pub info_route: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            routes: RouteOptions::default(),
            binding_name: DEFAULT_BINDING_NAME.to_string(),
            info_route: false,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` uses the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = lookup("BRIDGE_WORKER_THREADS") {
            let n = v.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                key: "BRIDGE_WORKER_THREADS",
                value: v.clone(),
                reason: e.to_string(),
            })?;
            config.scheduler.worker_threads = Some(n);
        }
        if let Some(v) = lookup("BRIDGE_THREAD_NAME") {
            config.scheduler.thread_name = v;
        }
        if let Some(v) = lookup("BRIDGE_ROUTES_CASE_SENSITIVE") {
            config.routes.case_sensitive = parse_bool("BRIDGE_ROUTES_CASE_SENSITIVE", &v)?;
        }
        if let Some(v) = lookup("BRIDGE_BINDING_NAME") {
            config.binding_name = v;
        }
        if let Some(v) = lookup("BRIDGE_INFO_ROUTE") {
            config.info_route = parse_bool("BRIDGE_INFO_ROUTE", &v)?;
        }
        Ok(config)
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
