// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Agent settings that shape attribute filtering, trace building and
//! harvesting. Every struct has sensible defaults and can be read from
//! `APM_*` environment variables.

use crate::constants::{
    DEFAULT_LOG_LEVEL, DEFAULT_SEGMENT_THRESHOLD, DEFAULT_STACK_TRACE_THRESHOLD,
    MAX_SYNTHETICS_TRACES, MAX_TXN_TRACE_NODES,
};
use crate::errors::ConfigError;
use std::env;
use std::time::Duration;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Include/exclude rules for one output destination category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDestinationConfig {
    pub enabled: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for AttributeDestinationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl AttributeDestinationConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    fn from_env(prefix: &str, enabled_by_default: bool) -> Self {
        Self {
            enabled: env_bool(&format!("{prefix}_ENABLED"), enabled_by_default),
            include: env_list(&format!("{prefix}_INCLUDE")),
            exclude: env_list(&format!("{prefix}_EXCLUDE")),
        }
    }
}

/// Input of [`crate::attributes::AttributeConfig::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeConfigInput {
    /// Rules applying to every destination.
    pub attributes: AttributeDestinationConfig,
    pub error_collector: AttributeDestinationConfig,
    pub transaction_events: AttributeDestinationConfig,
    pub transaction_tracer: AttributeDestinationConfig,
    pub browser_monitoring: AttributeDestinationConfig,
}

impl Default for AttributeConfigInput {
    fn default() -> Self {
        Self {
            attributes: AttributeDestinationConfig::default(),
            error_collector: AttributeDestinationConfig::default(),
            transaction_events: AttributeDestinationConfig::default(),
            transaction_tracer: AttributeDestinationConfig::default(),
            browser_monitoring: AttributeDestinationConfig::disabled(),
        }
    }
}

impl AttributeConfigInput {
    pub fn from_env() -> Self {
        Self {
            attributes: AttributeDestinationConfig::from_env("APM_ATTRIBUTES", true),
            error_collector: AttributeDestinationConfig::from_env(
                "APM_ERROR_COLLECTOR_ATTRIBUTES",
                true,
            ),
            transaction_events: AttributeDestinationConfig::from_env(
                "APM_TRANSACTION_EVENTS_ATTRIBUTES",
                true,
            ),
            transaction_tracer: AttributeDestinationConfig::from_env(
                "APM_TRANSACTION_TRACER_ATTRIBUTES",
                true,
            ),
            browser_monitoring: AttributeDestinationConfig::from_env(
                "APM_BROWSER_MONITORING_ATTRIBUTES",
                false,
            ),
        }
    }
}

/// Per-transaction trace settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnTraceConfig {
    pub enabled: bool,
    /// Segments shorter than this are left out of the trace tree.
    pub segment_threshold: Duration,
    /// Segments at least this long get a stack trace.
    pub stack_trace_threshold: Duration,
    pub max_nodes: usize,
}

impl Default for TxnTraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            segment_threshold: DEFAULT_SEGMENT_THRESHOLD,
            stack_trace_threshold: DEFAULT_STACK_TRACE_THRESHOLD,
            max_nodes: MAX_TXN_TRACE_NODES,
        }
    }
}

impl TxnTraceConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_bool("APM_TRANSACTION_TRACER_ENABLED", defaults.enabled),
            segment_threshold: env_millis(
                "APM_TRANSACTION_TRACER_SEGMENT_THRESHOLD_MS",
                defaults.segment_threshold,
            ),
            stack_trace_threshold: env_millis(
                "APM_TRANSACTION_TRACER_STACK_TRACE_THRESHOLD_MS",
                defaults.stack_trace_threshold,
            ),
            max_nodes: env::var("APM_TRANSACTION_TRACER_MAX_NODES")
                .ok()
                .and_then(|val| val.trim().parse::<usize>().ok())
                .unwrap_or(defaults.max_nodes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestConfig {
    pub max_synthetics_traces: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_synthetics_traces: MAX_SYNTHETICS_TRACES,
        }
    }
}

/// Everything the core needs, assembled once at agent startup.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub attributes: AttributeConfigInput,
    /// When false (a security policy), include rules are ignored and only
    /// exclude rules shape attribute destinations.
    pub include_enabled: bool,
    pub transaction_tracer: TxnTraceConfig,
    pub harvest: HarvestConfig,
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            attributes: AttributeConfigInput::default(),
            include_enabled: true,
            transaction_tracer: TxnTraceConfig::default(),
            harvest: HarvestConfig::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AgentConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_synthetics_traces = env::var("APM_MAX_SYNTHETICS_TRACES")
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(MAX_SYNTHETICS_TRACES);
        let log_level = env::var("APM_LOG_LEVEL")
            .map(|val| val.trim().to_lowercase())
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        let config = Self {
            attributes: AttributeConfigInput::from_env(),
            include_enabled: env_bool("APM_ATTRIBUTES_INCLUDE_ENABLED", true),
            transaction_tracer: TxnTraceConfig::from_env(),
            harvest: HarvestConfig {
                max_synthetics_traces,
            },
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transaction_tracer.max_nodes == 0 {
            return Err(ConfigError::InvalidConfig(
                "transaction trace max nodes must be greater than 0".to_string(),
            ));
        }

        if self.harvest.max_synthetics_traces == 0 {
            return Err(ConfigError::InvalidConfig(
                "max synthetics traces must be greater than 0".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|val| match val.trim().to_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => default,
        })
        .unwrap_or(default)
}

fn env_millis(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|val| val.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn env_list(name: &str) -> Vec<String> {
    env::var(name)
        .map(|val| parse_list(&val))
        .unwrap_or_default()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.attributes.browser_monitoring.enabled);
        assert!(config.attributes.transaction_tracer.enabled);
    }

    #[test]
    fn test_validate_zero_max_nodes() {
        let config = AgentConfig {
            transaction_tracer: TxnTraceConfig {
                max_nodes: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_synthetics_cap() {
        let config = AgentConfig {
            harvest: HarvestConfig {
                max_synthetics_traces: 0,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_log_levels() {
        for level in VALID_LOG_LEVELS {
            let config = AgentConfig {
                log_level: level.to_string(),
                ..Default::default()
            };
            assert!(
                config.validate().is_ok(),
                "Log level '{}' should be valid",
                level
            );
        }

        let config = AgentConfig {
            log_level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_list_drops_blanks() {
        assert_eq!(
            parse_list(" request.*, ,zip,, user.name "),
            vec!["request.*", "zip", "user.name"]
        );
        assert!(parse_list("").is_empty());
    }
}
