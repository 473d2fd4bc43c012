use crate::error::ConfigError;
use crate::nodes::DEFAULT_GROUP_LABEL;
use crate::pod::DEFAULT_NAME_PREFIX;
use crate::rule::{Backoff, RetryCondition, Status, retry_condition_from_regex};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pod: PodConfig,
    pub retry: RetryConfig,
    pub nodes: NodesConfig,
    pub rules: RulesConfig,
}

impl Config {
    /// Check values that serde cannot: regex patterns and skip statuses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pod.validate()?;
        self.retry.compile_patterns()?;
        for skip in &self.rules.skipped {
            if !matches!(skip.status, Status::Skipped | Status::Accepted) {
                return Err(ConfigError::InvalidSkipStatus {
                    id: skip.id.clone(),
                    status: skip.status.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Ephemeral node pod settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodConfig {
    pub namespace: String,
    pub image: String,
    pub name_prefix: String,
    pub ready_timeout_secs: u64,
    pub exec_timeout_secs: u64,
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            namespace: "kube-system".to_string(),
            image: "busybox:1.36".to_string(),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            ready_timeout_secs: 120,
            exec_timeout_secs: 60,
        }
    }
}

impl PodConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "pod.namespace".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.ready_timeout_secs == 0 || self.exec_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pod timeouts".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Pause strategy between retries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    None,
    Constant,
    Exponential,
}

/// Retry policy applied to node rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Errored messages matching any of these patterns trigger a retry.
    pub patterns: Vec<String>,
    pub backoff: BackoffKind,
    pub delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            patterns: Vec::new(),
            backoff: BackoffKind::None,
            delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn compile_patterns(&self) -> Result<Vec<Regex>, ConfigError> {
        self.patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect()
    }

    pub fn condition(&self) -> Result<RetryCondition, ConfigError> {
        Ok(retry_condition_from_regex(self.compile_patterns()?))
    }

    pub fn backoff(&self) -> Backoff {
        match self.backoff {
            BackoffKind::None => Backoff::None,
            BackoffKind::Constant => Backoff::Constant(Duration::from_millis(self.delay_ms)),
            BackoffKind::Exponential => Backoff::Exponential {
                initial: Duration::from_millis(self.delay_ms),
                max: Duration::from_millis(self.max_delay_ms),
            },
        }
    }
}

/// Node grouping settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodesConfig {
    pub group_label: String,
}

impl Default for NodesConfig {
    fn default() -> Self {
        Self {
            group_label: DEFAULT_GROUP_LABEL.to_string(),
        }
    }
}

/// Rule catalog adjustments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub skipped: Vec<SkipRuleConfig>,
}

/// A rule documented as inapplicable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRuleConfig {
    pub id: String,
    pub name: String,
    pub justification: String,
    #[serde(default = "default_skip_status")]
    pub status: Status,
}

fn default_skip_status() -> Status {
    Status::Skipped
}
