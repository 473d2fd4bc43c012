//! Built-in rule catalog.

pub mod node_files;

use crate::config::Config;
use crate::error::ConfigError;
use crate::nodes::NodeSource;
use crate::pod::PodContext;
use crate::rule::retry::DEFAULT_LOG_TARGET;
use crate::rule::{RetryableRule, Rule, SkipRule};
use crate::ruleset::Ruleset;
use std::sync::Arc;

pub use node_files::{ExpectedFile, NodeFilesRule, kubelet_files};

pub const RULESET_ID: &str = "kubecomply-node";
pub const RULESET_VERSION: &str = crate::VERSION;

/// Build the built-in rules.
///
/// Node rules are wrapped in a [`RetryableRule`] using the retry policy from
/// `config`. Rules listed under `rules.skipped` replace the rule with the same
/// id, or are appended when no such rule exists.
pub fn builtin(
    nodes: Arc<dyn NodeSource>,
    pod_context: Arc<dyn PodContext>,
    config: &Config,
) -> Result<Vec<Box<dyn Rule>>, ConfigError> {
    let condition = config.retry.condition()?;
    let node_files = RetryableRule::new(
        NodeFilesRule::new(nodes, pod_context).with_group_label(config.nodes.group_label.clone()),
    )
    .with_max_retries(config.retry.max_retries)
    .with_shared_condition(condition)
    .with_backoff(config.retry.backoff())
    .with_log_target(retry_log_target(node_files::ID));

    let mut rules: Vec<Box<dyn Rule>> = vec![Box::new(node_files)];

    for skip in &config.rules.skipped {
        let rule: Box<dyn Rule> = Box::new(SkipRule::new(
            skip.id.clone(),
            skip.name.clone(),
            skip.justification.clone(),
            skip.status,
        ));
        match rules.iter().position(|r| r.id() == skip.id) {
            Some(index) => rules[index] = rule,
            None => rules.push(rule),
        }
    }

    Ok(rules)
}

/// Log target for retries of the rule `id`.
pub fn retry_log_target(id: &str) -> String {
    format!("{}::{}", DEFAULT_LOG_TARGET, id)
}

/// The built-in rules as a [`Ruleset`].
pub fn builtin_ruleset(
    nodes: Arc<dyn NodeSource>,
    pod_context: Arc<dyn PodContext>,
    config: &Config,
) -> Result<Ruleset, ConfigError> {
    Ok(Ruleset::new(RULESET_ID, RULESET_VERSION).with_rules(builtin(nodes, pod_context, config)?))
}
