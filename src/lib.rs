//! # kubecomply
//!
//! A framework for running compliance rules against a Kubernetes cluster.
//!
//! ## Features
//!
//! - **Result model**: ordered [`Status`] severities, [`Target`] locators,
//!   [`CheckResult`] and [`RuleResult`]
//! - **Rules**: the async [`Rule`] contract, [`SkipRule`] and the
//!   [`RetryableRule`] decorator
//! - **Node commands**: [`PodContext`] runs shell commands on a node through a
//!   short-lived privileged pod
//! - **Reports**: plain text and JSON output for a [`Ruleset`] run
//!
//! ## Example
//!
//! ```rust,no_run
//! use kubecomply::{config, pod::KubePodContext, rules, report};
//! use std::sync::Arc;
//!
//! # async fn run() -> kubecomply::Result<()> {
//! let config = config::load_config(None)?;
//! let client = kube::Client::try_default().await?;
//! let pods = KubePodContext::shared(client.clone(), &config.pod);
//! let ruleset = rules::builtin_ruleset(Arc::new(client), pods, &config)?;
//! let result = ruleset.run().await;
//! println!("{}", report::format(&result, report::OutputFormat::Plain));
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod nodes;
pub mod pod;
pub mod report;
pub mod rule;
pub mod rules;
pub mod ruleset;

pub use error::{ConfigError, Error, Result};
pub use pod::{ExecError, PodContext};
pub use rule::{
    CheckResult, RetryableRule, Rule, RuleError, RuleResult, SkipRule, Status, Target,
};
pub use ruleset::{Ruleset, RulesetResult};

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
