//! The rule contract.
//!
//! A rule is a named, independently executable compliance check. Running it
//! yields a [`RuleResult`] with one [`CheckResult`] per evaluated target.
//!
//! Expected failures while gathering evidence (a missing resource, an
//! unreachable node, malformed output) are reported as `Errored` check
//! results so that sibling checks survive. Only conditions that make the
//! invocation itself meaningless are returned as a [`RuleError`].
//!
//! # Example
//!
//! ```rust,ignore
//! use kubecomply::rule::{Rule, SkipRule, Status};
//!
//! let rule = SkipRule::new(
//!     "242384",
//!     "The Kubernetes Scheduler must have secure binding (MEDIUM 242384)",
//!     "The cluster does not make use of a Kubernetes Scheduler.",
//!     Status::Skipped,
//! );
//! let result = rule.run().await?;
//! assert_eq!(result.check_results.len(), 1);
//! ```

pub mod retry;
pub mod types;

pub use retry::{Backoff, RetryCondition, RetryableRule, retry_condition_from_regex};
pub use types::{CheckResult, RuleResult, Status, Target, status_icon};

use async_trait::async_trait;

/// Structural errors returned from [`Rule::run`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("Invalid rule configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Skip rule {id} has status {status}, expected Skipped or Accepted")]
    InvalidSkipStatus { id: String, status: Status },

    #[error("{0}")]
    Other(String),
}

/// A single compliance check.
#[async_trait]
pub trait Rule: Send + Sync {
    /// Stable identifier of the rule.
    fn id(&self) -> &str;

    /// Human-readable name of the rule.
    fn name(&self) -> &str;

    /// Run the rule once.
    async fn run(&self) -> Result<RuleResult, RuleError>;
}

#[async_trait]
impl<R: Rule + ?Sized> Rule for Box<R> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn run(&self) -> Result<RuleResult, RuleError> {
        (**self).run().await
    }
}

#[async_trait]
impl<R: Rule + ?Sized> Rule for std::sync::Arc<R> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn run(&self) -> Result<RuleResult, RuleError> {
        (**self).run().await
    }
}

/// A rule that is structurally inapplicable and always reports the same
/// justification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipRule {
    id: String,
    name: String,
    justification: String,
    status: Status,
}

impl SkipRule {
    /// Create a skip rule. `status` must be `Skipped` or `Accepted`.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        justification: impl Into<String>,
        status: Status,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            justification: justification.into(),
            status,
        }
    }

    pub fn justification(&self) -> &str {
        &self.justification
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

#[async_trait]
impl Rule for SkipRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<RuleResult, RuleError> {
        match self.status {
            Status::Skipped | Status::Accepted => Ok(RuleResult::single(
                self,
                CheckResult::new(self.status, self.justification.clone(), Target::new()),
            )),
            status => Err(RuleError::InvalidSkipStatus {
                id: self.id.clone(),
                status,
            }),
        }
    }
}
