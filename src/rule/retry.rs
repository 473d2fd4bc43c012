//! Retry decorator for rules.
//!
//! [`RetryableRule`] wraps any [`Rule`] and re-runs it while a
//! [`RetryCondition`] holds for the latest result, up to `max_retries`
//! additional attempts. Structural errors are returned immediately and
//! never retried.

use super::{Rule, RuleError, RuleResult, Status};
use async_trait::async_trait;
use log::{Level, log};
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Predicate deciding whether a result warrants another attempt.
pub type RetryCondition = Arc<dyn Fn(&RuleResult) -> bool + Send + Sync>;

/// Default log target for retry messages.
pub const DEFAULT_LOG_TARGET: &str = "kubecomply::retry";

/// Pause applied between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Retry immediately.
    #[default]
    None,
    /// Wait the same duration before every retry.
    Constant(Duration),
    /// Double the delay after every retry, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Constant(delay) => delay,
            Self::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// A rule that re-runs its base rule according to a retry policy.
pub struct RetryableRule<R> {
    base_rule: R,
    max_retries: u32,
    retry_condition: RetryCondition,
    backoff: Backoff,
    log_target: String,
}

impl<R: Rule> RetryableRule<R> {
    /// Wrap `base_rule` with no retries and a condition that never holds.
    pub fn new(base_rule: R) -> Self {
        Self {
            base_rule,
            max_retries: 0,
            retry_condition: Arc::new(|_| false),
            backoff: Backoff::None,
            log_target: DEFAULT_LOG_TARGET.to_string(),
        }
    }

    /// Allow at most `max_retries` attempts beyond the first one.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the retry condition.
    pub fn with_retry_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&RuleResult) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Arc::new(condition);
        self
    }

    /// Set an already shared retry condition.
    pub fn with_shared_condition(mut self, condition: RetryCondition) -> Self {
        self.retry_condition = condition;
        self
    }

    /// Pause between attempts.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Log target used for retry messages.
    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    pub fn base_rule(&self) -> &R {
        &self.base_rule
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn log_target(&self) -> &str {
        &self.log_target
    }
}

impl<R: Rule> fmt::Debug for RetryableRule<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryableRule")
            .field("id", &self.base_rule.id())
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .finish()
    }
}

#[async_trait]
impl<R: Rule> Rule for RetryableRule<R> {
    fn id(&self) -> &str {
        self.base_rule.id()
    }

    fn name(&self) -> &str {
        self.base_rule.name()
    }

    async fn run(&self) -> Result<RuleResult, RuleError> {
        let mut attempts: u32 = 1;
        let mut result = self.base_rule.run().await?;

        while attempts <= self.max_retries && (self.retry_condition)(&result) {
            let delay = self.backoff.delay(attempts);
            log!(
                target: self.log_target.as_str(),
                Level::Info,
                "retrying rule {} ({}/{}) after {:?}",
                self.base_rule.id(),
                attempts,
                self.max_retries,
                delay
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempts += 1;
            result = self.base_rule.run().await?;
        }

        Ok(result)
    }
}

/// Build a condition that holds when any `Errored` check message matches
/// any of the given patterns.
pub fn retry_condition_from_regex(patterns: impl IntoIterator<Item = Regex>) -> RetryCondition {
    let patterns: Vec<Regex> = patterns.into_iter().collect();
    Arc::new(move |result: &RuleResult| {
        result
            .check_results
            .iter()
            .filter(|check| check.status == Status::Errored)
            .any(|check| patterns.iter().any(|p| p.is_match(&check.message)))
    })
}
