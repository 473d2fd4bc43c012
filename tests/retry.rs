//! Retry decorator behaviour against scripted rules.

use async_trait::async_trait;
use kubecomply::rule::{
    Backoff, CheckResult, RetryableRule, Rule, RuleError, RuleResult, Status, Target,
    retry_condition_from_regex,
};
use regex::Regex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Returns the scripted message of its n-th run as an Errored check, then
/// keeps repeating the last one.
struct ScriptedRule {
    messages: Vec<&'static str>,
    runs: Arc<AtomicUsize>,
}

impl ScriptedRule {
    fn new(messages: Vec<&'static str>) -> (Self, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (
            Self {
                messages,
                runs: runs.clone(),
            },
            runs,
        )
    }
}

#[async_trait]
impl Rule for ScriptedRule {
    fn id(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "Scripted rule"
    }

    async fn run(&self) -> Result<RuleResult, RuleError> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        let message = self.messages[run.min(self.messages.len() - 1)];
        let check = if message == "ok" {
            CheckResult::passed(message, Target::new())
        } else {
            CheckResult::errored(message, Target::new())
        };
        Ok(RuleResult::single(self, check))
    }
}

#[tokio::test]
async fn retries_until_condition_clears() {
    let (rule, runs) = ScriptedRule::new(vec!["connection refused", "connection refused", "ok"]);
    let rule = RetryableRule::new(rule)
        .with_max_retries(5)
        .with_shared_condition(retry_condition_from_regex([
            Regex::new("(?i)connection refused").unwrap(),
        ]));

    let result = rule.run().await.unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(result.check_results[0].status, Status::Passed);
    assert_eq!(result.rule_id, "scripted");
}

#[tokio::test]
async fn gives_up_after_max_retries_and_returns_last_result() {
    let (rule, runs) = ScriptedRule::new(vec!["timed out 1", "timed out 2", "timed out 3"]);
    let rule = RetryableRule::new(rule)
        .with_max_retries(2)
        .with_shared_condition(retry_condition_from_regex([
            Regex::new("timed out").unwrap(),
        ]));

    let result = rule.run().await.unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(result.check_results[0].message, "timed out 3");
}

#[tokio::test]
async fn non_matching_error_is_not_retried() {
    let (rule, runs) = ScriptedRule::new(vec!["permission denied", "ok"]);
    let rule = RetryableRule::new(rule)
        .with_max_retries(3)
        .with_shared_condition(retry_condition_from_regex([
            Regex::new("connection refused").unwrap(),
        ]));

    let result = rule.run().await.unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(result.check_results[0].status, Status::Errored);
}

#[tokio::test(start_paused = true)]
async fn backoff_waits_between_attempts() {
    let (rule, runs) = ScriptedRule::new(vec!["busy", "busy", "ok"]);
    let rule = RetryableRule::new(rule)
        .with_max_retries(2)
        .with_retry_condition(|result: &RuleResult| {
            result.worst_status() == Some(Status::Errored)
        })
        .with_backoff(Backoff::Constant(Duration::from_secs(5)));

    let started = tokio::time::Instant::now();
    let result = rule.run().await.unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(result.check_results[0].status, Status::Passed);
    assert!(started.elapsed() >= Duration::from_secs(10));
}
