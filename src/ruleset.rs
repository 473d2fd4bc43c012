//! Sequential execution of a rule catalog.

use crate::rule::{CheckResult, Rule, RuleResult, Status, Target};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// A named, versioned list of rules run one after another.
pub struct Ruleset {
    id: String,
    version: String,
    rules: Vec<Box<dyn Rule>>,
}

/// Results of one ruleset run, in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetResult {
    pub ruleset_id: String,
    pub ruleset_version: String,
    pub started_at: DateTime<Utc>,
    pub rules: Vec<RuleResult>,
}

impl Ruleset {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            rules: Vec::new(),
        }
    }

    /// Append a rule.
    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Append already boxed rules.
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = Box<dyn Rule>>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    /// Run every rule once, in order.
    ///
    /// A structural error from one rule becomes a single `Errored` check for
    /// that rule; the remaining rules still run.
    pub async fn run(&self) -> RulesetResult {
        let started_at = Utc::now();
        let mut results = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            info!("Running rule {} ({})", rule.id(), rule.name());
            let result = match rule.run().await {
                Ok(result) => result,
                Err(err) => {
                    warn!("Rule {} could not run: {}", rule.id(), err);
                    RuleResult::single(
                        &**rule,
                        CheckResult::errored(err.to_string(), Target::new()),
                    )
                }
            };
            results.push(result);
        }
        RulesetResult {
            ruleset_id: self.id.clone(),
            ruleset_version: self.version.clone(),
            started_at,
            rules: results,
        }
    }
}

impl RulesetResult {
    /// Most severe status across all rules.
    pub fn worst_status(&self) -> Option<Status> {
        self.rules.iter().filter_map(RuleResult::worst_status).max()
    }

    /// Number of checks per status, in severity order, zero counts omitted.
    pub fn summary(&self) -> Vec<(Status, usize)> {
        Status::all()
            .iter()
            .map(|&status| {
                let count = self.rules.iter().map(|r| r.count(status)).sum();
                (status, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    /// Whether any check failed or errored.
    pub fn has_violations(&self) -> bool {
        self.rules.iter().any(|r| {
            r.check_results
                .iter()
                .any(|c| matches!(c.status, Status::Failed | Status::Errored))
        })
    }
}
