//! JSON formatter.

use crate::rule::{RuleResult, Status};
use crate::ruleset::RulesetResult;
use serde::Serialize;
use std::collections::BTreeMap;

/// Format a ruleset result as JSON.
pub fn format(result: &RulesetResult) -> String {
    let output = JsonOutput::from(result);
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    ruleset_id: &'a str,
    ruleset_version: &'a str,
    started_at: String,
    rules: &'a [RuleResult],
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonSummary {
    worst_status: Option<Status>,
    total_checks: usize,
    counts: BTreeMap<String, usize>,
    passed: bool,
}

impl<'a> From<&'a RulesetResult> for JsonOutput<'a> {
    fn from(result: &'a RulesetResult) -> Self {
        let summary = result.summary();
        Self {
            ruleset_id: &result.ruleset_id,
            ruleset_version: &result.ruleset_version,
            started_at: result.started_at.to_rfc3339(),
            rules: &result.rules,
            summary: JsonSummary {
                worst_status: result.worst_status(),
                total_checks: summary.iter().map(|(_, count)| count).sum(),
                counts: summary
                    .into_iter()
                    .map(|(status, count)| (status.to_string(), count))
                    .collect(),
                passed: !result.has_violations(),
            },
        }
    }
}
