//! Plain text formatter.

use crate::rule::{Status, Target};
use crate::ruleset::RulesetResult;
use colored::{ColoredString, Colorize};

/// Format a ruleset result as plain text.
pub fn format(result: &RulesetResult, color: bool) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Ruleset {} {} ({})\n\n",
        result.ruleset_id,
        result.ruleset_version,
        result.started_at.to_rfc3339()
    ));

    for rule in &result.rules {
        let status = rule.worst_status();
        let header = match status {
            Some(status) => format!(
                "{} [{}] {} {}\n",
                status.icon(),
                paint(status, color),
                rule.rule_id,
                rule.rule_name
            ),
            None => format!("[no checks] {} {}\n", rule.rule_id, rule.rule_name),
        };
        output.push_str(&header);

        for check in &rule.check_results {
            output.push_str(&format!(
                "  {} {}: {}{}\n",
                check.status.icon(),
                paint(check.status, color),
                check.message,
                describe_target(&check.target)
            ));
        }
    }

    let summary = result.summary();
    if summary.is_empty() {
        output.push_str("\nNo checks were run.\n");
    } else {
        let parts: Vec<String> = summary
            .iter()
            .map(|(status, count)| format!("{} {}", count, status))
            .collect();
        output.push_str(&format!("\nSummary: {}\n", parts.join(", ")));
    }

    output
}

fn describe_target(target: &Target) -> String {
    if target.is_empty() {
        String::new()
    } else {
        format!(" ({})", target)
    }
}

fn paint(status: Status, color: bool) -> ColoredString {
    let text = status.as_str();
    if !color {
        return text.normal();
    }
    match status {
        Status::Passed => text.green(),
        Status::Skipped | Status::Accepted => text.blue(),
        Status::Warning => text.yellow(),
        Status::Failed | Status::Errored => text.red().bold(),
        Status::NotImplemented => text.dimmed(),
    }
}
