//! Output formatters for ruleset results.

pub mod json;
pub mod plain;

use crate::ruleset::RulesetResult;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Plain text output.
    #[default]
    Plain,
    /// JSON output.
    Json,
}

/// Format a ruleset result to a string.
pub fn format(result: &RulesetResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Plain => plain::format(result, false),
        OutputFormat::Json => json::format(result),
    }
}

/// Format and print a ruleset result, coloring plain output when the
/// terminal allows it.
pub fn print_result(result: &RulesetResult, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print!("{}", plain::format(result, true)),
        OutputFormat::Json => println!("{}", json::format(result)),
    }
}
