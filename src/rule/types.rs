//! Core result types for rule runs.
//!
//! - `Status` - Check outcome with a fixed severity order
//! - `Target` - Ordered key/value locator of the checked thing
//! - `CheckResult` - A single evaluated assertion
//! - `RuleResult` - All checks produced by one rule invocation

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::Rule;

/// Outcome of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// The check is satisfied.
    Passed,
    /// The rule is skipped with an explanation.
    Skipped,
    /// A violation is accepted and justified by configuration.
    Accepted,
    /// Ambiguity, the check was not performed with confidence.
    Warning,
    /// The check reported a violation.
    Failed,
    /// An unexpected error occurred while gathering evidence.
    Errored,
    /// The rule or check is not implemented.
    #[serde(rename = "Not Implemented")]
    NotImplemented,
}

/// Ascending severity. Maintained by hand: new statuses may land anywhere.
const ORDERED_STATUSES: [Status; 7] = [
    Status::Passed,
    Status::Skipped,
    Status::Accepted,
    Status::Warning,
    Status::Failed,
    Status::Errored,
    Status::NotImplemented,
];

impl Status {
    /// All statuses in ascending severity.
    pub fn all() -> &'static [Status] {
        &ORDERED_STATUSES
    }

    fn rank(&self) -> usize {
        ORDERED_STATUSES
            .iter()
            .position(|s| s == self)
            .unwrap_or(ORDERED_STATUSES.len())
    }

    /// True iff `self` is strictly less severe than `other`.
    pub fn less(&self, other: Status) -> bool {
        self.rank() < other.rank()
    }

    /// Display glyph for the status.
    pub fn icon(&self) -> char {
        match self {
            Self::Passed => '🟢',
            Self::Failed | Self::Errored => '🔴',
            Self::Skipped | Self::Accepted => '🔵',
            Self::Warning | Self::NotImplemented => '🟠',
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "Passed",
            Self::Skipped => "Skipped",
            Self::Accepted => "Accepted",
            Self::Warning => "Warning",
            Self::Failed => "Failed",
            Self::Errored => "Errored",
            Self::NotImplemented => "Not Implemented",
        }
    }
}

/// Icon for a status given by name, with a neutral glyph for unknown names.
pub fn status_icon(name: &str) -> char {
    name.parse::<Status>().map(|s| s.icon()).unwrap_or('⚪')
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ORDERED_STATUSES
            .iter()
            .find(|status| status.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown status: {}", s))
    }
}

impl Ord for Status {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Status {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The thing a check was performed against.
///
/// An ordered list of key/value pairs. Values are never mutated in place:
/// [`Target::with`] hands back a new target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Target {
    pairs: Vec<(String, String)>,
}

impl Target {
    /// Create an empty target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a target from pairs, applied in order as by [`Target::with`].
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |target, (k, v)| target.with(k, v))
    }

    /// Return a new target with `key` set to `value`.
    ///
    /// A new key is appended; an existing key keeps its position and takes
    /// the new value. The receiver is left untouched.
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        let mut pairs = self.pairs.clone();
        match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => pairs.push((key, value)),
        }
        Self { pairs }
    }

    /// Look up the value stored for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over the pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        write!(f, "{}", rendered.join(", "))
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (k, v) in &self.pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // serde_json::Map without preserve_order sorts keys, so go through a
        // sequence-preserving visitor instead.
        struct TargetVisitor;

        impl<'de> serde::de::Visitor<'de> for TargetVisitor {
            type Value = Target;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of string keys to string values")
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(self, mut access: A) -> Result<Target, A::Error> {
                let mut target = Target::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    target = target.with(k, v);
                }
                Ok(target)
            }
        }

        deserializer.deserialize_map(TargetVisitor)
    }
}

/// One evaluated assertion produced by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: Status,
    pub message: String,
    pub target: Target,
}

impl CheckResult {
    /// Create a check result with an explicit status.
    pub fn new(status: Status, message: impl Into<String>, target: Target) -> Self {
        Self {
            status,
            message: message.into(),
            target,
        }
    }

    pub fn passed(message: impl Into<String>, target: Target) -> Self {
        Self::new(Status::Passed, message, target)
    }

    pub fn failed(message: impl Into<String>, target: Target) -> Self {
        Self::new(Status::Failed, message, target)
    }

    pub fn warning(message: impl Into<String>, target: Target) -> Self {
        Self::new(Status::Warning, message, target)
    }

    pub fn errored(message: impl Into<String>, target: Target) -> Self {
        Self::new(Status::Errored, message, target)
    }

    pub fn skipped(message: impl Into<String>, target: Target) -> Self {
        Self::new(Status::Skipped, message, target)
    }

    pub fn accepted(message: impl Into<String>, target: Target) -> Self {
        Self::new(Status::Accepted, message, target)
    }

    pub fn not_implemented(message: impl Into<String>, target: Target) -> Self {
        Self::new(Status::NotImplemented, message, target)
    }
}

/// The ordered checks produced by one rule invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub rule_name: String,
    pub check_results: Vec<CheckResult>,
}

impl RuleResult {
    /// Create a result for `rule` holding `checks` in the given order.
    pub fn new<R: Rule + ?Sized>(rule: &R, checks: Vec<CheckResult>) -> Self {
        Self {
            rule_id: rule.id().to_string(),
            rule_name: rule.name().to_string(),
            check_results: checks,
        }
    }

    /// Create a result for `rule` holding exactly one check.
    pub fn single<R: Rule + ?Sized>(rule: &R, check: CheckResult) -> Self {
        Self::new(rule, vec![check])
    }

    /// The most severe status among the checks.
    pub fn worst_status(&self) -> Option<Status> {
        self.check_results.iter().map(|c| c.status).max()
    }

    /// Number of checks with the given status.
    pub fn count(&self, status: Status) -> usize {
        self.check_results
            .iter()
            .filter(|c| c.status == status)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering() {
        assert!(Status::Passed.less(Status::Skipped));
        assert!(Status::Warning.less(Status::Failed));
        assert!(Status::Failed.less(Status::Errored));
        assert!(Status::Errored.less(Status::NotImplemented));
        assert!(!Status::Errored.less(Status::Warning));
        assert!(!Status::Failed.less(Status::Failed));
        assert!(Status::Errored > Status::Warning);
    }

    #[test]
    fn test_status_all_is_ascending() {
        let all = Status::all();
        assert_eq!(all.len(), 7);
        for pair in all.windows(2) {
            assert!(pair[0].less(pair[1]));
        }
    }

    #[test]
    fn test_status_icons() {
        assert_eq!(Status::Passed.icon(), '🟢');
        assert_eq!(Status::Failed.icon(), '🔴');
        assert_eq!(Status::Errored.icon(), '🔴');
        assert_eq!(Status::Skipped.icon(), '🔵');
        assert_eq!(Status::Accepted.icon(), '🔵');
        assert_eq!(Status::Warning.icon(), '🟠');
        assert_eq!(Status::NotImplemented.icon(), '🟠');
        assert_eq!(status_icon("Not Implemented"), '🟠');
        assert_eq!(status_icon("Unknown"), '⚪');
    }

    #[test]
    fn test_status_names() {
        assert_eq!("Not Implemented".parse::<Status>(), Ok(Status::NotImplemented));
        assert_eq!(Status::Accepted.to_string(), "Accepted");
        assert!("passed".parse::<Status>().is_err());
        assert_eq!(
            serde_json::to_string(&Status::NotImplemented).unwrap(),
            "\"Not Implemented\""
        );
    }

    #[test]
    fn test_target_with_does_not_mutate() {
        let base = Target::new().with("cluster", "shoot");
        let first = base.with("name", "node1");
        let second = base.with("name", "node2");

        assert_eq!(base.len(), 1);
        assert_ne!(base, first);
        assert_eq!(first.get("name"), Some("node1"));
        assert_eq!(second.get("name"), Some("node2"));
    }

    #[test]
    fn test_target_with_existing_key_keeps_position() {
        let target = Target::from_pairs([("kind", "pod"), ("details", "a"), ("name", "x")]);
        let updated = target.with("details", "b");

        let keys: Vec<&str> = updated.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["kind", "details", "name"]);
        assert_eq!(updated.get("details"), Some("b"));
        assert_eq!(target.get("details"), Some("a"));
    }

    #[test]
    fn test_target_equality_is_ordered() {
        let a = Target::from_pairs([("a", "1"), ("b", "2")]);
        let b = Target::from_pairs([("b", "2"), ("a", "1")]);
        assert_ne!(a, b);
        assert_eq!(a, Target::new().with("a", "1").with("b", "2"));
    }

    #[test]
    fn test_target_json_keeps_order() {
        let target = Target::from_pairs([("name", "n"), ("kind", "node"), ("cluster", "shoot")]);
        let json = serde_json::to_string(&target).unwrap();
        assert_eq!(json, r#"{"name":"n","kind":"node","cluster":"shoot"}"#);

        let back: Target = serde_json::from_str(&json).unwrap();
        assert_eq!(back, target);
    }

    #[test]
    fn test_check_result_constructors() {
        let target = Target::new().with("kind", "node");
        assert_eq!(CheckResult::passed("ok", target.clone()).status, Status::Passed);
        assert_eq!(CheckResult::failed("no", target.clone()).status, Status::Failed);
        assert_eq!(CheckResult::warning("hm", target.clone()).status, Status::Warning);
        assert_eq!(CheckResult::errored("err", target.clone()).status, Status::Errored);
        assert_eq!(CheckResult::skipped("skip", target.clone()).status, Status::Skipped);
        assert_eq!(CheckResult::accepted("acc", target.clone()).status, Status::Accepted);
        let c = CheckResult::not_implemented("todo", target.clone());
        assert_eq!(c.status, Status::NotImplemented);
        assert_eq!(c.message, "todo");
        assert_eq!(c.target, target);
    }
}
