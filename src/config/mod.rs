pub mod types;

pub use types::{
    BackoffKind, Config, NodesConfig, PodConfig, RetryConfig, RulesConfig, SkipRuleConfig,
};

use crate::error::ConfigError;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "kubecomply.toml";

/// Get the global config file path (~/.kubecomply.toml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(format!(".{}", CONFIG_FILE_NAME)))
}

/// Get the local config file path (./kubecomply.toml)
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// Load configuration.
///
/// An explicit path must exist. Otherwise the local file is tried first,
/// then the global one, then defaults. The result is validated.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(path) => read_config(path)?,
        None => {
            let candidates = [
                Some(local_config_path(Path::new("."))),
                global_config_path(),
            ];
            match candidates.into_iter().flatten().find(|p| p.is_file()) {
                Some(found) => read_config(&found)?,
                None => Config::default(),
            }
        }
    };
    config.validate()?;
    Ok(config)
}

/// Read and parse one config file without validating it.
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    debug!("Loading configuration from {}", path.display());
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn parse_config(content: &str) -> Result<Config, String> {
    toml::from_str(content).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Backoff, CheckResult, RuleResult, SkipRule, Status, Target};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pod.namespace, "kube-system");
        assert_eq!(config.pod.name_prefix, "kubecomply-node-");
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.nodes.group_label, "worker.gardener.cloud/pool");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            [pod]
            namespace = "audit"

            [retry]
            max_retries = 3
            patterns = ["(?i)connection refused"]
            backoff = "exponential"
            delay_ms = 100
            max_delay_ms = 400

            [[rules.skipped]]
            id = "242384"
            name = "Scheduler secure binding"
            justification = "No scheduler."
            status = "Accepted"
            "#,
        )
        .unwrap();

        assert_eq!(config.pod.namespace, "audit");
        assert_eq!(config.pod.exec_timeout_secs, 60);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(
            config.retry.backoff(),
            Backoff::Exponential {
                initial: Duration::from_millis(100),
                max: Duration::from_millis(400)
            }
        );
        assert_eq!(config.rules.skipped[0].status, Status::Accepted);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_condition_from_config() {
        let config = parse_config("[retry]\npatterns = [\"(?i)timed out\"]\n").unwrap();
        let condition = config.retry.condition().unwrap();
        let rule = SkipRule::new("1", "r", "", Status::Skipped);

        let timed_out = CheckResult::errored("executing command timed out after 60s", Target::new());
        assert!(condition(&RuleResult::single(&rule, timed_out)));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = parse_config("[retry]\npatterns = [\"(unclosed\"]\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_invalid_skip_status_is_rejected() {
        let config = parse_config(
            "[[rules.skipped]]\nid = \"1\"\nname = \"n\"\njustification = \"j\"\nstatus = \"Failed\"\n",
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSkipStatus { .. })
        ));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[nodes]\ngroup_label = \"pool\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.nodes.group_label, "pool");
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = TempDir::new().unwrap();
        let result = load_config(Some(&dir.path().join("missing.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[pod\nnamespace = ").unwrap();
        assert!(matches!(
            load_config(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }
}
