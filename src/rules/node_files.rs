//! Permissions and ownership of kubelet files on worker nodes.
//!
//! One Ready node per worker group is inspected with `stat`. Every expected
//! file yields its own check, so a failing `stat` on one file is reported as
//! `Errored` without hiding the results for the other files.

use crate::nodes::{self, NodeSource};
use crate::pod::PodContext;
use crate::rule::{CheckResult, Rule, RuleError, RuleResult, Target};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

pub const ID: &str = "node-files";

const NAME: &str = "Kubelet files must have restrictive permissions and be owned by root (MEDIUM node-files)";

/// Mount point of the node's root filesystem inside the node pod.
const HOST_ROOT: &str = "/host";

/// A file and the permissions and owners it may have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedFile {
    pub path: String,
    /// Widest allowed mode, e.g. `0o644`.
    pub max_permissions: u32,
    pub owner_users: Vec<u32>,
    pub owner_groups: Vec<u32>,
}

impl ExpectedFile {
    /// A file owned by root with at most `max_permissions`.
    pub fn root_owned(path: impl Into<String>, max_permissions: u32) -> Self {
        Self {
            path: path.into(),
            max_permissions,
            owner_users: vec![0],
            owner_groups: vec![0, 65534],
        }
    }
}

/// Kubelet files checked by default.
pub fn kubelet_files() -> Vec<ExpectedFile> {
    vec![
        ExpectedFile::root_owned("/var/lib/kubelet/ca.crt", 0o644),
        ExpectedFile::root_owned("/var/lib/kubelet/kubeconfig-real", 0o600),
        ExpectedFile::root_owned("/var/lib/kubelet/config/kubelet", 0o644),
        ExpectedFile::root_owned("/etc/systemd/system/kubelet.service", 0o644),
    ]
}

/// Parsed `stat -Lc "%a %u %g %n"` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStat {
    permissions: u32,
    owner_user: u32,
    owner_group: u32,
}

pub struct NodeFilesRule {
    nodes: Arc<dyn NodeSource>,
    pod_context: Arc<dyn PodContext>,
    files: Vec<ExpectedFile>,
    group_label: String,
    target: Target,
}

impl NodeFilesRule {
    pub fn new(nodes: Arc<dyn NodeSource>, pod_context: Arc<dyn PodContext>) -> Self {
        Self {
            nodes,
            pod_context,
            files: kubelet_files(),
            group_label: nodes::DEFAULT_GROUP_LABEL.to_string(),
            target: Target::new(),
        }
    }

    pub fn with_files(mut self, files: Vec<ExpectedFile>) -> Self {
        self.files = files;
        self
    }

    /// Label used to group nodes into worker groups.
    pub fn with_group_label(mut self, label: impl Into<String>) -> Self {
        self.group_label = label.into();
        self
    }

    /// Base target every check is derived from.
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    async fn check_group(&self, node_name: &str, group_target: &Target) -> Vec<CheckResult> {
        let commands: Vec<String> = self
            .files
            .iter()
            .map(|f| format!("stat -Lc \"%a %u %g %n\" {}{}", HOST_ROOT, f.path))
            .collect();
        let mut outputs = self
            .pod_context
            .run_commands_on_node(node_name, &commands)
            .await
            .into_iter();

        let mut checks = Vec::new();
        for file in &self.files {
            let file_target = group_target.with("details", format!("fileName: {}", file.path));
            match outputs.next() {
                Some(Ok(output)) => match parse_stat(&output) {
                    Some(stat) => checks.extend(evaluate(file, stat, group_target)),
                    None => checks.push(CheckResult::errored(
                        format!("could not parse stat output: {:?}", output.trim()),
                        file_target,
                    )),
                },
                Some(Err(err)) => checks.push(CheckResult::errored(err.to_string(), file_target)),
                None => checks.push(CheckResult::errored(
                    format!("no result for file {} on node {}", file.path, node_name),
                    file_target,
                )),
            }
        }
        checks
    }
}

#[async_trait]
impl Rule for NodeFilesRule {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self) -> Result<RuleResult, RuleError> {
        if self.files.is_empty() {
            return Err(RuleError::InvalidConfiguration(
                "no files configured".to_string(),
            ));
        }

        let nodes = match self.nodes.list_nodes().await {
            Ok(nodes) => nodes,
            Err(err) => {
                return Ok(RuleResult::single(
                    self,
                    CheckResult::errored(err, self.target.with("kind", "nodeList")),
                ));
            }
        };

        let groups = nodes::ready_node_per_group(&nodes, &self.group_label);
        if groups.is_empty() {
            return Ok(RuleResult::single(
                self,
                CheckResult::warning(
                    format!("There are no nodes with label {}.", self.group_label),
                    self.target.with("kind", "nodeList"),
                ),
            ));
        }

        let mut checks = Vec::new();
        for (group, node) in groups {
            let group_target = self
                .target
                .with("kind", "workerGroup")
                .with("name", group.as_str());
            match node {
                Some(node) => {
                    let node_name = nodes::node_name(node);
                    debug!("Checking files of worker group {} on node {}", group, node_name);
                    checks.extend(self.check_group(node_name, &group_target).await);
                }
                None => checks.push(CheckResult::warning(
                    "There are no nodes in Ready state for worker group.",
                    group_target,
                )),
            }
        }

        Ok(RuleResult::new(self, checks))
    }
}

fn parse_stat(output: &str) -> Option<FileStat> {
    let mut fields = output.split_whitespace();
    let permissions = u32::from_str_radix(fields.next()?, 8).ok()?;
    let owner_user = fields.next()?.parse().ok()?;
    let owner_group = fields.next()?.parse().ok()?;
    fields.next()?;
    Some(FileStat {
        permissions,
        owner_user,
        owner_group,
    })
}

fn evaluate(file: &ExpectedFile, stat: FileStat, group_target: &Target) -> Vec<CheckResult> {
    let mut checks = Vec::new();
    if stat.permissions & !file.max_permissions != 0 {
        checks.push(CheckResult::failed(
            "File has too wide permissions",
            group_target.with(
                "details",
                format!(
                    "fileName: {}, permissions: {:o}, expectedPermissionsMax: {:o}",
                    file.path, stat.permissions, file.max_permissions
                ),
            ),
        ));
    }
    if !file.owner_users.contains(&stat.owner_user) {
        checks.push(CheckResult::failed(
            "File has unexpected owner user",
            group_target.with(
                "details",
                format!(
                    "fileName: {}, ownerUser: {}, expectedOwnerUsers: {:?}",
                    file.path, stat.owner_user, file.owner_users
                ),
            ),
        ));
    }
    if !file.owner_groups.contains(&stat.owner_group) {
        checks.push(CheckResult::failed(
            "File has unexpected owner group",
            group_target.with(
                "details",
                format!(
                    "fileName: {}, ownerGroup: {}, expectedOwnerGroups: {:?}",
                    file.path, stat.owner_group, file.owner_groups
                ),
            ),
        ));
    }
    if checks.is_empty() {
        checks.push(CheckResult::passed(
            "File has expected permissions and expected owner",
            group_target.with(
                "details",
                format!(
                    "fileName: {}, permissions: {:o}, ownerUser: {}, ownerGroup: {}",
                    file.path, stat.permissions, stat.owner_user, stat.owner_group
                ),
            ),
        ));
    }
    checks
}
