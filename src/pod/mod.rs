//! Node command execution.
//!
//! A [`PodContext`] runs an ordered batch of shell commands on a named
//! cluster node and returns one result per command, in input order.
//!
//! [`NodePodContext`] implements the contract on top of a [`PodBackend`]:
//!
//! ```text
//!  node ready? ──no──▶ every command: NodeNotReady
//!      │yes
//!      ▼
//!  create <prefix><suffix> pinned to node ──rejected──▶ every command: that error
//!      │                                                (pod not ours, left alone)
//!      ▼
//!  wait running (ready timeout) ──fail──▶ every command: that error
//!      │
//!      ▼
//!  exec cmd[0..n] in order (exec timeout each, failures recorded per index)
//!      │
//!      ▼
//!  delete pod (always; a drop guard covers cancellation)
//! ```

pub mod cluster;
pub mod fake;
pub mod generator;

pub use cluster::{KubePodBackend, KubePodContext};
pub use fake::{FakeExec, FakePodBackend, FakePodContext};
pub use generator::{
    NameGenerator, RandomNameGenerator, SequentialNameGenerator, default_generator,
};

use async_trait::async_trait;
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default prefix of ephemeral pod names.
pub const DEFAULT_NAME_PREFIX: &str = "kubecomply-node-";

/// Default time allowed for an ephemeral pod to start running.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(120);

/// Default time allowed for a single command.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(60);

/// Failure of a single command (or of the pod it would have run in).
///
/// `Remote` and `Transport` display the raw message unchanged so that
/// callers can match on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    /// The command ran and failed; carries the remote status and stderr.
    #[error("{0}")]
    Remote(String),

    /// The exec channel or the cluster API failed.
    #[error("{0}")]
    Transport(String),

    #[error("{operation} timed out after {}s", .after.as_secs_f64())]
    Timeout { operation: String, after: Duration },

    /// The ephemeral pod could not be created or never started.
    #[error("{0}")]
    Scheduling(String),

    #[error("node {0} is not ready or not schedulable")]
    NodeNotReady(String),

    /// Pre-scripted failure from a fake context.
    #[error("{0}")]
    Script(String),
}

impl ExecError {
    /// Whether retrying the same command may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout { .. } | Self::Scheduling(_)
        )
    }
}

/// Runs shell commands on cluster nodes.
#[async_trait]
pub trait PodContext: Send + Sync {
    /// Run `commands` in order on `node_name`.
    ///
    /// The returned vector always has one entry per command, at the
    /// command's index. A failing command does not stop later ones.
    async fn run_commands_on_node(
        &self,
        node_name: &str,
        commands: &[String],
    ) -> Vec<Result<String, ExecError>>;
}

/// Cluster operations needed to host a command batch.
#[async_trait]
pub trait PodBackend: Send + Sync + 'static {
    /// Whether the node is Ready and schedulable.
    async fn node_ready(&self, node_name: &str) -> Result<bool, ExecError>;

    /// Create an ephemeral pod pinned to `node_name`.
    async fn create_pod(&self, pod_name: &str, node_name: &str) -> Result<(), ExecError>;

    /// Resolve once the pod is running; error if it can never run.
    async fn wait_running(&self, pod_name: &str) -> Result<(), ExecError>;

    /// Run one shell command in the pod and return its stdout.
    async fn exec(&self, pod_name: &str, command: &str) -> Result<String, ExecError>;

    /// Delete the pod. Deleting a missing pod succeeds.
    async fn delete_pod(&self, pod_name: &str) -> Result<(), ExecError>;
}

/// [`PodContext`] that schedules one ephemeral pod per batch.
pub struct NodePodContext<B: PodBackend> {
    backend: Arc<B>,
    generator: Arc<dyn NameGenerator>,
    name_prefix: String,
    ready_timeout: Duration,
    exec_timeout: Duration,
}

impl<B: PodBackend> NodePodContext<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            generator: default_generator(),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
        }
    }

    /// Use `generator` for pod name suffixes.
    pub fn with_generator(mut self, generator: Arc<dyn NameGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn run_in_pod(
        &self,
        pod_name: &str,
        node_name: &str,
        commands: &[String],
    ) -> Vec<Result<String, ExecError>> {
        let started = with_timeout(
            "waiting for pod to run",
            self.ready_timeout,
            self.backend.wait_running(pod_name),
        )
        .await;
        if let Err(err) = started {
            warn!("Pod {} on node {} did not start: {}", pod_name, node_name, err);
            return fail_all(commands, err);
        }

        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            let result = with_timeout(
                "executing command",
                self.exec_timeout,
                self.backend.exec(pod_name, command),
            )
            .await;
            if let Err(err) = &result {
                debug!("Command on node {} failed: {}", node_name, err);
            }
            results.push(result);
        }
        results
    }
}

#[async_trait]
impl<B: PodBackend> PodContext for NodePodContext<B> {
    async fn run_commands_on_node(
        &self,
        node_name: &str,
        commands: &[String],
    ) -> Vec<Result<String, ExecError>> {
        let ready = with_timeout(
            "reading node status",
            self.ready_timeout,
            self.backend.node_ready(node_name),
        )
        .await;
        match ready {
            Ok(true) => {}
            Ok(false) => return fail_all(commands, ExecError::NodeNotReady(node_name.to_string())),
            Err(err) => return fail_all(commands, err),
        }

        let pod_name = format!(
            "{}{}",
            self.name_prefix,
            self.generator.generate(generator::SUFFIX_LEN)
        );
        debug!("Running {} command(s) on node {} in pod {}", commands.len(), node_name, pod_name);

        // Armed before creation: a create that times out or is cancelled may
        // still land. A rejected create means the name is not ours.
        let mut guard = PodGuard::new(self.backend.clone(), pod_name.clone());
        let created = with_timeout(
            "creating pod",
            self.ready_timeout,
            self.backend.create_pod(&pod_name, node_name),
        )
        .await;
        match created {
            Ok(()) => {}
            Err(err @ ExecError::Timeout { .. }) => {
                warn!("Creating pod {} on node {} timed out", pod_name, node_name);
                guard.release().await;
                return fail_all(commands, err);
            }
            Err(err) => {
                warn!("Pod {} on node {} was not created: {}", pod_name, node_name, err);
                guard.disarm();
                return fail_all(commands, err);
            }
        }

        let results = self.run_in_pod(&pod_name, node_name, commands).await;
        guard.release().await;
        results
    }
}

/// Deletes the ephemeral pod when the batch ends, including when the batch
/// future is dropped before completion.
struct PodGuard<B: PodBackend> {
    backend: Arc<B>,
    pod_name: String,
    armed: bool,
}

impl<B: PodBackend> PodGuard<B> {
    fn new(backend: Arc<B>, pod_name: String) -> Self {
        Self {
            backend,
            pod_name,
            armed: true,
        }
    }

    /// Give up ownership without deleting.
    fn disarm(&mut self) {
        self.armed = false;
    }

    async fn release(mut self) {
        let result = self.backend.delete_pod(&self.pod_name).await;
        self.armed = false;
        match result {
            Ok(()) => debug!("Deleted pod {}", self.pod_name),
            Err(err) => warn!("Failed to delete pod {}: {}", self.pod_name, err),
        }
    }
}

impl<B: PodBackend> Drop for PodGuard<B> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let backend = self.backend.clone();
        let pod_name = std::mem::take(&mut self.pod_name);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = backend.delete_pod(&pod_name).await {
                        warn!("Failed to delete pod {} after cancellation: {}", pod_name, err);
                    }
                });
            }
            Err(_) => warn!("No async runtime left to delete pod {}", pod_name),
        }
    }
}

async fn with_timeout<T>(
    operation: &str,
    after: Duration,
    fut: impl Future<Output = Result<T, ExecError>>,
) -> Result<T, ExecError> {
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(ExecError::Timeout {
            operation: operation.to_string(),
            after,
        }),
    }
}

fn fail_all(commands: &[String], err: ExecError) -> Vec<Result<String, ExecError>> {
    commands.iter().map(|_| Err(err.clone())).collect()
}
