//! Kubernetes-backed node pods.
//!
//! Creates a privileged pod pinned to the node with the host root mounted
//! at `/host` and the host PID namespace, then runs commands through the
//! pod exec subresource.
//!
//! # Prerequisites
//!
//! - Valid kubeconfig (uses default context or specified context)
//! - RBAC permissions to get nodes and to create, exec into and delete pods
//!   in the control namespace

use super::{ExecError, NodePodContext, PodBackend};
use crate::config::PodConfig;
use crate::nodes;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::Client;
use kube::api::{Api, AttachParams, DeleteParams, PostParams};
use kube::runtime::wait::await_condition;
use log::debug;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Node pods running against a real cluster.
pub type KubePodContext = NodePodContext<KubePodBackend>;

/// Label put on every ephemeral pod.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

const CONTAINER_NAME: &str = "node-exec";

/// Upper bound on the lifetime of a pod whose deletion never happened.
const POD_LIFETIME_SECS: &str = "3600";

/// [`PodBackend`] talking to the Kubernetes API.
#[derive(Clone)]
pub struct KubePodBackend {
    nodes: Api<Node>,
    pods: Api<Pod>,
    namespace: String,
    image: String,
}

impl KubePodBackend {
    /// Create a backend placing pods in `namespace` using `image`.
    pub fn new(client: Client, namespace: impl Into<String>, image: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            nodes: Api::all(client.clone()),
            pods: Api::namespaced(client, &namespace),
            namespace,
            image: image.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn manifest(&self, pod_name: &str, node_name: &str) -> Result<Pod, ExecError> {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": pod_name,
                "namespace": self.namespace,
                "labels": {
                    "app.kubernetes.io/managed-by": "kubecomply",
                },
            },
            "spec": {
                "nodeName": node_name,
                "hostPID": true,
                "restartPolicy": "Never",
                "automountServiceAccountToken": false,
                "terminationGracePeriodSeconds": 0,
                "tolerations": [{ "operator": "Exists" }],
                "containers": [{
                    "name": CONTAINER_NAME,
                    "image": self.image,
                    "command": ["sleep", POD_LIFETIME_SECS],
                    "securityContext": { "privileged": true },
                    "volumeMounts": [{
                        "name": "host-root",
                        "mountPath": "/host",
                        "readOnly": true,
                    }],
                }],
                "volumes": [{
                    "name": "host-root",
                    "hostPath": { "path": "/" },
                }],
            },
        }))
        .map_err(|e| ExecError::Scheduling(format!("invalid pod manifest: {}", e)))
    }
}

#[async_trait]
impl PodBackend for KubePodBackend {
    async fn node_ready(&self, node_name: &str) -> Result<bool, ExecError> {
        let node = self
            .nodes
            .get(node_name)
            .await
            .map_err(|e| ExecError::Transport(e.to_string()))?;
        Ok(nodes::is_node_schedulable(&node))
    }

    async fn create_pod(&self, pod_name: &str, node_name: &str) -> Result<(), ExecError> {
        let pod = self.manifest(pod_name, node_name)?;
        self.pods
            .create(&PostParams::default(), &pod)
            .await
            .map_err(|e| ExecError::Scheduling(e.to_string()))?;
        debug!("Created pod {}/{} on node {}", self.namespace, pod_name, node_name);
        Ok(())
    }

    async fn wait_running(&self, pod_name: &str) -> Result<(), ExecError> {
        let settled = |pod: Option<&Pod>| {
            pod_phase(pod).is_some_and(|phase| phase != "Pending")
        };
        let pod = await_condition(self.pods.clone(), pod_name, settled)
            .await
            .map_err(|e| ExecError::Scheduling(e.to_string()))?;
        match pod_phase(pod.as_ref()) {
            Some("Running") => Ok(()),
            Some(phase) => Err(ExecError::Scheduling(format!(
                "pod {} is in phase {}",
                pod_name, phase
            ))),
            None => Err(ExecError::Scheduling(format!("pod {} disappeared", pod_name))),
        }
    }

    async fn exec(&self, pod_name: &str, command: &str) -> Result<String, ExecError> {
        let params = AttachParams::default()
            .container(CONTAINER_NAME)
            .stdin(false)
            .stdout(true)
            .stderr(true);
        let mut attached = self
            .pods
            .exec(pod_name, ["/bin/sh", "-c", command], &params)
            .await
            .map_err(|e| ExecError::Transport(e.to_string()))?;

        let stdout = attached.stdout();
        let stderr = attached.stderr();
        let status = attached.take_status();
        let (stdout, stderr) = tokio::join!(read_all(stdout), read_all(stderr));
        let (stdout, stderr) = (stdout?, stderr?);
        let status = match status {
            Some(status) => status.await,
            None => None,
        };

        match failure_message(status.as_ref(), &stderr) {
            Some(message) => Err(ExecError::Remote(message)),
            None => Ok(stdout),
        }
    }

    async fn delete_pod(&self, pod_name: &str) -> Result<(), ExecError> {
        let params = DeleteParams {
            grace_period_seconds: Some(0),
            ..DeleteParams::default()
        };
        match self.pods.delete(pod_name, &params).await {
            Ok(_) => Ok(()),
            Err(err) => {
                // Treat a pod that is already gone as deleted.
                let gone = self
                    .pods
                    .get_opt(pod_name)
                    .await
                    .map(|pod| pod.is_none())
                    .unwrap_or(false);
                if gone {
                    Ok(())
                } else {
                    Err(ExecError::Transport(err.to_string()))
                }
            }
        }
    }
}

impl KubePodContext {
    /// Build a context for the cluster behind `client` from pod settings.
    pub fn from_config(client: Client, config: &PodConfig) -> Self {
        NodePodContext::new(KubePodBackend::new(
            client,
            config.namespace.clone(),
            config.image.clone(),
        ))
        .with_name_prefix(config.name_prefix.clone())
        .with_ready_timeout(Duration::from_secs(config.ready_timeout_secs))
        .with_exec_timeout(Duration::from_secs(config.exec_timeout_secs))
    }

    /// Same as [`KubePodContext::from_config`], shared.
    pub fn shared(client: Client, config: &PodConfig) -> Arc<Self> {
        Arc::new(Self::from_config(client, config))
    }
}

fn pod_phase(pod: Option<&Pod>) -> Option<&str> {
    pod.and_then(|p| p.status.as_ref())
        .and_then(|s| s.phase.as_deref())
}

async fn read_all(reader: Option<impl AsyncRead + Unpin>) -> Result<String, ExecError> {
    let Some(mut reader) = reader else {
        return Ok(String::new());
    };
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .await
        .map_err(|e| ExecError::Transport(e.to_string()))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Error text of a failed exec: the status message followed by stderr, both
/// unchanged.
fn failure_message(status: Option<&Status>, stderr: &str) -> Option<String> {
    let status = status?;
    if status.status.as_deref() != Some("Failure") {
        return None;
    }
    let message = status.message.clone().unwrap_or_default();
    Some(match (message.is_empty(), stderr.is_empty()) {
        (_, true) => message,
        (true, false) => stderr.to_string(),
        (false, false) => format!("{}: {}", message, stderr),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(outcome: &str, message: Option<&str>) -> Status {
        Status {
            status: Some(outcome.to_string()),
            message: message.map(str::to_string),
            ..Status::default()
        }
    }

    #[test]
    fn test_success_status_is_not_a_failure() {
        assert_eq!(failure_message(Some(&status("Success", None)), "warning"), None);
        assert_eq!(failure_message(None, "anything"), None);
    }

    #[test]
    fn test_failure_message_keeps_stderr_verbatim() {
        let failed = status("Failure", Some("command terminated with non-zero exit code: error executing command [/bin/sh -c stat /x], exit code 1"));
        let message = failure_message(Some(&failed), "stat: cannot stat '/x': No such file or directory\n").unwrap();
        assert!(message.starts_with("command terminated with non-zero exit code"));
        assert!(message.ends_with("stat: cannot stat '/x': No such file or directory\n"));

        let bare = status("Failure", None);
        assert_eq!(failure_message(Some(&bare), "boom").unwrap(), "boom");
    }

    #[test]
    fn test_pod_phase() {
        let pod: Pod = serde_json::from_value(json!({
            "metadata": { "name": "p" },
            "status": { "phase": "Running" },
        }))
        .unwrap();
        assert_eq!(pod_phase(Some(&pod)), Some("Running"));
        assert_eq!(pod_phase(None), None);
    }
}
