//! Substitutable fakes for node command execution.
//!
//! - [`FakePodContext`] replays pre-scripted results, one batch per call.
//! - [`FakePodBackend`] keeps pods in memory so that the real orchestration
//!   in [`NodePodContext`](super::NodePodContext) can be exercised without a
//!   cluster.

use super::{ExecError, PodBackend, PodContext};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// A recorded `run_commands_on_node` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeCall {
    pub node_name: String,
    pub commands: Vec<String>,
}

/// [`PodContext`] returning scripted batches in call order.
#[derive(Debug, Default)]
pub struct FakePodContext {
    batches: Mutex<VecDeque<Vec<Result<String, ExecError>>>>,
    calls: Mutex<Vec<FakeCall>>,
}

impl FakePodContext {
    /// Script one batch per call from parallel outputs and errors.
    ///
    /// `errors[i][j]` set to `Some` makes command `j` of call `i` fail;
    /// otherwise `outputs[i][j]` is returned (empty when missing).
    pub fn new(outputs: Vec<Vec<String>>, errors: Vec<Vec<Option<ExecError>>>) -> Self {
        let calls = outputs.len().max(errors.len());
        let mut outputs = outputs.into_iter();
        let mut errors = errors.into_iter();
        let batches = (0..calls)
            .map(|_| {
                let outs = outputs.next().unwrap_or_default();
                let errs = errors.next().unwrap_or_default();
                let len = outs.len().max(errs.len());
                let mut outs = outs.into_iter();
                let mut errs = errs.into_iter();
                (0..len)
                    .map(|_| {
                        let out = outs.next().unwrap_or_default();
                        match errs.next().flatten() {
                            Some(err) => Err(err),
                            None => Ok(out),
                        }
                    })
                    .collect()
            })
            .collect();
        Self::from_results(batches)
    }

    /// Script batches directly as per-command results.
    pub fn from_results(batches: Vec<Vec<Result<String, ExecError>>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Calls served so far, in order.
    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().clone()
    }

    /// Number of scripted batches not yet consumed.
    pub fn remaining(&self) -> usize {
        self.batches.lock().len()
    }
}

#[async_trait]
impl PodContext for FakePodContext {
    async fn run_commands_on_node(
        &self,
        node_name: &str,
        commands: &[String],
    ) -> Vec<Result<String, ExecError>> {
        self.calls.lock().push(FakeCall {
            node_name: node_name.to_string(),
            commands: commands.to_vec(),
        });

        let mut scripted = self.batches.lock().pop_front().unwrap_or_default().into_iter();
        commands
            .iter()
            .map(|command| {
                scripted.next().unwrap_or_else(|| {
                    Err(ExecError::Script(format!(
                        "no scripted result for command {:?} on node {}",
                        command, node_name
                    )))
                })
            })
            .collect()
    }
}

/// Behaviour of a command run against [`FakePodBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeExec {
    Output(String),
    Fail(ExecError),
    /// Never completes.
    Hang,
}

#[derive(Debug, Default)]
struct BackendState {
    nodes: HashMap<String, bool>,
    live: BTreeSet<String>,
    created: Vec<String>,
    deleted: Vec<String>,
    executed: Vec<(String, String)>,
}

/// In-memory [`PodBackend`].
///
/// Unknown nodes fail like a missing API object; unscripted commands succeed
/// with empty output.
#[derive(Debug, Default)]
pub struct FakePodBackend {
    state: Mutex<BackendState>,
    scripts: HashMap<String, FakeExec>,
    pending_pods: bool,
}

impl FakePodBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node and its readiness.
    pub fn with_node(self, name: impl Into<String>, ready: bool) -> Self {
        self.state.lock().nodes.insert(name.into(), ready);
        self
    }

    /// Script the behaviour of `command`.
    pub fn with_exec(mut self, command: impl Into<String>, behaviour: FakeExec) -> Self {
        self.scripts.insert(command.into(), behaviour);
        self
    }

    /// Pods never reach the running state.
    pub fn with_pending_pods(mut self) -> Self {
        self.pending_pods = true;
        self
    }

    /// Pods that exist right now.
    pub fn live_pods(&self) -> Vec<String> {
        self.state.lock().live.iter().cloned().collect()
    }

    /// Every pod ever created, in order.
    pub fn created(&self) -> Vec<String> {
        self.state.lock().created.clone()
    }

    /// Every successful deletion of an existing pod, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    /// `(pod, command)` pairs executed, in order.
    pub fn executed(&self) -> Vec<(String, String)> {
        self.state.lock().executed.clone()
    }
}

#[async_trait]
impl PodBackend for FakePodBackend {
    async fn node_ready(&self, node_name: &str) -> Result<bool, ExecError> {
        self.state
            .lock()
            .nodes
            .get(node_name)
            .copied()
            .ok_or_else(|| ExecError::Transport(format!("nodes \"{}\" not found", node_name)))
    }

    async fn create_pod(&self, pod_name: &str, _node_name: &str) -> Result<(), ExecError> {
        let mut state = self.state.lock();
        if !state.live.insert(pod_name.to_string()) {
            return Err(ExecError::Scheduling(format!(
                "pods \"{}\" already exists",
                pod_name
            )));
        }
        state.created.push(pod_name.to_string());
        Ok(())
    }

    async fn wait_running(&self, pod_name: &str) -> Result<(), ExecError> {
        if self.pending_pods {
            std::future::pending::<()>().await;
        }
        if self.state.lock().live.contains(pod_name) {
            Ok(())
        } else {
            Err(ExecError::Scheduling(format!("pods \"{}\" not found", pod_name)))
        }
    }

    async fn exec(&self, pod_name: &str, command: &str) -> Result<String, ExecError> {
        self.state
            .lock()
            .executed
            .push((pod_name.to_string(), command.to_string()));
        match self.scripts.get(command) {
            Some(FakeExec::Output(out)) => Ok(out.clone()),
            Some(FakeExec::Fail(err)) => Err(err.clone()),
            Some(FakeExec::Hang) => {
                std::future::pending::<()>().await;
                Ok(String::new())
            }
            None => Ok(String::new()),
        }
    }

    async fn delete_pod(&self, pod_name: &str) -> Result<(), ExecError> {
        let mut state = self.state.lock();
        if state.live.remove(pod_name) {
            state.deleted.push(pod_name.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_context_replays_batches_in_order() {
        let ctx = FakePodContext::new(
            vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]],
            vec![
                vec![None, Some(ExecError::Script("b failed".to_string()))],
                vec![None],
            ],
        );
        let cmds = vec!["x".to_string(), "y".to_string()];

        let first = ctx.run_commands_on_node("node1", &cmds).await;
        assert_eq!(
            first,
            vec![Ok("a".to_string()), Err(ExecError::Script("b failed".to_string()))]
        );

        let second = ctx.run_commands_on_node("node2", &cmds[..1]).await;
        assert_eq!(second, vec![Ok("c".to_string())]);
        assert_eq!(ctx.remaining(), 0);

        let calls = ctx.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].node_name, "node2");
        assert_eq!(calls[1].commands, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn test_fake_context_keeps_length_when_script_runs_short() {
        let ctx = FakePodContext::new(vec![vec!["only".to_string()]], vec![]);
        let cmds = vec!["a".to_string(), "b".to_string()];

        let results = ctx.run_commands_on_node("node1", &cmds).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], Ok("only".to_string()));
        assert!(matches!(results[1], Err(ExecError::Script(_))));

        let exhausted = ctx.run_commands_on_node("node1", &cmds).await;
        assert!(exhausted.iter().all(|r| r.is_err()));
    }

    #[tokio::test]
    async fn test_fake_backend_tracks_pods() {
        let backend = FakePodBackend::new().with_node("node1", true);
        assert_eq!(backend.node_ready("node1").await, Ok(true));
        assert!(backend.node_ready("missing").await.is_err());

        backend.create_pod("p1", "node1").await.unwrap();
        assert!(backend.create_pod("p1", "node1").await.is_err());
        assert_eq!(backend.live_pods(), vec!["p1".to_string()]);

        backend.delete_pod("p1").await.unwrap();
        backend.delete_pod("p1").await.unwrap();
        assert!(backend.live_pods().is_empty());
        assert_eq!(backend.deleted(), vec!["p1".to_string()]);
    }
}
