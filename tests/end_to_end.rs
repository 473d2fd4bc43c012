//! A node rule running against scripted node commands.

use k8s_openapi::api::core::v1::Node;
use kubecomply::nodes::DEFAULT_GROUP_LABEL;
use kubecomply::pod::{ExecError, FakePodContext};
use kubecomply::report::{self, OutputFormat};
use kubecomply::rule::{Rule, Status, Target};
use kubecomply::rules::{ExpectedFile, NodeFilesRule};
use kubecomply::ruleset::Ruleset;
use serde_json::json;
use std::sync::Arc;

fn node(name: &str, pool: &str, ready: bool) -> Node {
    serde_json::from_value(json!({
        "metadata": {
            "name": name,
            "labels": { DEFAULT_GROUP_LABEL: pool },
        },
        "status": {
            "conditions": [{
                "type": "Ready",
                "status": if ready { "True" } else { "False" },
            }],
        },
    }))
    .unwrap()
}

fn files() -> Vec<ExpectedFile> {
    vec![
        ExpectedFile::root_owned("/etc/a", 0o644),
        ExpectedFile::root_owned("/etc/b", 0o644),
        ExpectedFile::root_owned("/etc/c", 0o600),
    ]
}

fn cluster() -> Vec<Node> {
    vec![
        node("pool1-n1", "pool1", true),
        node("pool2-n1", "pool2", false),
    ]
}

#[tokio::test]
async fn sibling_files_survive_a_failing_command() {
    let pods = Arc::new(FakePodContext::from_results(vec![vec![
        Ok("644 0 0 /host/etc/a\n".to_string()),
        Err(ExecError::Remote("command terminated with exit code 1".to_string())),
        Ok("644 0 0 /host/etc/c\n".to_string()),
    ]]));
    let rule = NodeFilesRule::new(Arc::new(cluster()), pods.clone()).with_files(files());

    let result = rule.run().await.unwrap();

    let pool1 = Target::new().with("kind", "workerGroup").with("name", "pool1");
    let pool2 = Target::new().with("kind", "workerGroup").with("name", "pool2");
    let statuses: Vec<Status> = result.check_results.iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![Status::Passed, Status::Errored, Status::Failed, Status::Warning]
    );

    assert_eq!(result.check_results[0].target.get("name"), Some("pool1"));
    assert_eq!(
        result.check_results[1].message,
        "command terminated with exit code 1"
    );
    assert_eq!(
        result.check_results[1].target,
        pool1.with("details", "fileName: /etc/b")
    );
    assert_eq!(result.check_results[2].message, "File has too wide permissions");
    assert_eq!(result.check_results[3].target, pool2);
    assert_eq!(
        result.check_results[3].message,
        "There are no nodes in Ready state for worker group."
    );

    let calls = pods.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].node_name, "pool1-n1");
    assert_eq!(calls[0].commands.len(), 3);
    assert!(calls[0].commands[1].ends_with("/host/etc/b"));
}

#[tokio::test]
async fn ruleset_report_lists_every_check() {
    let pods = Arc::new(FakePodContext::from_results(vec![vec![
        Ok("644 0 0 /host/etc/a\n".to_string()),
        Err(ExecError::Remote("command terminated with exit code 1".to_string())),
        Ok("600 0 0 /host/etc/c\n".to_string()),
    ]]));
    let ruleset = Ruleset::new("node-checks", "v1")
        .with_rule(NodeFilesRule::new(Arc::new(cluster()), pods).with_files(files()));

    let result = ruleset.run().await;

    assert!(result.has_violations());
    assert_eq!(result.worst_status(), Some(Status::Errored));

    let plain = report::format(&result, OutputFormat::Plain);
    assert!(plain.contains("Errored: command terminated with exit code 1"));
    assert!(plain.contains("Summary: 2 Passed, 1 Warning, 1 Errored"));

    let json: serde_json::Value =
        serde_json::from_str(&report::format(&result, OutputFormat::Json)).unwrap();
    assert_eq!(json["rules"][0]["check_results"].as_array().unwrap().len(), 4);
}
