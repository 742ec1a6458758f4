//! Spec scenario 4: a critical-severity reflection auto-bridges to a
//! task; a medium-severity one waits for human triage, and approving
//! it through `/insights/:id/triage` creates the task and records a
//! triage decision. Dismissing instead closes the insight with no
//! task.
//!
//! There is no HTTP route to seed agent presence, so the bridge's
//! candidate pool (`GovHandlerImpl::bridge_candidates`, sourced from
//! `PresenceRepository::list_idle_since`) is always empty here and the
//! bridge falls back to `BridgeAssignee::Unassigned` rather than a
//! named non-author — the assignment-selection rule itself is covered
//! at the pure-function level by `gov_core::pipeline`'s own unit tests.
//! What this test exercises is the severity-routing split the HTTP
//! surface is responsible for: auto-create vs pending-triage.
//!
//! The bridge's severity -> priority mapping (`pipeline::priority_for_severity`)
//! assigns `P0` to `Critical`, the top of a clean bijection across all
//! four severities; asserted directly rather than against the
//! scenario's illustrative "P1" (see DESIGN.md).

use integration_tests::TestServer;
use serde_json::{json, Value};

fn reflection_payload(author: &str, severity: &str, tag: &str) -> Value {
    json!({
        "pain": format!("{tag} keeps breaking the {author} pipeline"),
        "impact": "repeated production incidents",
        "evidence": ["incident-report-1"],
        "went_well": null,
        "suspected_why": "missing input validation",
        "proposed_fix": "add a schema check at ingress",
        "confidence": 8,
        "role_type": "engineer",
        "severity": severity,
        "author": author,
        "tags": [tag],
        "task_id": null,
        "team_id": null
    })
}

#[tokio::test]
async fn critical_severity_auto_creates_a_task() {
    let server = TestServer::start().await;
    let client = &server.client;

    let response: Value = client
        .post(server.url("/reflections"))
        .json(&reflection_payload("sage", "critical", "ingest-validation"))
        .send()
        .await
        .expect("submit reflection")
        .json()
        .await
        .expect("response body");

    let insight = &response["insight"];
    assert_eq!(insight["severity_max"], "critical");
    assert_eq!(insight["status"], "task_created");
    assert_eq!(insight["priority"], "P0");
    let task_id = response["bridged_task_id"].as_i64().expect("bridged_task_id");

    let task: Value = client
        .get(server.url(&format!("/tasks/{task_id}")))
        .send()
        .await
        .expect("get task")
        .json()
        .await
        .expect("task body");
    assert_eq!(task["priority"], "P0");
    assert_eq!(task["metadata"]["source_insight"], insight["id"]);
}

#[tokio::test]
async fn medium_severity_waits_for_human_triage_then_creates_on_approve() {
    let server = TestServer::start().await;
    let client = &server.client;

    let response: Value = client
        .post(server.url("/reflections"))
        .json(&reflection_payload("kai", "medium", "flaky-retry-logic"))
        .send()
        .await
        .expect("submit reflection")
        .json()
        .await
        .expect("response body");

    let insight = &response["insight"];
    assert_eq!(insight["severity_max"], "medium");
    assert_eq!(insight["status"], "pending_triage");
    assert_eq!(response["bridged_task_id"], Value::Null);
    let insight_id = insight["id"].as_i64().expect("insight id");

    let triaged: Value = client
        .post(server.url(&format!("/insights/{insight_id}/triage")))
        .json(&json!({ "decision": "approve", "decided_by": "kai", "reason": "worth fixing now" }))
        .send()
        .await
        .expect("triage request")
        .json()
        .await
        .expect("triage body");

    assert_eq!(triaged["status"], "task_created");
    assert!(triaged["task_id"].is_i64());
}

#[tokio::test]
async fn dismissing_a_pending_triage_insight_closes_it_without_a_task() {
    let server = TestServer::start().await;
    let client = &server.client;

    let response: Value = client
        .post(server.url("/reflections"))
        .json(&reflection_payload("kai", "low", "stale-cache-key"))
        .send()
        .await
        .expect("submit reflection")
        .json()
        .await
        .expect("response body");
    let insight_id = response["insight"]["id"].as_i64().expect("insight id");

    let triaged: Value = client
        .post(server.url(&format!("/insights/{insight_id}/triage")))
        .json(&json!({ "decision": "dismiss", "decided_by": "kai", "reason": "known limitation, not worth the churn" }))
        .send()
        .await
        .expect("triage request")
        .json()
        .await
        .expect("triage body");

    assert_eq!(triaged["status"], "closed");
    assert_eq!(triaged["task_id"], Value::Null);
}
