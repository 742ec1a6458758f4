//! Spec scenario 1: create -> claim -> validating (qa_bundle passes
//! PR integrity) -> reviewer approves -> done. Asserts the audit
//! ledger holds exactly the 3 entries the scenario names: the
//! `review_state` progression (null -> queued -> approved) plus the
//! `reviewer_approved` flip.

use gov_core::pr_integrity::{PrSnapshot, PrState};
use integration_tests::TestServer;
use serde_json::{json, Value};

#[tokio::test]
async fn happy_path_ship_produces_exactly_three_audit_entries() {
    let server = TestServer::start_with_pr_client().await;
    let client = &server.client;

    let create = client
        .post(server.url("/tasks"))
        .json(&json!({
            "title": "Fix login SSO state handling",
            "description": "Callback drops the state param under load",
            "task_type": "bug",
            "priority": "P1",
            "reviewer": "kai",
            "assignee": null,
            "done_criteria": ["SSO callback handles missing state", "No 500 in prod logs"],
            "created_by": "alice",
            "blocked_by": [],
            "tags": [],
            "team_id": null,
            "metadata": {}
        }))
        .send()
        .await
        .expect("create request");
    assert_eq!(create.status(), 200);
    let task: Value = create.json().await.expect("create body");
    let task_id = task["id"].as_i64().expect("task id");

    let claim = client
        .post(server.url(&format!("/tasks/{task_id}/claim")))
        .json(&json!({ "agent_name": "alice" }))
        .send()
        .await
        .expect("claim request");
    assert_eq!(claim.status(), 200);
    let claimed: Value = claim.json().await.expect("claim body");
    assert_eq!(claimed["status"], "doing");

    let pr_url = "https://github.com/acme/widget/pull/7";
    server.pr_client().set_snapshot(
        pr_url,
        PrSnapshot {
            pr_url: pr_url.to_string(),
            state: PrState::Open { head_sha: "abc1234".to_string() },
            changed_files: vec!["src/auth.ts".to_string()],
            checks_passed: Some(true),
        },
    );

    let to_validating = client
        .patch(server.url(&format!("/tasks/{task_id}")))
        .json(&json!({
            "status": "validating",
            "actor": "alice",
            "metadata": {
                "qa_bundle": {
                    "review_packet": {
                        "task_id": task_id,
                        "pr_url": pr_url,
                        "commit": "abc1234",
                        "changed_files": ["src/auth.ts"],
                        "artifact_path": "process/qa-bundle.md",
                        "caveats": "tested locally, no edge cases outstanding"
                    }
                }
            }
        }))
        .send()
        .await
        .expect("patch to validating");
    assert_eq!(to_validating.status(), 200, "body: {:?}", to_validating.text().await);

    let review = client
        .post(server.url(&format!("/tasks/{task_id}/review")))
        .json(&json!({ "actor": "kai", "decision": "approve", "notes": null }))
        .send()
        .await
        .expect("review request");
    assert_eq!(review.status(), 200);

    server.pr_client().set_snapshot(
        pr_url,
        PrSnapshot {
            pr_url: pr_url.to_string(),
            state: PrState::Merged { head_sha: "abc1234".to_string(), merged_at: chrono::Utc::now() },
            changed_files: vec!["src/auth.ts".to_string()],
            checks_passed: Some(true),
        },
    );

    let to_done = client
        .patch(server.url(&format!("/tasks/{task_id}")))
        .json(&json!({
            "status": "done",
            "actor": "alice",
            "metadata": {
                "artifacts": [pr_url, "tested locally"],
                "pr_url": pr_url
            }
        }))
        .send()
        .await
        .expect("patch to done");
    assert_eq!(to_done.status(), 200, "body: {:?}", to_done.text().await);
    let done_task: Value = to_done.json().await.expect("done body");
    assert_eq!(done_task["status"], "done");

    let audit = client
        .get(server.url(&format!("/audit/tasks/{task_id}")))
        .send()
        .await
        .expect("audit request");
    assert_eq!(audit.status(), 200);
    let entries: Vec<Value> = audit.json().await.expect("audit body");
    assert_eq!(entries.len(), 3, "audit ledger should hold exactly 3 entries: {entries:?}");

    let fields: Vec<&str> = entries.iter().map(|e| e["field_path"].as_str().unwrap()).collect();
    assert_eq!(fields.iter().filter(|f| **f == "review_state").count(), 2);
    assert_eq!(fields.iter().filter(|f| **f == "reviewer_approved").count(), 1);
}
