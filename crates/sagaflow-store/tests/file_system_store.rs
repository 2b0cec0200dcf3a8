//! Integration tests for the file system saga store.

use chrono::{Duration, Utc};
use sagaflow_core::{JsonMap, SagaContext, SagaInstance, SagaRecord, SagaStatus, StepStatus};
use sagaflow_store::{FileSystemSagaStore, SagaStore};
use serde_json::json;
use tempfile::TempDir;

fn issue_instance(id: &str, issue: &str, age_minutes: i64) -> SagaInstance {
    let mut metadata = JsonMap::new();
    metadata.insert("aggregateType".to_string(), json!("Issue"));
    metadata.insert("aggregateId".to_string(), json!(issue));
    let context = SagaContext::new(
        id,
        None,
        json!({"issue": issue}),
        metadata.clone(),
        None,
    );
    let mut instance = SagaInstance::new(
        "issue.execute",
        context,
        ["worktree", "agent", "pull_request"],
        Some(metadata),
    );
    instance.started_at = Utc::now() - Duration::minutes(age_minutes);
    instance
}

#[tokio::test]
async fn records_survive_a_new_store_instance() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let mut instance = issue_instance("saga-1", "issue-1", 0);
    instance
        .context
        .record_step_result("worktree", Some(json!({"path": "/wt/issue-1"})));
    instance.step_state_mut("worktree").status = StepStatus::Completed;
    instance.completed_steps.push("worktree".to_string());
    instance.status = SagaStatus::Running;

    FileSystemSagaStore::new(dir.path())
        .upsert(&SagaRecord::from(&instance))
        .await?;

    let reopened = FileSystemSagaStore::new(dir.path());
    let record = reopened.load("saga-1").await?.expect("record should exist");
    let restored = record.into_instance()?;

    assert_eq!(restored, instance);
    assert_eq!(
        restored.step_states.keys().collect::<Vec<_>>(),
        vec!["worktree", "agent", "pull_request"]
    );
    Ok(())
}

#[tokio::test]
async fn history_lookup_is_newest_first() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = FileSystemSagaStore::new(dir.path());
    for (id, issue, age) in [
        ("first", "issue-123", 30),
        ("second", "issue-123", 20),
        ("unrelated", "issue-77", 15),
        ("third", "issue-123", 10),
    ] {
        store
            .upsert(&SagaRecord::from(&issue_instance(id, issue, age)))
            .await?;
    }

    let found = store.find_by_metadata("issue-123").await?;

    let ids: Vec<_> = found.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["third", "second", "first"]);
    Ok(())
}

#[tokio::test]
async fn upsert_overwrites_in_place() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = FileSystemSagaStore::new(dir.path());
    let mut instance = issue_instance("saga-1", "issue-1", 0);
    store.upsert(&SagaRecord::from(&instance)).await?;

    instance.status = SagaStatus::Completed;
    store.upsert(&SagaRecord::from(&instance)).await?;

    let records = store.list().await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, SagaStatus::Completed);
    Ok(())
}
