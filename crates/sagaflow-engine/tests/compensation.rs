//! Integration tests for automatic and manual compensation.

mod common;

use std::time::{Duration, Instant};

use common::{Compensation, Journal, ScriptedStep, memory_engine};
use sagaflow_engine::{
    CompensateOptions, ExecuteOptions, SagaDefinition, SagaEngine, SagaError, SagaStatus,
    StepDefinition, StepStatus,
};
use serde_json::json;

fn three_step_saga(journal: &Journal, a: Compensation) -> SagaDefinition {
    SagaDefinition::new("release", "Release")
        .with_step(StepDefinition::new(
            "a",
            "A",
            ScriptedStep::ok("a", journal).compensation(a),
        ))
        .with_step(StepDefinition::new("b", "B", ScriptedStep::ok("b", journal)))
        .with_step(StepDefinition::new(
            "c",
            "C",
            ScriptedStep::failing("c", journal),
        ))
}

/// Runs the saga without rollback and returns the failed saga's id.
async fn failed_saga(engine: &SagaEngine) -> String {
    let options = ExecuteOptions {
        auto_compensate: false,
        ..ExecuteOptions::default()
    };
    let err = engine
        .execute_saga("release", json!({}), options)
        .await
        .expect_err("step c always fails");
    err.saga_id().expect("error should carry saga id").to_string()
}

#[tokio::test]
async fn failure_compensates_completed_steps_in_reverse() -> anyhow::Result<()> {
    let (engine, _store) = memory_engine();
    let journal = Journal::default();
    engine.register_saga(three_step_saga(&journal, Compensation::Succeed))?;

    let err = engine
        .execute_saga("release", json!({}), ExecuteOptions::default())
        .await
        .expect_err("saga should still reject after compensating");

    assert!(matches!(err, SagaError::StepFailed { ref step_id, .. } if step_id == "c"));
    let saga_id = err.saga_id().expect("error should carry saga id");
    let instance = engine
        .get_saga_instance(saga_id)
        .await?
        .expect("saga should be stored");

    assert_eq!(instance.status, SagaStatus::Compensated);
    assert_eq!(instance.compensated_steps, vec!["b", "a"]);
    assert_eq!(instance.failed_steps, vec!["c"]);
    assert_eq!(instance.step_status("c"), Some(StepStatus::Failed));
    assert_eq!(journal.count("compensate c"), 0);
    assert_eq!(
        journal.entries(),
        vec![
            "execute a",
            "execute b",
            "execute c",
            "compensate b",
            "compensate a",
        ]
    );
    let record = instance.error.expect("original failure should be kept");
    assert_eq!(record.code.as_deref(), Some("STEP_FAILED"));
    Ok(())
}

#[tokio::test]
async fn failure_without_completed_steps_skips_compensation() -> anyhow::Result<()> {
    let (engine, _store) = memory_engine();
    let journal = Journal::default();
    engine.register_saga(
        SagaDefinition::new("first", "First").with_step(StepDefinition::new(
            "only",
            "Only",
            ScriptedStep::failing("only", &journal),
        )),
    )?;

    let err = engine
        .execute_saga("first", json!({}), ExecuteOptions::default())
        .await
        .expect_err("saga should fail");

    let instance = engine
        .get_saga_instance(err.saga_id().expect("saga id"))
        .await?
        .expect("saga should be stored");
    assert_eq!(instance.status, SagaStatus::Failed);
    assert!(instance.compensated_steps.is_empty());
    Ok(())
}

#[tokio::test]
async fn second_compensation_is_a_no_op() -> anyhow::Result<()> {
    let (engine, _store) = memory_engine();
    let journal = Journal::default();
    engine.register_saga(three_step_saga(&journal, Compensation::Succeed))?;
    let saga_id = failed_saga(&engine).await;

    engine
        .compensate_saga(&saga_id, CompensateOptions::default())
        .await?;
    engine
        .compensate_saga(&saga_id, CompensateOptions::default())
        .await?;

    assert_eq!(journal.count("compensate a"), 1);
    assert_eq!(journal.count("compensate b"), 1);
    let instance = engine
        .get_saga_instance(&saga_id)
        .await?
        .expect("saga should be stored");
    assert_eq!(instance.status, SagaStatus::Compensated);
    assert_eq!(instance.compensated_steps, vec!["b", "a"]);
    Ok(())
}

#[tokio::test]
async fn hanging_compensation_times_out_promptly() -> anyhow::Result<()> {
    let (engine, _store) = memory_engine();
    let journal = Journal::default();
    engine.register_saga(three_step_saga(&journal, Compensation::Hang))?;
    let saga_id = failed_saga(&engine).await;

    let options = CompensateOptions {
        stop_on_failure: true,
        timeout: Some(Duration::from_millis(100)),
        ..CompensateOptions::default()
    };
    let started = Instant::now();
    let err = engine
        .compensate_saga(&saga_id, options)
        .await
        .expect_err("hanging compensation should time out");

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(matches!(
        err,
        SagaError::CompensationTimeout { ref step_id, timeout, .. }
            if step_id == "a" && timeout == Duration::from_millis(100)
    ));
    assert!(err.is_timeout());

    let instance = engine
        .get_saga_instance(&saga_id)
        .await?
        .expect("saga should be stored");
    assert_eq!(instance.status, SagaStatus::Failed);
    assert_eq!(instance.compensated_steps, vec!["b"]);
    let state = instance.step_state("a").expect("state should exist");
    assert_eq!(state.status, StepStatus::Failed);
    assert!(state.error.as_ref().is_some_and(|e| e.is_timeout()));
    Ok(())
}

#[tokio::test]
async fn failing_compensation_is_logged_and_the_rest_still_run() -> anyhow::Result<()> {
    let (engine, _store) = memory_engine();
    let journal = Journal::default();
    engine.register_saga(
        SagaDefinition::new("release", "Release")
            .with_step(StepDefinition::new("a", "A", ScriptedStep::ok("a", &journal)))
            .with_step(StepDefinition::new(
                "b",
                "B",
                ScriptedStep::ok("b", &journal).compensation(Compensation::Fail),
            ))
            .with_step(StepDefinition::new(
                "c",
                "C",
                ScriptedStep::failing("c", &journal),
            )),
    )?;
    let saga_id = failed_saga(&engine).await;

    engine
        .compensate_saga(&saga_id, CompensateOptions::default())
        .await?;

    let instance = engine
        .get_saga_instance(&saga_id)
        .await?
        .expect("saga should be stored");
    assert_eq!(instance.status, SagaStatus::Compensated);
    assert_eq!(instance.compensated_steps, vec!["a"]);
    assert_eq!(instance.step_status("b"), Some(StepStatus::Failed));
    assert_eq!(journal.count("compensate a"), 1);
    Ok(())
}

#[tokio::test]
async fn stop_on_failure_aborts_and_leaves_saga_retryable() -> anyhow::Result<()> {
    let (engine, _store) = memory_engine();
    let journal = Journal::default();
    engine.register_saga(
        SagaDefinition::new("release", "Release")
            .with_step(StepDefinition::new("a", "A", ScriptedStep::ok("a", &journal)))
            .with_step(StepDefinition::new(
                "b",
                "B",
                ScriptedStep::ok("b", &journal).compensation(Compensation::Fail),
            ))
            .with_step(StepDefinition::new(
                "c",
                "C",
                ScriptedStep::failing("c", &journal),
            )),
    )?;
    let saga_id = failed_saga(&engine).await;

    let options = CompensateOptions {
        stop_on_failure: true,
        ..CompensateOptions::default()
    };
    let err = engine
        .compensate_saga(&saga_id, options)
        .await
        .expect_err("compensation of b should abort");

    assert_eq!(err.code(), "COMPENSATION_FAILED");
    assert_eq!(journal.count("compensate a"), 0);
    let instance = engine
        .get_saga_instance(&saga_id)
        .await?
        .expect("saga should be stored");
    assert_eq!(instance.status, SagaStatus::Failed);
    assert_eq!(instance.step_status("b"), Some(StepStatus::Failed));
    let record = instance.error.expect("original failure should be kept");
    assert_eq!(record.code.as_deref(), Some("STEP_FAILED"));
    assert!(record.message.contains("'c'"));
    assert!(engine.active_saga_ids().is_empty());

    engine
        .compensate_saga(&saga_id, CompensateOptions::default())
        .await?;

    assert_eq!(journal.count("compensate a"), 1);
    let instance = engine
        .get_saga_instance(&saga_id)
        .await?
        .expect("saga should be stored");
    assert_eq!(instance.status, SagaStatus::Compensated);
    assert_eq!(instance.compensated_steps, vec!["a"]);
    Ok(())
}

#[tokio::test]
async fn aborted_manual_rollback_keeps_completed_saga_completed() -> anyhow::Result<()> {
    let (engine, _store) = memory_engine();
    let journal = Journal::default();
    engine.register_saga(
        SagaDefinition::new("pair", "Pair")
            .with_step(StepDefinition::new(
                "a",
                "A",
                ScriptedStep::ok("a", &journal).compensation(Compensation::Fail),
            ))
            .with_step(StepDefinition::new("b", "B", ScriptedStep::ok("b", &journal))),
    )?;
    let instance = engine
        .execute_saga("pair", json!({}), ExecuteOptions::default())
        .await?;

    let options = CompensateOptions {
        stop_on_failure: true,
        ..CompensateOptions::default()
    };
    let err = engine
        .compensate_saga(&instance.id, options)
        .await
        .expect_err("compensation of a should abort");

    assert!(matches!(err, SagaError::CompensationFailed { ref step_id, .. } if step_id == "a"));
    let instance = engine
        .get_saga_instance(&instance.id)
        .await?
        .expect("saga should be stored");
    assert_eq!(instance.status, SagaStatus::Completed);
    assert!(instance.error.is_none());
    assert_eq!(instance.compensated_steps, vec!["b"]);
    let state = instance.step_state("a").expect("state should exist");
    assert_eq!(state.status, StepStatus::Failed);
    assert!(state.error.is_some());
    Ok(())
}

#[tokio::test]
async fn explicit_subset_in_declared_order() -> anyhow::Result<()> {
    let (engine, _store) = memory_engine();
    let journal = Journal::default();
    engine.register_saga(three_step_saga(&journal, Compensation::Succeed))?;
    let saga_id = failed_saga(&engine).await;

    let options = CompensateOptions {
        steps: Some(vec!["a".to_string(), "b".to_string(), "c".to_string()]),
        reverse_order: false,
        ..CompensateOptions::default()
    };
    engine.compensate_saga(&saga_id, options).await?;

    let instance = engine
        .get_saga_instance(&saga_id)
        .await?
        .expect("saga should be stored");
    assert_eq!(instance.compensated_steps, vec!["a", "b"]);
    assert_eq!(journal.count("compensate c"), 0);
    Ok(())
}

#[tokio::test]
async fn completed_saga_can_be_compensated_manually() -> anyhow::Result<()> {
    let (engine, _store) = memory_engine();
    let journal = Journal::default();
    engine.register_saga(
        SagaDefinition::new("pair", "Pair")
            .with_step(StepDefinition::new("a", "A", ScriptedStep::ok("a", &journal)))
            .with_step(StepDefinition::new("b", "B", ScriptedStep::ok("b", &journal))),
    )?;
    let instance = engine
        .execute_saga("pair", json!({}), ExecuteOptions::default())
        .await?;

    engine
        .compensate_saga(&instance.id, CompensateOptions::default())
        .await?;

    let instance = engine
        .get_saga_instance(&instance.id)
        .await?
        .expect("saga should be stored");
    assert_eq!(instance.status, SagaStatus::Compensated);
    assert_eq!(instance.compensated_steps, vec!["b", "a"]);
    Ok(())
}

#[tokio::test]
async fn unknown_saga_is_not_found() {
    let (engine, _store) = memory_engine();

    let err = engine
        .compensate_saga("nope", CompensateOptions::default())
        .await
        .expect_err("unknown saga should fail");

    assert!(matches!(err, SagaError::NotFound { ref saga_id } if saga_id == "nope"));
}
