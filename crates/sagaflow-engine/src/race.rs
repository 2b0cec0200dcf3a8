use std::any::Any;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinError;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RaceError {
    TimedOut,
    Panicked(String),
}

/// Runs `work` as a detached task and waits for it at most `timeout`.
///
/// On timeout the task is left running; only the caller stops waiting.
pub(crate) async fn race_detached<T, F>(timeout: Duration, work: F) -> Result<T, RaceError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(work);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_error)) => Err(RaceError::Panicked(join_error_message(join_error))),
        Err(_elapsed) => Err(RaceError::TimedOut),
    }
}

fn join_error_message(error: JoinError) -> String {
    if error.is_cancelled() {
        return "task was cancelled".to_string();
    }
    panic_message(error.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
