use sagaflow_engine::SagaEngine;

use crate::error::{CliError, Result};
use crate::output::SagaFormatter;

pub(crate) async fn run(
    engine: &SagaEngine,
    formatter: &dyn SagaFormatter,
    saga_id: &str,
) -> Result<String> {
    let saga = engine
        .get_saga_instance(saga_id)
        .await?
        .ok_or_else(|| CliError::SagaNotFound(saga_id.to_string()))?;

    formatter.format_saga(&saga)
}
