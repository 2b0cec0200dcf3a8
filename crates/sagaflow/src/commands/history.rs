use sagaflow_engine::SagaEngine;

use crate::error::Result;
use crate::output::SagaFormatter;

pub(crate) async fn run(
    engine: &SagaEngine,
    formatter: &dyn SagaFormatter,
    aggregate_type: &str,
    aggregate_id: &str,
) -> Result<String> {
    let sagas = engine.get_saga_history(aggregate_type, aggregate_id).await?;

    formatter.format_list(&sagas)
}
