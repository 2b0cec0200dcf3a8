use sagaflow_engine::SagaEngine;

use crate::error::Result;
use crate::output::SagaFormatter;

pub(crate) async fn run(engine: &SagaEngine, formatter: &dyn SagaFormatter) -> Result<String> {
    let sagas = engine.list_sagas().await?;

    formatter.format_list(&sagas)
}
