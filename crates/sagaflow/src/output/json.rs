use sagaflow_core::{SagaInstance, SagaRecord};

use super::SagaFormatter;
use crate::error::Result;

/// Prints the persisted record shape, so output can be fed back to tools
/// that read the store.
pub(crate) struct JsonFormatter;

impl SagaFormatter for JsonFormatter {
    fn format_saga(&self, saga: &SagaInstance) -> Result<String> {
        let mut output = serde_json::to_string_pretty(&SagaRecord::from(saga))?;
        output.push('\n');
        Ok(output)
    }

    fn format_list(&self, sagas: &[SagaInstance]) -> Result<String> {
        let records: Vec<_> = sagas.iter().map(SagaRecord::from).collect();
        let mut output = serde_json::to_string_pretty(&records)?;
        output.push('\n');
        Ok(output)
    }
}
