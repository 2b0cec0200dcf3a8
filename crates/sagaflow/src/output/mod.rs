mod json;
mod plain;

use sagaflow_core::SagaInstance;

use crate::error::Result;

pub(crate) use json::JsonFormatter;
pub(crate) use plain::PlainTextFormatter;

pub(crate) trait SagaFormatter {
    fn format_saga(&self, saga: &SagaInstance) -> Result<String>;
    fn format_list(&self, sagas: &[SagaInstance]) -> Result<String>;
}

pub(crate) fn formatter(json: bool) -> Box<dyn SagaFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(PlainTextFormatter)
    }
}
