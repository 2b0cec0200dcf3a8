use std::fmt::Write as _;

use sagaflow_core::SagaInstance;

use super::SagaFormatter;
use crate::error::Result;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

pub(crate) struct PlainTextFormatter;

impl PlainTextFormatter {
    fn format_header(output: &mut String, saga: &SagaInstance) {
        let _ = writeln!(output, "Saga {} ({})", saga.id, saga.workflow_type);
        let _ = writeln!(output, "  status:      {}", saga.status);
        let _ = writeln!(output, "  correlation: {}", saga.context.correlation_id);
        let _ = writeln!(
            output,
            "  started:     {}",
            saga.started_at.format(TIME_FORMAT)
        );
        if let Some(completed_at) = saga.completed_at {
            let _ = writeln!(output, "  finished:    {}", completed_at.format(TIME_FORMAT));
        }
        if let Some(error) = &saga.error {
            let _ = writeln!(output, "  error:       {error}");
        }
    }

    fn format_steps(output: &mut String, saga: &SagaInstance) {
        if saga.step_states.is_empty() {
            return;
        }

        output.push('\n');
        output.push_str("Steps:\n");
        for line in saga.summary().lines() {
            let _ = writeln!(output, "  {line}");
        }
    }

    fn format_compensated(output: &mut String, saga: &SagaInstance) {
        if saga.compensated_steps.is_empty() {
            return;
        }

        output.push('\n');
        let _ = writeln!(
            output,
            "Compensated (in order): {}",
            saga.compensated_steps.join(", ")
        );
    }

    fn format_row(output: &mut String, saga: &SagaInstance) {
        let _ = writeln!(
            output,
            "{}  {:<12} {}  {}",
            saga.started_at.format(TIME_FORMAT),
            saga.status.as_str(),
            saga.id,
            saga.workflow_type
        );
    }
}

impl SagaFormatter for PlainTextFormatter {
    fn format_saga(&self, saga: &SagaInstance) -> Result<String> {
        let mut output = String::new();
        Self::format_header(&mut output, saga);
        Self::format_steps(&mut output, saga);
        Self::format_compensated(&mut output, saga);
        Ok(output)
    }

    fn format_list(&self, sagas: &[SagaInstance]) -> Result<String> {
        if sagas.is_empty() {
            return Ok("No sagas found.\n".to_string());
        }

        let mut output = String::new();
        for saga in sagas {
            Self::format_row(&mut output, saga);
        }
        let _ = writeln!(output, "\n{} saga(s)", sagas.len());
        Ok(output)
    }
}
