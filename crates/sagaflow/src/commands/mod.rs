mod history;
mod list;
mod show;

use clap::Subcommand;
use sagaflow_engine::SagaEngine;

use crate::error::Result;
use crate::output::SagaFormatter;

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Show one stored saga with its step audit
    Show {
        /// Id of the saga to show
        saga_id: String,
    },
    /// List sagas whose metadata mentions an aggregate, newest first
    History {
        /// Kind of aggregate, e.g. `Issue`
        aggregate_type: String,
        /// Aggregate id searched for in saga metadata
        aggregate_id: String,
    },
    /// List every stored saga, newest first
    List,
}

impl Commands {
    pub(crate) async fn execute(
        self,
        engine: &SagaEngine,
        formatter: &dyn SagaFormatter,
    ) -> Result<String> {
        match self {
            Self::Show { saga_id } => show::run(engine, formatter, &saga_id).await,
            Self::History {
                aggregate_type,
                aggregate_id,
            } => history::run(engine, formatter, &aggregate_type, &aggregate_id).await,
            Self::List => list::run(engine, formatter).await,
        }
    }
}
