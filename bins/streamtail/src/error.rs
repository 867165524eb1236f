use streamtail_api::BrokerError;
use streamtail_engine::TailError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("tail '{name}': {source}")]
    Tail { name: String, source: TailError },

    #[error("broker: {0}")]
    Broker(#[from] BrokerError),

    #[error("task '{name}' aborted: {detail}")]
    Join { name: String, detail: String },
}

impl CliError {
    pub fn config(context: &'static str, detail: impl Into<String>) -> Self {
        CliError::Config { context, detail: detail.into() }
    }
}
