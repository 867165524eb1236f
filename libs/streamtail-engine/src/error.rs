use streamtail_api::{BrokerError, RecordId, SinkError, StreamId};

use crate::store::StoreError;

/// Terminal failure of a tail loop. Everything that reaches this type has
/// already been judged non-recoverable.
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("config error: {0}")]
    Config(String),

    #[error("broker error ({stream}): {source}")]
    Broker { stream: StreamId, source: BrokerError },

    #[error("broker still failing after {attempts} retries ({stream}): {source}")]
    RetriesExhausted {
        stream: StreamId,
        attempts: u32,
        source: BrokerError,
    },

    #[error("cursor regression: {current} -> {attempted}")]
    CursorRegression { current: RecordId, attempted: RecordId },

    #[error("sink error at {id}: {source}")]
    Sink { id: RecordId, source: SinkError },

    #[error("cursor store: {0}")]
    Store(#[from] StoreError),
}

impl TailError {
    /// Prepends context to message-only variants.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            TailError::Config(msg) => TailError::Config(format!("{ctx}: {msg}")),
            TailError::Broker { stream, source } => TailError::Broker {
                stream,
                source: source.with_context(ctx),
            },
            other => other,
        }
    }
}
