use std::fmt;

/// Category of a broker error. Lets the tail loop decide between
/// retrying and terminating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection refused/dropped, timeouts. Transient, may retry.
    Io,
    /// Reply violates the read contract (foreign stream, bad id).
    Protocol,
    /// Broker answered with an error reply.
    Response,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Protocol => f.write_str("protocol"),
            ErrorKind::Response => f.write_str("response"),
        }
    }
}

/// Error returned by [`StreamReader`](crate::StreamReader) implementations.
#[derive(Clone)]
pub struct BrokerError {
    kind: ErrorKind,
    message: String,
}

impl BrokerError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Protocol, message: msg.into() }
    }

    pub fn response(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Response, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Only I/O failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Io
    }

    /// Produces `"context: original message"`, kind preserved.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Debug for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for BrokerError {}

impl From<std::io::Error> for BrokerError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

/// Bytes under a known field did not parse against that field's schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("decode '{field}': {message}")]
pub struct DecodeError {
    pub field: &'static str,
    pub message: String,
}

impl DecodeError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink io: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink format: {0}")]
    Format(String),

    #[error("sink closed")]
    Closed,
}
