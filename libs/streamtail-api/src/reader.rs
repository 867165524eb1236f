use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::BrokerError;
use crate::record::{RecordId, StreamId, StreamRecord};

/// How long a read may wait for records to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Block {
    /// Wait until at least one record is available.
    #[default]
    Forever,
    /// Wait at most this long, then reply with nothing.
    For(Duration),
    /// Return immediately.
    NoWait,
}

/// One read call against exactly one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub stream: StreamId,
    /// Exclusive lower bound: only records with `id > after` are returned.
    pub after: RecordId,
    /// Upper bound on records per reply.
    pub count: usize,
    pub block: Block,
}

impl ReadRequest {
    pub fn new(stream: StreamId, after: RecordId, count: usize, block: Block) -> Self {
        Self { stream, after, count, block }
    }
}

/// Records of one stream, in broker order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamBatch {
    pub stream: StreamId,
    pub records: Vec<StreamRecord>,
}

/// Broker reply. A well-behaved broker describes only the requested stream,
/// or nothing at all when a finite block expired.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadReply {
    pub streams: Vec<StreamBatch>,
}

impl ReadReply {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(stream: StreamId, records: Vec<StreamRecord>) -> Self {
        Self {
            streams: vec![StreamBatch { stream, records }],
        }
    }
}

/// Broker client: ordered, durable, append-only log with an id cursor
/// and long-poll reads.
///
/// Implementations: `RedisStreamReader` (XREAD), `MemoryStreamReader`.
pub trait StreamReader: Send {
    /// Read records after `request.after`. Suspends according to
    /// `request.block` while the stream has nothing newer.
    fn read<'a>(
        &'a mut self,
        request: &'a ReadRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ReadReply, BrokerError>> + Send + 'a>>;
}

impl<R: StreamReader + ?Sized> StreamReader for Box<R> {
    fn read<'a>(
        &'a mut self,
        request: &'a ReadRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ReadReply, BrokerError>> + Send + 'a>> {
        (**self).read(request)
    }
}
