//! In-process append-only stream with Redis stream semantics: ids are
//! assigned as `<ms>-<seq>`, reads return records strictly after a cursor,
//! and a blocking read suspends until something newer is appended.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Notify;

use streamtail_api::{
    Block, BrokerError, ReadReply, ReadRequest, RecordId, StreamId, StreamReader, StreamRecord,
};

#[derive(Debug, Default)]
struct State {
    records: Vec<StreamRecord>,
    last: RecordId,
}

#[derive(Debug)]
struct Inner {
    name: StreamId,
    state: Mutex<State>,
    appended: Notify,
}

/// Cheap to clone; clones share the same log.
#[derive(Debug, Clone)]
pub struct MemoryStream {
    inner: Arc<Inner>,
}

impl MemoryStream {
    pub fn new(name: impl Into<StreamId>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                state: Mutex::new(State::default()),
                appended: Notify::new(),
            }),
        }
    }

    pub fn name(&self) -> &StreamId {
        &self.inner.name
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // Appends never panic while holding the lock, a poisoned state is still consistent.
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append with a broker-style id: current wall-clock millisecond, or
    /// the next sequence number when the clock has not moved past the top
    /// record.
    pub fn append<I, K, V>(&self, fields: I) -> RecordId
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let mut state = self.state();
        let id = if now_ms > state.last.ms {
            RecordId::new(now_ms, 0)
        } else {
            state.last.successor()
        };
        Self::push(&mut state, id, fields);
        drop(state);

        self.inner.appended.notify_waiters();
        id
    }

    /// Append with an explicit id. Like XADD, the id must be greater than
    /// the current top record and than `0-0`.
    pub fn append_with_id<I, K, V>(&self, id: RecordId, fields: I) -> Result<RecordId, BrokerError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let mut state = self.state();
        if id <= state.last {
            return Err(BrokerError::response(format!(
                "ERR The ID specified in XADD is equal or smaller than the target stream top item ({} <= {})",
                id, state.last
            )));
        }
        Self::push(&mut state, id, fields);
        drop(state);

        self.inner.appended.notify_waiters();
        Ok(id)
    }

    fn push<I, K, V>(state: &mut State, id: RecordId, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let mut record = StreamRecord::new(id);
        for (name, value) in fields {
            record = record.with_field(name, value);
        }
        state.records.push(record);
        state.last = id;
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_id(&self) -> RecordId {
        self.state().last
    }

    pub fn reader(&self) -> MemoryStreamReader {
        MemoryStreamReader { stream: self.clone() }
    }

    /// Records with `id > after`, at most `count` (0 = no limit).
    fn range_after(&self, after: RecordId, count: usize) -> Vec<StreamRecord> {
        let state = self.state();
        let start = state.records.partition_point(|r| r.id <= after);
        let limit = if count == 0 { usize::MAX } else { count };
        state.records[start..].iter().take(limit).cloned().collect()
    }
}

/// [`StreamReader`] over a [`MemoryStream`].
#[derive(Debug, Clone)]
pub struct MemoryStreamReader {
    stream: MemoryStream,
}

impl MemoryStreamReader {
    async fn read_inner(&self, request: &ReadRequest) -> Result<ReadReply, BrokerError> {
        if &request.stream != self.stream.name() {
            return Err(BrokerError::response(format!(
                "unknown stream '{}' (this reader serves '{}')",
                request.stream,
                self.stream.name()
            )));
        }

        let deadline = match request.block {
            Block::For(d) => Some(tokio::time::Instant::now() + d),
            _ => None,
        };

        loop {
            // Register interest before looking, so an append between the
            // check and the await still wakes us.
            let notified = self.stream.inner.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let records = self.stream.range_after(request.after, request.count);
            if !records.is_empty() {
                return Ok(ReadReply::single(request.stream.clone(), records));
            }

            match (request.block, deadline) {
                (Block::NoWait, _) => return Ok(ReadReply::empty()),
                (Block::For(_), Some(deadline)) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Ok(ReadReply::empty());
                    }
                }
                _ => notified.await,
            }
        }
    }
}

impl StreamReader for MemoryStreamReader {
    fn read<'a>(
        &'a mut self,
        request: &'a ReadRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ReadReply, BrokerError>> + Send + 'a>> {
        Box::pin(self.read_inner(request))
    }
}
