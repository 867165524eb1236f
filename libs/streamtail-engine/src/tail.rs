use std::time::Duration;

use tokio_util::sync::CancellationToken;

use streamtail_api::{
    Block, BrokerError, Envelope, EventSink, ReadReply, ReadRequest, RecordId, StreamId, StreamReader,
    StreamRecord,
};

use crate::backoff::RetryPolicy;
use crate::cursor::Cursor;
use crate::demux::{Demultiplexer, Demuxed};
use crate::error::TailError;
use crate::store::CursorStore;

/// Everything a tail loop needs to know about its stream.
#[derive(Debug, Clone, PartialEq)]
pub struct TailSettings {
    pub stream: StreamId,
    /// Upper bound on records per read.
    pub batch_size: usize,
    /// Initial cursor when the store has nothing saved.
    pub start: RecordId,
    pub block: Block,
    pub retry: RetryPolicy,
}

impl TailSettings {
    pub fn new(stream: impl Into<StreamId>) -> Self {
        Self {
            stream: stream.into(),
            batch_size: 10,
            start: RecordId::ZERO,
            block: Block::Forever,
            retry: RetryPolicy::default(),
        }
    }
}

/// Counters kept over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailStats {
    /// Records received from the broker.
    pub records: u64,
    /// Events handed to the sink.
    pub emitted: u64,
    /// Records without any known field.
    pub unmatched: u64,
    /// Records whose known field failed to decode.
    pub decode_errors: u64,
}

// ═══════════════════════════════════════════════════════════════
//  Tail loop: read → demux → decode → emit → advance
// ═══════════════════════════════════════════════════════════════

/// Sequential consumer of one stream.
///
/// Polls the broker after the current cursor, drains each batch in
/// delivery order and advances the cursor past every record whatever its
/// outcome. Decode failures and unknown records are logged and skipped.
/// Sink failures, non-transient broker errors and an exhausted retry budget
/// end the loop.
pub struct TailLoop<E, R, S> {
    settings: TailSettings,
    reader: R,
    sink: S,
    store: Box<dyn CursorStore>,
    cursor: Cursor,
    saved: RecordId,
    demux: Demultiplexer<E>,
    stats: TailStats,
}

impl<E, R, S> TailLoop<E, R, S>
where
    E: Envelope,
    R: StreamReader,
    S: EventSink<E>,
{
    /// Builds the loop and restores its cursor. A saved cursor wins over
    /// `settings.start`.
    pub fn new(
        settings: TailSettings,
        reader: R,
        sink: S,
        mut store: Box<dyn CursorStore>,
    ) -> Result<Self, TailError> {
        if settings.batch_size == 0 {
            return Err(TailError::Config("batch_size must be > 0".into()));
        }

        let start = match store.load()? {
            Some(saved) => {
                tracing::info!(stream = %settings.stream, cursor = %saved, "cursor restored");
                saved
            }
            None => settings.start,
        };

        Ok(Self {
            settings,
            reader,
            sink,
            store,
            cursor: Cursor::new(start),
            saved: start,
            demux: Demultiplexer::new(),
            stats: TailStats::default(),
        })
    }

    pub fn settings(&self) -> &TailSettings {
        &self.settings
    }

    pub fn cursor(&self) -> RecordId {
        self.cursor.current()
    }

    pub fn stats(&self) -> TailStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run until cancelled (`Ok`) or a fatal error. The cursor is persisted
    /// on the way out in both cases.
    pub async fn run(&mut self, token: CancellationToken) -> Result<(), TailError> {
        tracing::info!(
            stream = %self.settings.stream,
            cursor = %self.cursor.current(),
            batch_size = self.settings.batch_size,
            "tail started"
        );

        let result = self.poll_loop(&token).await;
        self.persist();

        let stats = self.stats;
        match &result {
            Ok(()) => tracing::info!(
                stream = %self.settings.stream,
                cursor = %self.cursor.current(),
                records = stats.records,
                emitted = stats.emitted,
                unmatched = stats.unmatched,
                decode_errors = stats.decode_errors,
                "tail stopped"
            ),
            Err(e) => tracing::error!(
                stream = %self.settings.stream,
                cursor = %self.cursor.current(),
                records = stats.records,
                emitted = stats.emitted,
                error = %e,
                "tail failed"
            ),
        }
        result
    }

    async fn poll_loop(&mut self, token: &CancellationToken) -> Result<(), TailError> {
        let mut failures: u32 = 0;

        loop {
            let request = ReadRequest::new(
                self.settings.stream.clone(),
                self.cursor.current(),
                self.settings.batch_size,
                self.settings.block,
            );

            let reply = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                reply = self.reader.read(&request) => reply,
            };

            match reply {
                Ok(reply) => {
                    failures = 0;
                    let Some(records) = self.single_stream(reply)? else {
                        continue;
                    };
                    self.drain(records)?;
                    self.persist();
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    let delay = self.retry_delay(failures, e)?;
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    return Err(TailError::Broker {
                        stream: self.settings.stream.clone(),
                        source: e,
                    });
                }
            }
        }
    }

    fn retry_delay(&self, failures: u32, error: BrokerError) -> Result<Duration, TailError> {
        let RetryPolicy { max_retries, .. } = self.settings.retry;
        let stream = self.settings.stream.clone();

        match self.settings.retry.delay_for(failures) {
            Some(delay) => {
                tracing::warn!(
                    stream = %stream,
                    attempt = failures,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "broker read failed, retrying"
                );
                Ok(delay)
            }
            None if max_retries == 0 => Err(TailError::Broker { stream, source: error }),
            None => Err(TailError::RetriesExhausted {
                stream,
                attempts: max_retries,
                source: error,
            }),
        }
    }

    /// The reply may describe nothing (finite block expired) or exactly the
    /// requested stream. Anything else breaks the read contract.
    fn single_stream(&self, reply: ReadReply) -> Result<Option<Vec<StreamRecord>>, TailError> {
        let stream = &self.settings.stream;
        let mut streams = reply.streams;

        match streams.len() {
            0 => Ok(None),
            1 => {
                let batch = streams.remove(0);
                if &batch.stream != stream {
                    return Err(TailError::Broker {
                        stream: stream.clone(),
                        source: BrokerError::protocol(format!(
                            "reply for foreign stream '{}'",
                            batch.stream
                        )),
                    });
                }
                Ok(Some(batch.records).filter(|r| !r.is_empty()))
            }
            n => Err(TailError::Broker {
                stream: stream.clone(),
                source: BrokerError::protocol(format!("expected one stream in reply, got {n}")),
            }),
        }
    }

    fn drain(&mut self, records: Vec<StreamRecord>) -> Result<(), TailError> {
        let stream = &self.settings.stream;

        for record in records {
            self.stats.records += 1;
            tracing::trace!(stream = %stream, id = %record.id, fields = record.fields.len(), "record");

            match self.demux.demux(&record) {
                Demuxed::Event(event) => {
                    self.sink
                        .emit(&record.id, &event)
                        .map_err(|source| TailError::Sink { id: record.id, source })?;
                    self.stats.emitted += 1;
                }
                Demuxed::Unmatched => {
                    self.stats.unmatched += 1;
                    tracing::debug!(
                        stream = %stream,
                        id = %record.id,
                        fields = ?record.field_names().collect::<Vec<_>>(),
                        "no known field, skipping"
                    );
                }
                Demuxed::Malformed { kind, error } => {
                    self.stats.decode_errors += 1;
                    tracing::error!(
                        stream = %stream,
                        id = %record.id,
                        kind = %kind,
                        error = %error,
                        "decode failed, skipping"
                    );
                }
            }

            self.cursor.advance(record.id)?;
        }
        Ok(())
    }

    /// Best effort: a failed save only risks redelivery after restart.
    fn persist(&mut self) {
        let current = self.cursor.current();
        if current == self.saved {
            return;
        }
        match self.store.save(current) {
            Ok(()) => self.saved = current,
            Err(e) => tracing::warn!(
                stream = %self.settings.stream,
                cursor = %current,
                error = %e,
                "cursor save failed"
            ),
        }
    }
}
