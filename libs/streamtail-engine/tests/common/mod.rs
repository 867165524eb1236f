#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use streamtail_api::{
    BrokerError, EventSink, ReadReply, ReadRequest, RecordId, SinkError, StreamReader,
};
use streamtail_engine::{CursorStore, StoreError};

/// Records every emitted event, shared with the test body.
#[derive(Clone)]
pub struct CollectSink<E> {
    pub events: Arc<Mutex<Vec<(RecordId, E)>>>,
    fail_at: Option<usize>,
}

impl<E> CollectSink<E> {
    pub fn new() -> Self {
        Self { events: Arc::new(Mutex::new(Vec::new())), fail_at: None }
    }

    /// Fails the emit call with this 0-based index.
    pub fn failing_at(index: usize) -> Self {
        Self { events: Arc::new(Mutex::new(Vec::new())), fail_at: Some(index) }
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.events.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }
}

impl<E: Clone + Send> EventSink<E> for CollectSink<E> {
    fn emit(&mut self, id: &RecordId, event: &E) -> Result<(), SinkError> {
        let mut events = self.events.lock().unwrap();
        if self.fail_at == Some(events.len()) {
            return Err(SinkError::Closed);
        }
        events.push((*id, event.clone()));
        Ok(())
    }
}

/// Cursor store whose saved value stays visible to the test.
#[derive(Clone, Default)]
pub struct SharedStore {
    pub saved: Arc<Mutex<Option<RecordId>>>,
}

impl SharedStore {
    pub fn get(&self) -> Option<RecordId> {
        *self.saved.lock().unwrap()
    }
}

impl CursorStore for SharedStore {
    fn load(&mut self) -> Result<Option<RecordId>, StoreError> {
        Ok(self.get())
    }

    fn save(&mut self, id: RecordId) -> Result<(), StoreError> {
        *self.saved.lock().unwrap() = Some(id);
        Ok(())
    }
}

/// Plays back canned replies, then blocks forever.
pub struct ScriptedReader {
    script: VecDeque<Result<ReadReply, BrokerError>>,
    pub requests: Arc<Mutex<Vec<ReadRequest>>>,
}

impl ScriptedReader {
    pub fn new(script: impl IntoIterator<Item = Result<ReadReply, BrokerError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Never answers.
    pub fn idle() -> Self {
        Self {
            script: VecDeque::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl StreamReader for ScriptedReader {
    fn read<'a>(
        &'a mut self,
        request: &'a ReadRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ReadReply, BrokerError>> + Send + 'a>> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.pop_front();
        Box::pin(async move {
            match next {
                Some(reply) => reply,
                None => std::future::pending().await,
            }
        })
    }
}

/// Fails the first `failures` reads with `error`, then delegates.
pub struct FlakyReader<R> {
    inner: R,
    failures: u32,
    error: BrokerError,
    pub calls: Arc<Mutex<u32>>,
}

impl<R> FlakyReader<R> {
    pub fn new(inner: R, failures: u32, error: BrokerError) -> Self {
        Self { inner, failures, error, calls: Arc::new(Mutex::new(0)) }
    }
}

impl<R: StreamReader> StreamReader for FlakyReader<R> {
    fn read<'a>(
        &'a mut self,
        request: &'a ReadRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ReadReply, BrokerError>> + Send + 'a>> {
        *self.calls.lock().unwrap() += 1;
        if self.failures > 0 {
            self.failures -= 1;
            let error = self.error.clone();
            return Box::pin(async move { Err(error) });
        }
        self.inner.read(request)
    }
}

/// Poll `cond` until it holds, panicking after two seconds.
pub async fn wait_for(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
