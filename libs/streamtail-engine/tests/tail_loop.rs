mod common;

use std::time::Duration;

use prost::Message;
use tokio_util::sync::CancellationToken;

use streamtail_api::{
    Block, BrokerError, ErrorKind, ReadReply, RecordId, StreamBatch, StreamId, StreamRecord,
};
use streamtail_engine::{
    FileCursorStore, MemoryCursorStore, MemoryStream, RetryPolicy, TailError, TailLoop,
    TailSettings,
};
use streamtail_schema::integration::{JoinEvent, StatusEvent, UplinkEvent};
use streamtail_schema::frame::{DownlinkFrameLog, UplinkFrameLog};
use streamtail_schema::meta::{DownlinkMeta, UplinkMeta};
use streamtail_schema::{DeviceEvent, FrameLog, FrameMeta};

use common::{wait_for, CollectSink, FlakyReader, ScriptedReader, SharedStore};

const EVENTS: &str = "device:stream:event";

fn status(margin: i32) -> Vec<u8> {
    StatusEvent { margin, ..Default::default() }.encode_to_vec()
}

#[tokio::test]
async fn mixed_batch_emits_only_the_valid_record() {
    let stream = MemoryStream::new(EVENTS);
    stream.append_with_id(RecordId::new(1, 0), [("status", status(10))]).unwrap();
    stream.append_with_id(RecordId::new(2, 0), [("up", vec![0x0a, 0x05, 0x01])]).unwrap();
    let last = stream.append_with_id(RecordId::new(3, 0), [("foo", b"bar".to_vec())]).unwrap();

    let sink = CollectSink::<DeviceEvent>::new();
    let store = SharedStore::default();
    let mut tail = TailLoop::new(
        TailSettings::new(EVENTS),
        stream.reader(),
        sink.clone(),
        Box::new(store.clone()),
    )
    .unwrap();

    let token = CancellationToken::new();
    let handle = tokio::spawn({
        let token = token.clone();
        async move {
            let result = tail.run(token).await;
            (tail, result)
        }
    });

    wait_for(|| store.get() == Some(last)).await;
    token.cancel();
    let (tail, result) = handle.await.unwrap();
    result.unwrap();

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, RecordId::new(1, 0));
    assert!(matches!(&events[0].1, DeviceEvent::Status(pl) if pl.margin == 10));

    assert_eq!(tail.cursor(), last);
    let stats = tail.stats();
    assert_eq!(stats.records, 3);
    assert_eq!(stats.emitted, 1);
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.unmatched, 1);
}

#[tokio::test]
async fn cursor_follows_records_across_batches() {
    let stream = MemoryStream::new(EVENTS);
    let mut last = RecordId::ZERO;
    for i in 0..25 {
        last = stream.append([("status", status(i))]);
    }

    let sink = CollectSink::<DeviceEvent>::new();
    let store = SharedStore::default();
    let mut settings = TailSettings::new(EVENTS);
    settings.batch_size = 10;
    let mut tail = TailLoop::new(settings, stream.reader(), sink.clone(), Box::new(store.clone())).unwrap();

    let token = CancellationToken::new();
    let handle = tokio::spawn({
        let token = token.clone();
        async move {
            let result = tail.run(token).await;
            (tail, result)
        }
    });

    wait_for(|| store.get() == Some(last)).await;
    token.cancel();
    let (tail, result) = handle.await.unwrap();
    result.unwrap();

    let ids = sink.ids();
    assert_eq!(ids.len(), 25);
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "each record emitted once, in order");
    assert_eq!(tail.cursor(), last);
}

#[tokio::test]
async fn reads_are_bounded_by_batch_size() {
    let records: Vec<StreamRecord> = (1..=3)
        .map(|ms| StreamRecord::new(RecordId::new(ms, 0)).with_field("status", status(0)))
        .collect();
    let reader = ScriptedReader::new([Ok(ReadReply::single(StreamId::new(EVENTS), records))]);
    let requests = reader.requests.clone();

    let mut settings = TailSettings::new(EVENTS);
    settings.batch_size = 3;
    settings.start = RecordId::new(0, 5);
    let store = SharedStore::default();
    let mut tail = TailLoop::new(settings, reader, CollectSink::<DeviceEvent>::new(), Box::new(store.clone())).unwrap();

    let token = CancellationToken::new();
    let handle = tokio::spawn({
        let token = token.clone();
        async move { tail.run(token).await }
    });

    wait_for(|| requests.lock().unwrap().len() == 2).await;
    token.cancel();
    handle.await.unwrap().unwrap();

    let requests = requests.lock().unwrap();
    assert_eq!(requests[0].after, RecordId::new(0, 5));
    assert_eq!(requests[0].count, 3);
    assert_eq!(requests[0].block, Block::Forever);
    assert_eq!(requests[1].after, RecordId::new(3, 0));
}

#[tokio::test]
async fn empty_reply_means_poll_again() {
    let record = StreamRecord::new(RecordId::new(7, 0)).with_field("status", status(1));
    let reader = ScriptedReader::new([
        Ok(ReadReply::empty()),
        Ok(ReadReply::single(StreamId::new(EVENTS), Vec::new())),
        Ok(ReadReply::single(StreamId::new(EVENTS), vec![record])),
    ]);
    let requests = reader.requests.clone();
    let sink = CollectSink::<DeviceEvent>::new();
    let mut tail = TailLoop::new(
        TailSettings::new(EVENTS),
        reader,
        sink.clone(),
        Box::new(MemoryCursorStore::new()),
    )
    .unwrap();

    let token = CancellationToken::new();
    let handle = tokio::spawn({
        let token = token.clone();
        async move { tail.run(token).await }
    });

    wait_for(|| sink.len() == 1).await;
    token.cancel();
    handle.await.unwrap().unwrap();

    let requests = requests.lock().unwrap();
    assert!(requests[..3].iter().all(|r| r.after == RecordId::ZERO));
}

#[tokio::test]
async fn up_wins_over_join_on_the_same_record() {
    let stream = MemoryStream::new(EVENTS);
    let id = stream.append([
        ("join", JoinEvent { dev_addr: "01020304".into(), ..Default::default() }.encode_to_vec()),
        ("up", UplinkEvent { f_port: 10, ..Default::default() }.encode_to_vec()),
    ]);

    let sink = CollectSink::<DeviceEvent>::new();
    let store = SharedStore::default();
    let mut tail =
        TailLoop::new(TailSettings::new(EVENTS), stream.reader(), sink.clone(), Box::new(store.clone())).unwrap();

    let token = CancellationToken::new();
    let handle = tokio::spawn({
        let token = token.clone();
        async move { tail.run(token).await }
    });
    wait_for(|| store.get() == Some(id)).await;
    token.cancel();
    handle.await.unwrap().unwrap();

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0].1, DeviceEvent::Up(pl) if pl.f_port == 10));
}

#[tokio::test]
async fn meta_stream_dispatches_down() {
    let stream = MemoryStream::new("stream:meta");
    stream.append([("up", UplinkMeta { phy_payload_byte_count: 20, ..Default::default() }.encode_to_vec())]);
    let last = stream.append([(
        "down",
        DownlinkMeta { gateway_id: "0102030405060708".into(), ..Default::default() }.encode_to_vec(),
    )]);

    let sink = CollectSink::<FrameMeta>::new();
    let store = SharedStore::default();
    let mut tail = TailLoop::new(
        TailSettings::new("stream:meta"),
        stream.reader(),
        sink.clone(),
        Box::new(store.clone()),
    )
    .unwrap();

    let token = CancellationToken::new();
    let handle = tokio::spawn({
        let token = token.clone();
        async move { tail.run(token).await }
    });
    wait_for(|| store.get() == Some(last)).await;
    token.cancel();
    handle.await.unwrap().unwrap();

    let events = sink.events.lock().unwrap();
    assert!(matches!(&events[0].1, FrameMeta::Uplink(pl) if pl.phy_payload_byte_count == 20));
    assert!(matches!(&events[1].1, FrameMeta::Downlink(pl) if pl.gateway_id == "0102030405060708"));
}

#[tokio::test]
async fn gateway_frame_log_dispatches_both_directions() {
    let key = "gw:{0807060504030201}:stream:frame";
    let stream = MemoryStream::new(key);
    stream.append([("up", UplinkFrameLog { dev_addr: "01020304".into(), ..Default::default() }.encode_to_vec())]);
    stream.append([("stats", vec![0x01])]);
    let last = stream.append([(
        "down",
        DownlinkFrameLog { gateway_id: "0807060504030201".into(), downlink_id: 9, ..Default::default() }
            .encode_to_vec(),
    )]);

    let sink = CollectSink::<FrameLog>::new();
    let store = SharedStore::default();
    let mut tail =
        TailLoop::new(TailSettings::new(key), stream.reader(), sink.clone(), Box::new(store.clone())).unwrap();

    let token = CancellationToken::new();
    let handle = tokio::spawn({
        let token = token.clone();
        async move { tail.run(token).await }
    });
    wait_for(|| store.get() == Some(last)).await;
    token.cancel();
    handle.await.unwrap().unwrap();

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0].1, FrameLog::Uplink(pl) if pl.dev_addr == "01020304"));
    assert!(matches!(&events[1].1, FrameLog::Downlink(pl) if pl.downlink_id == 9));
    assert_eq!(events[1].0, last);
}

#[tokio::test]
async fn blocked_read_resumes_on_append() {
    let stream = MemoryStream::new(EVENTS);
    let sink = CollectSink::<DeviceEvent>::new();
    let mut tail = TailLoop::new(
        TailSettings::new(EVENTS),
        stream.reader(),
        sink.clone(),
        Box::new(MemoryCursorStore::new()),
    )
    .unwrap();

    let token = CancellationToken::new();
    let handle = tokio::spawn({
        let token = token.clone();
        async move { tail.run(token).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());
    assert_eq!(sink.len(), 0);

    let id = stream.append([("status", status(3))]);
    wait_for(|| sink.len() == 1).await;
    assert_eq!(sink.ids(), vec![id]);

    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("cancellation interrupts the blocked read")
        .unwrap()
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn transient_errors_are_retried() {
    let stream = MemoryStream::new(EVENTS);
    let id = stream.append([("status", status(5))]);
    let reader = FlakyReader::new(stream.reader(), 2, BrokerError::io("connection refused"));
    let calls = reader.calls.clone();

    let sink = CollectSink::<DeviceEvent>::new();
    let mut tail =
        TailLoop::new(TailSettings::new(EVENTS), reader, sink.clone(), Box::new(MemoryCursorStore::new())).unwrap();

    let start = tokio::time::Instant::now();
    let token = CancellationToken::new();
    let handle = tokio::spawn({
        let token = token.clone();
        async move { tail.run(token).await }
    });

    wait_for(|| sink.len() == 1).await;
    // 500 ms then 1 s of backoff before the third read succeeds
    assert!(start.elapsed() >= Duration::from_millis(1500));
    token.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(sink.ids(), vec![id]);
    assert!(*calls.lock().unwrap() >= 3);
}

#[tokio::test(start_paused = true)]
async fn retry_budget_is_bounded() {
    let stream = MemoryStream::new(EVENTS);
    let reader = FlakyReader::new(stream.reader(), u32::MAX, BrokerError::io("connection reset"));
    let calls = reader.calls.clone();

    let settings = TailSettings::new(EVENTS);
    assert_eq!(settings.retry, RetryPolicy::default());
    let mut tail =
        TailLoop::new(settings, reader, CollectSink::<DeviceEvent>::new(), Box::new(MemoryCursorStore::new())).unwrap();

    let start = tokio::time::Instant::now();
    let err = tail.run(CancellationToken::new()).await.unwrap_err();
    match err {
        TailError::RetriesExhausted { attempts, source, .. } => {
            assert_eq!(attempts, 5);
            assert_eq!(source.kind(), ErrorKind::Io);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(*calls.lock().unwrap(), 6);
    // 0.5 + 1 + 2 + 4 + 8 seconds of backoff
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(15_500), "waited {waited:?}");
    assert!(waited < Duration::from_secs(16), "waited {waited:?}");
}

#[tokio::test]
async fn zero_retries_fails_on_first_error() {
    let stream = MemoryStream::new(EVENTS);
    let reader = FlakyReader::new(stream.reader(), 1, BrokerError::io("connection refused"));

    let mut settings = TailSettings::new(EVENTS);
    settings.retry = RetryPolicy::never();
    let mut tail =
        TailLoop::new(settings, reader, CollectSink::<DeviceEvent>::new(), Box::new(MemoryCursorStore::new())).unwrap();

    let err = tail.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, TailError::Broker { ref source, .. } if source.kind() == ErrorKind::Io));
}

#[tokio::test]
async fn response_errors_are_not_retried() {
    let stream = MemoryStream::new(EVENTS);
    let reader = FlakyReader::new(stream.reader(), 1, BrokerError::response("WRONGTYPE"));
    let calls = reader.calls.clone();

    let mut tail = TailLoop::new(
        TailSettings::new(EVENTS),
        reader,
        CollectSink::<DeviceEvent>::new(),
        Box::new(MemoryCursorStore::new()),
    )
    .unwrap();

    let err = tail.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, TailError::Broker { ref source, .. } if source.kind() == ErrorKind::Response));
    assert_eq!(*calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn multi_stream_reply_is_a_protocol_violation() {
    let record = StreamRecord::new(RecordId::new(1, 0)).with_field("status", status(0));
    let reply = ReadReply {
        streams: vec![
            StreamBatch { stream: StreamId::new(EVENTS), records: vec![record.clone()] },
            StreamBatch { stream: StreamId::new("other"), records: vec![record] },
        ],
    };
    let sink = CollectSink::<DeviceEvent>::new();

    let mut tail = TailLoop::new(
        TailSettings::new(EVENTS),
        ScriptedReader::new([Ok(reply)]),
        sink.clone(),
        Box::new(MemoryCursorStore::new()),
    )
    .unwrap();

    let err = tail.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, TailError::Broker { ref source, .. } if source.kind() == ErrorKind::Protocol));
    assert_eq!(sink.len(), 0);
    assert!(tail.cursor().is_zero());
}

#[tokio::test]
async fn foreign_stream_reply_is_a_protocol_violation() {
    let record = StreamRecord::new(RecordId::new(1, 0)).with_field("status", status(0));
    let mut tail = TailLoop::new(
        TailSettings::new(EVENTS),
        ScriptedReader::new([Ok(ReadReply::single(StreamId::new("stream:meta"), vec![record]))]),
        CollectSink::<DeviceEvent>::new(),
        Box::new(MemoryCursorStore::new()),
    )
    .unwrap();

    let err = tail.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, TailError::Broker { ref source, .. } if source.kind() == ErrorKind::Protocol));
}

#[tokio::test]
async fn older_record_is_a_cursor_regression() {
    let record = StreamRecord::new(RecordId::new(4, 0)).with_field("foo", Vec::new());
    let mut settings = TailSettings::new(EVENTS);
    settings.start = RecordId::new(9, 0);
    let mut tail = TailLoop::new(
        settings,
        ScriptedReader::new([Ok(ReadReply::single(StreamId::new(EVENTS), vec![record]))]),
        CollectSink::<DeviceEvent>::new(),
        Box::new(MemoryCursorStore::new()),
    )
    .unwrap();

    let err = tail.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, TailError::CursorRegression { .. }));
    assert_eq!(tail.cursor(), RecordId::new(9, 0));
}

#[tokio::test]
async fn sink_failure_stops_before_the_failed_record() {
    let stream = MemoryStream::new(EVENTS);
    let first = stream.append([("status", status(1))]);
    let second = stream.append([("status", status(2))]);
    stream.append([("status", status(3))]);

    let store = SharedStore::default();
    let mut tail = TailLoop::new(
        TailSettings::new(EVENTS),
        stream.reader(),
        CollectSink::<DeviceEvent>::failing_at(1),
        Box::new(store.clone()),
    )
    .unwrap();

    let err = tail.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, TailError::Sink { id, .. } if id == second));
    assert_eq!(tail.cursor(), first);
    assert_eq!(store.get(), Some(first));
    assert_eq!(tail.sink().ids(), vec![first]);
}

#[tokio::test]
async fn zero_batch_size_is_rejected() {
    let mut settings = TailSettings::new(EVENTS);
    settings.batch_size = 0;
    let result = TailLoop::new(
        settings,
        ScriptedReader::idle(),
        CollectSink::<DeviceEvent>::new(),
        Box::new(MemoryCursorStore::new()),
    );
    assert!(matches!(result, Err(TailError::Config(_))));
}

#[tokio::test]
async fn file_cursor_resumes_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let cursor_file = dir.path().join("events.cursor");
    let stream = MemoryStream::new(EVENTS);
    for i in 0..3 {
        stream.append([("status", status(i))]);
    }
    let first_run_last = stream.last_id();

    {
        let sink = CollectSink::<DeviceEvent>::new();
        let mut tail = TailLoop::new(
            TailSettings::new(EVENTS),
            stream.reader(),
            sink.clone(),
            Box::new(FileCursorStore::new(&cursor_file)),
        )
        .unwrap();
        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let token = token.clone();
            async move { tail.run(token).await }
        });
        wait_for(|| sink.len() == 3).await;
        token.cancel();
        handle.await.unwrap().unwrap();
    }

    assert_eq!(
        std::fs::read_to_string(&cursor_file).unwrap().trim(),
        first_run_last.to_string()
    );

    let fresh = stream.append([("status", status(99))]);
    let sink = CollectSink::<DeviceEvent>::new();
    let mut tail = TailLoop::new(
        TailSettings::new(EVENTS),
        stream.reader(),
        sink.clone(),
        Box::new(FileCursorStore::new(&cursor_file)),
    )
    .unwrap();
    assert_eq!(tail.cursor(), first_run_last);

    let token = CancellationToken::new();
    let handle = tokio::spawn({
        let token = token.clone();
        async move { tail.run(token).await }
    });
    wait_for(|| sink.len() == 1).await;
    token.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(sink.ids(), vec![fresh]);
}
