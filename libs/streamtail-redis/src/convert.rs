use std::collections::BTreeMap;

use redis::streams::StreamReadReply;
use redis::Value;

use streamtail_api::{
    Block, BrokerError, ReadReply, ReadRequest, RecordId, StreamBatch, StreamId, StreamRecord,
};

/// `XREAD [COUNT n] [BLOCK ms] STREAMS <key> <id>` arguments for one request.
pub fn xread_args(request: &ReadRequest) -> Vec<String> {
    let mut args = Vec::with_capacity(7);
    if request.count > 0 {
        args.push("COUNT".to_string());
        args.push(request.count.to_string());
    }
    match request.block {
        Block::Forever => {
            args.push("BLOCK".to_string());
            args.push("0".to_string());
        }
        Block::For(d) => {
            // BLOCK 0 would mean forever.
            args.push("BLOCK".to_string());
            args.push(d.as_millis().max(1).to_string());
        }
        Block::NoWait => {}
    }
    args.push("STREAMS".to_string());
    args.push(request.stream.as_str().to_string());
    args.push(request.after.to_string());
    args
}

/// Map a client error onto the retry taxonomy: transport trouble is `Io`,
/// a reply we could not parse is `Protocol`, anything the server said is
/// `Response`.
pub fn classify(e: redis::RedisError) -> BrokerError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
        BrokerError::io(e.to_string())
    } else if e.kind() == redis::ErrorKind::TypeError {
        BrokerError::protocol(e.to_string())
    } else {
        BrokerError::response(e.to_string())
    }
}

pub fn convert_reply(srr: StreamReadReply) -> Result<ReadReply, BrokerError> {
    let streams = srr
        .keys
        .into_iter()
        .map(|key| {
            let records = key
                .ids
                .into_iter()
                .map(convert_record)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(StreamBatch {
                stream: StreamId::new(key.key),
                records,
            })
        })
        .collect::<Result<Vec<_>, BrokerError>>()?;
    Ok(ReadReply { streams })
}

fn convert_record(entry: redis::streams::StreamId) -> Result<StreamRecord, BrokerError> {
    let id = entry
        .id
        .parse::<RecordId>()
        .map_err(|e| BrokerError::protocol(e.to_string()))?;

    let mut fields = BTreeMap::new();
    for (name, value) in entry.map {
        let bytes = match value {
            Value::BulkString(b) => b,
            Value::SimpleString(s) => s.into_bytes(),
            Value::Int(i) => i.to_string().into_bytes(),
            other => {
                return Err(BrokerError::protocol(format!(
                    "record {id}: field '{name}' is not a string: {other:?}"
                )));
            }
        };
        fields.insert(name, bytes);
    }
    Ok(StreamRecord { id, fields })
}
