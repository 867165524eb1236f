pub mod envelope;
pub mod error;
pub mod reader;
pub mod record;
pub mod sink;

pub use envelope::{Envelope, PayloadKind};
pub use error::{BrokerError, DecodeError, ErrorKind, SinkError};
pub use reader::{Block, ReadReply, ReadRequest, StreamBatch, StreamReader};
pub use record::{RecordId, StreamId, StreamRecord};
pub use sink::EventSink;
