pub mod backoff;
pub mod config;
pub mod cursor;
pub mod demux;
pub mod error;
pub mod memory;
pub mod sink;
pub mod store;
pub mod tail;

pub use backoff::{BackoffPolicy, RetryPolicy};
pub use cursor::Cursor;
pub use demux::{Demultiplexer, Demuxed};
pub use error::TailError;
pub use memory::{MemoryStream, MemoryStreamReader};
pub use sink::{ConsoleSink, OutputStyle};
pub use store::{CursorStore, FileCursorStore, MemoryCursorStore, StoreError};
pub use tail::{TailLoop, TailSettings, TailStats};
