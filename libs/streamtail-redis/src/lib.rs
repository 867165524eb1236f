//! Redis Streams implementation of [`StreamReader`](streamtail_api::StreamReader).

mod convert;
mod reader;

pub use convert::{classify, convert_reply, xread_args};
pub use reader::{server_url, RedisStreamReader};
