use std::future::Future;
use std::pin::Pin;

use redis::aio::MultiplexedConnection;
use redis::streams::StreamReadReply;

use streamtail_api::{BrokerError, ReadReply, ReadRequest, StreamReader};

use crate::convert::{classify, convert_reply, xread_args};

/// Accepts `host:port` as well as `redis://` / `rediss://` URLs.
pub fn server_url(server: &str) -> String {
    if server.contains("://") {
        server.to_string()
    } else {
        format!("redis://{server}")
    }
}

/// One connection, one stream. The connection is opened lazily and dropped
/// after a transport failure so the next read reconnects.
pub struct RedisStreamReader {
    client: redis::Client,
    conn: Option<MultiplexedConnection>,
}

impl RedisStreamReader {
    pub fn open(server: &str) -> Result<Self, BrokerError> {
        let url = server_url(server);
        let client = redis::Client::open(url.as_str())
            .map_err(|e| BrokerError::response(e.to_string()).with_context(format!("open {url}")))?;
        Ok(Self { client, conn: None })
    }

    async fn connection(&mut self) -> Result<MultiplexedConnection, BrokerError> {
        if let Some(conn) = &self.conn {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| classify(e).with_context("connect"))?;
        tracing::debug!(addr = ?self.client.get_connection_info().addr, "redis connected");
        self.conn = Some(conn.clone());
        Ok(conn)
    }

    async fn xread(&mut self, request: &ReadRequest) -> Result<ReadReply, BrokerError> {
        let mut conn = self.connection().await?;

        let mut cmd = redis::cmd("XREAD");
        for arg in xread_args(request) {
            cmd.arg(arg);
        }

        // A BLOCK that expires answers nil.
        let result: redis::RedisResult<Option<StreamReadReply>> = cmd.query_async(&mut conn).await;
        match result {
            Ok(srr) => convert_reply(srr.unwrap_or_default()),
            Err(e) => {
                let e = classify(e);
                if e.is_transient() {
                    self.conn = None;
                }
                Err(e.with_context(format!("XREAD {}", request.stream)))
            }
        }
    }
}

impl StreamReader for RedisStreamReader {
    fn read<'a>(
        &'a mut self,
        request: &'a ReadRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ReadReply, BrokerError>> + Send + 'a>> {
        Box::pin(self.xread(request))
    }
}
