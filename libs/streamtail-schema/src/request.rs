//! API request log (`api:stream:request`).

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use streamtail_api::{DecodeError, Envelope, PayloadKind};

use crate::util::decode_message;

/// `api.RequestLog`.
#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLog {
    #[prost(string, tag = "1")]
    pub service: String,
    #[prost(string, tag = "2")]
    pub method: String,
    #[prost(btree_map = "string, string", tag = "3")]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Request,
}

impl PayloadKind for RequestKind {
    const PRIORITY: &'static [Self] = &[RequestKind::Request];

    fn field(self) -> &'static str {
        match self {
            RequestKind::Request => "request",
        }
    }

    fn label(self) -> &'static str {
        match self {
            RequestKind::Request => "REQUEST",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApiRequest {
    Request(RequestLog),
}

impl Envelope for ApiRequest {
    type Kind = RequestKind;

    fn decode(kind: RequestKind, bytes: &[u8]) -> Result<Self, DecodeError> {
        match kind {
            RequestKind::Request => Ok(ApiRequest::Request(decode_message(kind.field(), bytes)?)),
        }
    }

    fn kind(&self) -> RequestKind {
        match self {
            ApiRequest::Request(_) => RequestKind::Request,
        }
    }

    fn properties(&self) -> Vec<(&'static str, String)> {
        match self {
            ApiRequest::Request(pl) => vec![
                ("Service", pl.service.clone()),
                ("Method", pl.method.clone()),
            ],
        }
    }
}
