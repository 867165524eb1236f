//! LoRaWAN frame log: the gateway streams `gw:stream:frame` and
//! `gw:{<gateway_id>}:stream:frame`, and the device streams
//! `device:stream:frame` and `device:{<dev_eui>}:stream:frame`.
//!
//! The per-gateway uplink entries carry only the receiving gateway's
//! `rx_info`; the global ones carry one entry per receiving gateway.

use std::fmt;

use pbjson_types::Timestamp;
use serde::Serialize;

use streamtail_api::{DecodeError, Envelope, PayloadKind};

use crate::common::{mtype_name, MType};
use crate::gw::{DownlinkTxInfo, UplinkRxInfo, UplinkTxInfo};
use crate::util::{as_base64, decode_message};

/// `stream.UplinkFrameLog`.
#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkFrameLog {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(serialize_with = "as_base64")]
    pub phy_payload: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub tx_info: Option<UplinkTxInfo>,
    #[prost(message, repeated, tag = "3")]
    pub rx_info: Vec<UplinkRxInfo>,
    #[prost(enumeration = "MType", tag = "4")]
    #[serde(serialize_with = "mtype_name")]
    pub m_type: i32,
    #[prost(string, tag = "5")]
    pub dev_addr: String,
    #[prost(string, tag = "6")]
    pub dev_eui: String,
    #[prost(message, optional, tag = "7")]
    pub time: Option<Timestamp>,
    #[prost(bool, tag = "8")]
    pub plaintext_f_opts: bool,
    #[prost(bool, tag = "9")]
    pub plaintext_frm_payload: bool,
}

/// `stream.DownlinkFrameLog`.
#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownlinkFrameLog {
    #[prost(message, optional, tag = "1")]
    pub time: Option<Timestamp>,
    #[prost(bytes = "vec", tag = "2")]
    #[serde(serialize_with = "as_base64")]
    pub phy_payload: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub tx_info: Option<DownlinkTxInfo>,
    #[prost(uint32, tag = "4")]
    pub downlink_id: u32,
    #[prost(string, tag = "5")]
    pub gateway_id: String,
    #[prost(enumeration = "MType", tag = "6")]
    #[serde(serialize_with = "mtype_name")]
    pub m_type: i32,
    #[prost(string, tag = "7")]
    pub dev_addr: String,
    #[prost(string, tag = "8")]
    pub dev_eui: String,
    #[prost(bool, tag = "9")]
    pub plaintext_f_opts: bool,
    #[prost(bool, tag = "10")]
    pub plaintext_frm_payload: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Uplink,
    Downlink,
}

impl PayloadKind for FrameKind {
    const PRIORITY: &'static [Self] = &[FrameKind::Uplink, FrameKind::Downlink];

    fn field(self) -> &'static str {
        match self {
            FrameKind::Uplink => "up",
            FrameKind::Downlink => "down",
        }
    }

    fn label(self) -> &'static str {
        match self {
            FrameKind::Uplink => "UPLINK FRAME",
            FrameKind::Downlink => "DOWNLINK FRAME",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FrameLog {
    Uplink(UplinkFrameLog),
    Downlink(DownlinkFrameLog),
}

impl FrameLog {
    pub fn m_type(&self) -> MType {
        match self {
            FrameLog::Uplink(pl) => pl.m_type(),
            FrameLog::Downlink(pl) => pl.m_type(),
        }
    }
}

impl Envelope for FrameLog {
    type Kind = FrameKind;

    fn decode(kind: FrameKind, bytes: &[u8]) -> Result<Self, DecodeError> {
        let field = kind.field();
        Ok(match kind {
            FrameKind::Uplink => FrameLog::Uplink(decode_message(field, bytes)?),
            FrameKind::Downlink => FrameLog::Downlink(decode_message(field, bytes)?),
        })
    }

    fn kind(&self) -> FrameKind {
        match self {
            FrameLog::Uplink(_) => FrameKind::Uplink,
            FrameLog::Downlink(_) => FrameKind::Downlink,
        }
    }

    fn properties(&self) -> Vec<(&'static str, String)> {
        let mtype = ("MType", self.m_type().as_str_name().to_string());
        match self {
            FrameLog::Uplink(pl) => vec![
                mtype,
                ("DevAddr", pl.dev_addr.clone()),
                ("DevEUI", pl.dev_eui.clone()),
            ],
            FrameLog::Downlink(pl) => vec![
                mtype,
                ("DevAddr", pl.dev_addr.clone()),
                ("DevEUI", pl.dev_eui.clone()),
                ("Gateway ID", pl.gateway_id.clone()),
            ],
        }
    }
}
