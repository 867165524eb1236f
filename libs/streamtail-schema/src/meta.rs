//! Frame meta log (`stream:meta`): byte counts per uplink and downlink,
//! written for billing and traffic accounting.

use std::fmt;

use serde::Serialize;

use streamtail_api::{DecodeError, Envelope, PayloadKind};

use crate::common::{mtype_name, MType};
use crate::gw::{DownlinkTxInfo, UplinkRxInfo, UplinkTxInfo};
use crate::util::decode_message;

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkMeta {
    #[prost(string, tag = "1")]
    pub dev_eui: String,
    #[prost(message, optional, tag = "2")]
    pub tx_info: Option<UplinkTxInfo>,
    #[prost(message, repeated, tag = "3")]
    pub rx_info: Vec<UplinkRxInfo>,
    #[prost(uint32, tag = "4")]
    pub phy_payload_byte_count: u32,
    #[prost(uint32, tag = "5")]
    pub mac_command_byte_count: u32,
    #[prost(uint32, tag = "6")]
    pub application_payload_byte_count: u32,
    #[prost(enumeration = "MType", tag = "7")]
    #[serde(serialize_with = "mtype_name")]
    pub message_type: i32,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownlinkMeta {
    #[prost(string, tag = "1")]
    pub dev_eui: String,
    #[prost(string, tag = "2")]
    pub multicast_group_id: String,
    #[prost(message, optional, tag = "3")]
    pub tx_info: Option<DownlinkTxInfo>,
    #[prost(uint32, tag = "4")]
    pub phy_payload_byte_count: u32,
    #[prost(uint32, tag = "5")]
    pub mac_command_byte_count: u32,
    #[prost(uint32, tag = "6")]
    pub application_payload_byte_count: u32,
    #[prost(enumeration = "MType", tag = "7")]
    #[serde(serialize_with = "mtype_name")]
    pub message_type: i32,
    #[prost(string, tag = "8")]
    pub gateway_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKind {
    Uplink,
    Downlink,
}

impl PayloadKind for MetaKind {
    const PRIORITY: &'static [Self] = &[MetaKind::Uplink, MetaKind::Downlink];

    fn field(self) -> &'static str {
        match self {
            MetaKind::Uplink => "up",
            MetaKind::Downlink => "down",
        }
    }

    fn label(self) -> &'static str {
        match self {
            MetaKind::Uplink => "UPLINK META",
            MetaKind::Downlink => "DOWNLINK META",
        }
    }
}

impl fmt::Display for MetaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FrameMeta {
    Uplink(UplinkMeta),
    Downlink(DownlinkMeta),
}

impl Envelope for FrameMeta {
    type Kind = MetaKind;

    fn decode(kind: MetaKind, bytes: &[u8]) -> Result<Self, DecodeError> {
        let field = kind.field();
        Ok(match kind {
            MetaKind::Uplink => FrameMeta::Uplink(decode_message(field, bytes)?),
            MetaKind::Downlink => FrameMeta::Downlink(decode_message(field, bytes)?),
        })
    }

    fn kind(&self) -> MetaKind {
        match self {
            FrameMeta::Uplink(_) => MetaKind::Uplink,
            FrameMeta::Downlink(_) => MetaKind::Downlink,
        }
    }

    fn properties(&self) -> Vec<(&'static str, String)> {
        match self {
            FrameMeta::Uplink(pl) => vec![
                ("DevEUI", pl.dev_eui.clone()),
                ("MType", pl.message_type().as_str_name().to_string()),
                ("PHYPayload bytes", pl.phy_payload_byte_count.to_string()),
            ],
            FrameMeta::Downlink(pl) => vec![
                ("DevEUI", pl.dev_eui.clone()),
                ("Gateway", pl.gateway_id.clone()),
                ("MType", pl.message_type().as_str_name().to_string()),
                ("PHYPayload bytes", pl.phy_payload_byte_count.to_string()),
            ],
        }
    }
}
