//! Subset of the gateway bridge messages embedded in events and meta logs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::util::as_base64;

/// `gw.UplinkTxInfo` (modulation omitted).
#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkTxInfo {
    #[prost(uint32, tag = "1")]
    pub frequency: u32,
}

/// `gw.UplinkRxInfo` (timing and location omitted).
#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkRxInfo {
    #[prost(string, tag = "1")]
    pub gateway_id: String,
    #[prost(uint32, tag = "2")]
    pub uplink_id: u32,
    #[prost(int32, tag = "6")]
    pub rssi: i32,
    #[prost(float, tag = "7")]
    pub snr: f32,
    #[prost(uint32, tag = "8")]
    pub channel: u32,
    #[prost(bytes = "vec", tag = "13")]
    #[serde(serialize_with = "as_base64")]
    pub context: Vec<u8>,
    #[prost(btree_map = "string, string", tag = "15")]
    pub metadata: BTreeMap<String, String>,
}

/// `gw.DownlinkTxInfo` (modulation and timing omitted).
#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownlinkTxInfo {
    #[prost(uint32, tag = "1")]
    pub frequency: u32,
    #[prost(int32, tag = "2")]
    pub power: i32,
    #[prost(uint32, tag = "4")]
    pub board: u32,
    #[prost(uint32, tag = "5")]
    pub antenna: u32,
    #[prost(bytes = "vec", tag = "7")]
    #[serde(serialize_with = "as_base64")]
    pub context: Vec<u8>,
}
