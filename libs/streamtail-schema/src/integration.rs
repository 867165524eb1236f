//! Device event log: `device:stream:event` and the per-device
//! `device:{<dev_eui>}:stream:event` streams.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use streamtail_api::{DecodeError, Envelope, PayloadKind};

use pbjson_types::{Struct, Timestamp};

use crate::common::{device_class_name, Location};
use crate::gw::{DownlinkTxInfo, UplinkRxInfo, UplinkTxInfo};
use crate::util::{as_base64, decode_message};

// ═══════════════════════════════════════════════════════════════
//  Messages (integration.proto)
// ═══════════════════════════════════════════════════════════════

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[prost(string, tag = "1")]
    pub tenant_id: String,
    #[prost(string, tag = "2")]
    pub tenant_name: String,
    #[prost(string, tag = "3")]
    pub application_id: String,
    #[prost(string, tag = "4")]
    pub application_name: String,
    #[prost(string, tag = "5")]
    pub device_profile_id: String,
    #[prost(string, tag = "6")]
    pub device_profile_name: String,
    #[prost(string, tag = "7")]
    pub device_name: String,
    #[prost(string, tag = "8")]
    pub dev_eui: String,
    #[prost(btree_map = "string, string", tag = "9")]
    pub tags: BTreeMap<String, String>,
    #[prost(enumeration = "crate::common::DeviceClass", tag = "10")]
    #[serde(serialize_with = "device_class_name")]
    pub device_class_enabled: i32,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkEvent {
    #[prost(string, tag = "1")]
    pub deduplication_id: String,
    #[prost(message, optional, tag = "2")]
    pub time: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub device_info: Option<DeviceInfo>,
    #[prost(string, tag = "4")]
    pub dev_addr: String,
    #[prost(bool, tag = "5")]
    pub adr: bool,
    #[prost(uint32, tag = "6")]
    pub dr: u32,
    #[prost(uint32, tag = "7")]
    pub f_cnt: u32,
    #[prost(uint32, tag = "8")]
    pub f_port: u32,
    #[prost(bool, tag = "9")]
    pub confirmed: bool,
    #[prost(bytes = "vec", tag = "10")]
    #[serde(serialize_with = "as_base64")]
    pub data: Vec<u8>,
    #[prost(message, optional, tag = "11")]
    pub object: Option<Struct>,
    #[prost(message, repeated, tag = "12")]
    pub rx_info: Vec<UplinkRxInfo>,
    #[prost(message, optional, tag = "13")]
    pub tx_info: Option<UplinkTxInfo>,
    #[prost(string, tag = "16")]
    pub region_config_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinEvent {
    #[prost(string, tag = "1")]
    pub deduplication_id: String,
    #[prost(message, optional, tag = "2")]
    pub time: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub device_info: Option<DeviceInfo>,
    #[prost(string, tag = "4")]
    pub dev_addr: String,
    #[prost(string, tag = "7")]
    pub region_config_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AckEvent {
    #[prost(string, tag = "1")]
    pub deduplication_id: String,
    #[prost(message, optional, tag = "2")]
    pub time: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub device_info: Option<DeviceInfo>,
    #[prost(string, tag = "4")]
    pub queue_item_id: String,
    #[prost(bool, tag = "5")]
    pub acknowledged: bool,
    #[prost(uint32, tag = "6")]
    pub f_cnt_down: u32,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxAckEvent {
    #[prost(uint32, tag = "1")]
    pub downlink_id: u32,
    #[prost(message, optional, tag = "2")]
    pub time: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub device_info: Option<DeviceInfo>,
    #[prost(string, tag = "4")]
    pub queue_item_id: String,
    #[prost(uint32, tag = "5")]
    pub f_cnt_down: u32,
    #[prost(string, tag = "6")]
    pub gateway_id: String,
    #[prost(message, optional, tag = "7")]
    pub tx_info: Option<DownlinkTxInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    #[prost(message, optional, tag = "1")]
    pub time: Option<Timestamp>,
    #[prost(message, optional, tag = "2")]
    pub device_info: Option<DeviceInfo>,
    #[prost(enumeration = "LogLevel", tag = "3")]
    #[serde(serialize_with = "log_level_name")]
    pub level: i32,
    #[prost(enumeration = "LogCode", tag = "4")]
    #[serde(serialize_with = "log_code_name")]
    pub code: i32,
    #[prost(string, tag = "5")]
    pub description: String,
    #[prost(btree_map = "string, string", tag = "6")]
    pub context: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    #[prost(string, tag = "1")]
    pub deduplication_id: String,
    #[prost(message, optional, tag = "2")]
    pub time: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub device_info: Option<DeviceInfo>,
    #[prost(int32, tag = "5")]
    pub margin: i32,
    #[prost(bool, tag = "6")]
    pub external_power_source: bool,
    #[prost(bool, tag = "7")]
    pub battery_level_unavailable: bool,
    #[prost(float, tag = "8")]
    pub battery_level: f32,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationEvent {
    #[prost(string, tag = "1")]
    pub deduplication_id: String,
    #[prost(message, optional, tag = "2")]
    pub time: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub device_info: Option<DeviceInfo>,
    #[prost(message, optional, tag = "4")]
    pub location: Option<Location>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationEvent {
    #[prost(string, tag = "1")]
    pub deduplication_id: String,
    #[prost(message, optional, tag = "2")]
    pub time: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub device_info: Option<DeviceInfo>,
    #[prost(string, tag = "4")]
    pub integration_name: String,
    #[prost(string, tag = "5")]
    pub event_type: String,
    #[prost(message, optional, tag = "6")]
    pub object: Option<Struct>,
}

proto_enum! {
    pub enum LogLevel => log_level_name {
        Info = 0 => "INFO",
        Warning = 1 => "WARNING",
        Error = 2 => "ERROR",
    }
}

proto_enum! {
    pub enum LogCode => log_code_name {
        Unknown = 0 => "UNKNOWN",
        DownlinkPayloadSize = 1 => "DOWNLINK_PAYLOAD_SIZE",
        UplinkCodec = 2 => "UPLINK_CODEC",
        DownlinkCodec = 3 => "DOWNLINK_CODEC",
        Otaa = 4 => "OTAA",
        UplinkFCntReset = 5 => "UPLINK_F_CNT_RESET",
        UplinkMic = 6 => "UPLINK_MIC",
        UplinkFCntRetransmission = 7 => "UPLINK_F_CNT_RETRANSMISSION",
        DownlinkGateway = 8 => "DOWNLINK_GATEWAY",
        RelayNewEndDevice = 9 => "RELAY_NEW_END_DEVICE",
        FCntDown = 10 => "F_CNT_DOWN",
    }
}

// ═══════════════════════════════════════════════════════════════
//  Envelope
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Up,
    Join,
    Ack,
    TxAck,
    Log,
    Status,
    Location,
    Integration,
}

impl PayloadKind for EventKind {
    const PRIORITY: &'static [Self] = &[
        EventKind::Up,
        EventKind::Join,
        EventKind::Ack,
        EventKind::TxAck,
        EventKind::Log,
        EventKind::Status,
        EventKind::Location,
        EventKind::Integration,
    ];

    fn field(self) -> &'static str {
        match self {
            EventKind::Up => "up",
            EventKind::Join => "join",
            EventKind::Ack => "ack",
            EventKind::TxAck => "txack",
            EventKind::Log => "log",
            EventKind::Status => "status",
            EventKind::Location => "location",
            EventKind::Integration => "integration",
        }
    }

    fn label(self) -> &'static str {
        match self {
            EventKind::Up => "UP",
            EventKind::Join => "JOIN",
            EventKind::Ack => "ACK",
            EventKind::TxAck => "TX ACK",
            EventKind::Log => "LOG",
            EventKind::Status => "STATUS",
            EventKind::Location => "LOCATION",
            EventKind::Integration => "INTEGRATION",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// One entry of the device event log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeviceEvent {
    Up(UplinkEvent),
    Join(JoinEvent),
    Ack(AckEvent),
    TxAck(TxAckEvent),
    Log(LogEvent),
    Status(StatusEvent),
    Location(LocationEvent),
    Integration(IntegrationEvent),
}

impl DeviceEvent {
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        match self {
            DeviceEvent::Up(pl) => pl.device_info.as_ref(),
            DeviceEvent::Join(pl) => pl.device_info.as_ref(),
            DeviceEvent::Ack(pl) => pl.device_info.as_ref(),
            DeviceEvent::TxAck(pl) => pl.device_info.as_ref(),
            DeviceEvent::Log(pl) => pl.device_info.as_ref(),
            DeviceEvent::Status(pl) => pl.device_info.as_ref(),
            DeviceEvent::Location(pl) => pl.device_info.as_ref(),
            DeviceEvent::Integration(pl) => pl.device_info.as_ref(),
        }
    }
}

impl Envelope for DeviceEvent {
    type Kind = EventKind;

    fn decode(kind: EventKind, bytes: &[u8]) -> Result<Self, DecodeError> {
        let field = kind.field();
        Ok(match kind {
            EventKind::Up => DeviceEvent::Up(decode_message(field, bytes)?),
            EventKind::Join => DeviceEvent::Join(decode_message(field, bytes)?),
            EventKind::Ack => DeviceEvent::Ack(decode_message(field, bytes)?),
            EventKind::TxAck => DeviceEvent::TxAck(decode_message(field, bytes)?),
            EventKind::Log => DeviceEvent::Log(decode_message(field, bytes)?),
            EventKind::Status => DeviceEvent::Status(decode_message(field, bytes)?),
            EventKind::Location => DeviceEvent::Location(decode_message(field, bytes)?),
            EventKind::Integration => DeviceEvent::Integration(decode_message(field, bytes)?),
        })
    }

    fn kind(&self) -> EventKind {
        match self {
            DeviceEvent::Up(_) => EventKind::Up,
            DeviceEvent::Join(_) => EventKind::Join,
            DeviceEvent::Ack(_) => EventKind::Ack,
            DeviceEvent::TxAck(_) => EventKind::TxAck,
            DeviceEvent::Log(_) => EventKind::Log,
            DeviceEvent::Status(_) => EventKind::Status,
            DeviceEvent::Location(_) => EventKind::Location,
            DeviceEvent::Integration(_) => EventKind::Integration,
        }
    }

    fn properties(&self) -> Vec<(&'static str, String)> {
        match self {
            DeviceEvent::Up(pl) => vec![
                ("DR", pl.dr.to_string()),
                ("FPort", pl.f_port.to_string()),
                ("FCnt", pl.f_cnt.to_string()),
                ("Data", hex::encode(&pl.data)),
            ],
            DeviceEvent::Join(pl) => vec![("DevAddr", pl.dev_addr.clone())],
            DeviceEvent::Status(pl) => vec![
                ("Margin", pl.margin.to_string()),
                ("Battery level", format!("{:.0}%", pl.battery_level)),
                ("Battery level unavailable", pl.battery_level_unavailable.to_string()),
                ("External power source", pl.external_power_source.to_string()),
            ],
            DeviceEvent::Log(pl) => vec![
                ("Level", pl.level().as_str_name().to_string()),
                ("Code", pl.code().as_str_name().to_string()),
            ],
            DeviceEvent::Integration(pl) => vec![
                ("Integration", pl.integration_name.clone()),
                ("Event", pl.event_type.clone()),
            ],
            DeviceEvent::Ack(_) | DeviceEvent::TxAck(_) | DeviceEvent::Location(_) => Vec::new(),
        }
    }
}
