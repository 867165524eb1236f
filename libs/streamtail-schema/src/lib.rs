//! Decode targets for the network server's Redis streams.
//!
//! Message structs mirror the network server's protobuf schemas field by
//! field (same tags, same wire types). Fields that are not reproduced here
//! are skipped by the decoder as unknown fields.
//!
//! Each stream has an envelope enum with one variant per payload kind:
//! [`DeviceEvent`] for the device event log, [`FrameLog`] for the gateway
//! and device frame logs, [`FrameMeta`] for the meta log and [`ApiRequest`]
//! for the API request log.
//!
//! Well-known types (`google.protobuf.Timestamp`, `Struct`) come from
//! `pbjson_types`, which also renders them the way protojson does.

#[macro_use]
mod util;

pub mod common;
pub mod frame;
pub mod gw;
pub mod integration;
pub mod meta;
pub mod request;

pub use frame::{FrameKind, FrameLog};
pub use integration::{DeviceEvent, EventKind};
pub use meta::{FrameMeta, MetaKind};
pub use request::{ApiRequest, RequestKind};
