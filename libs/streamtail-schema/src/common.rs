use serde::Serialize;

/// `common.Location`.
#[derive(Clone, Copy, PartialEq, ::prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[prost(double, tag = "1")]
    pub latitude: f64,
    #[prost(double, tag = "2")]
    pub longitude: f64,
    #[prost(double, tag = "3")]
    pub altitude: f64,
    #[prost(enumeration = "LocationSource", tag = "4")]
    #[serde(serialize_with = "location_source_name")]
    pub source: i32,
    #[prost(float, tag = "5")]
    pub accuracy: f32,
}

proto_enum! {
    /// `common.MType`: LoRaWAN message type.
    pub enum MType => mtype_name {
        JoinRequest = 0 => "JOIN_REQUEST",
        JoinAccept = 1 => "JOIN_ACCEPT",
        UnconfirmedDataUp = 2 => "UNCONFIRMED_DATA_UP",
        UnconfirmedDataDown = 3 => "UNCONFIRMED_DATA_DOWN",
        ConfirmedDataUp = 4 => "CONFIRMED_DATA_UP",
        ConfirmedDataDown = 5 => "CONFIRMED_DATA_DOWN",
        RejoinRequest = 6 => "REJOIN_REQUEST",
        Proprietary = 7 => "PROPRIETARY",
    }
}

proto_enum! {
    /// `common.LocationSource`.
    pub enum LocationSource => location_source_name {
        Unknown = 0 => "UNKNOWN",
        Gps = 1 => "GPS",
        Config = 2 => "CONFIG",
        GeoResolverTdoa = 3 => "GEO_RESOLVER_TDOA",
        GeoResolverRssi = 4 => "GEO_RESOLVER_RSSI",
        GeoResolverGnss = 5 => "GEO_RESOLVER_GNSS",
        GeoResolverWifi = 6 => "GEO_RESOLVER_WIFI",
    }
}

proto_enum! {
    /// `common.DeviceClass`.
    pub enum DeviceClass => device_class_name {
        ClassA = 0 => "CLASS_A",
        ClassB = 1 => "CLASS_B",
        ClassC = 2 => "CLASS_C",
    }
}
