use base64::Engine as _;
use serde::Serializer;

use streamtail_api::DecodeError;

/// Declares a protobuf enumeration together with its proto names and a
/// `serialize_with` helper that renders an `i32` field by name.
/// Values unknown to this build are rendered as plain numbers.
macro_rules! proto_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident => $ser:ident {
            $($variant:ident = $value:literal => $proto:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
        #[repr(i32)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn as_str_name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $proto),+
                }
            }
        }

        pub(crate) fn $ser<S: ::serde::Serializer>(value: &i32, serializer: S) -> Result<S::Ok, S::Error> {
            match $name::try_from(*value) {
                Ok(v) => serializer.serialize_str(v.as_str_name()),
                Err(_) => serializer.serialize_i32(*value),
            }
        }
    };
}

/// Decode one message, tagging failures with the record field they came from.
pub(crate) fn decode_message<M>(field: &'static str, bytes: &[u8]) -> Result<M, DecodeError>
where
    M: prost::Message + Default,
{
    M::decode(bytes).map_err(|e| DecodeError::new(field, e.to_string()))
}

/// `bytes` fields render as standard base64, like protojson.
pub(crate) fn as_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}
