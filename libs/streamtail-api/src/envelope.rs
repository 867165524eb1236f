use std::fmt;

use serde::Serialize;

use crate::error::DecodeError;

/// Closed set of payload kinds carried by one stream.
///
/// Each kind is bound to exactly one record field name. Records are
/// dispatched on the first kind of [`PayloadKind::PRIORITY`] whose field
/// is present.
pub trait PayloadKind: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Every kind, in dispatch priority order.
    const PRIORITY: &'static [Self];

    /// Record field that carries this kind.
    fn field(self) -> &'static str;

    /// Human-readable label used in console banners (e.g. `TX ACK`).
    fn label(self) -> &'static str;
}

/// Decoded, kind-tagged event of one stream.
///
/// Implemented by an enum with one variant per kind. Serializing the
/// envelope yields the payload alone.
pub trait Envelope: Serialize + Send + Sized + 'static {
    type Kind: PayloadKind;

    /// Decode `bytes` as the schema bound to `kind`.
    fn decode(kind: Self::Kind, bytes: &[u8]) -> Result<Self, DecodeError>;

    fn kind(&self) -> Self::Kind;

    /// Short labelled summary of the payload.
    fn properties(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}
