use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Name of one broker-side append-only log (e.g. `device:stream:event`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(String);

impl StreamId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Broker-assigned record identifier: `<ms>-<seq>`.
///
/// Ordering is the broker's ordering: by milliseconds, then by sequence.
/// [`RecordId::ZERO`] is the "beginning of stream" sentinel, every real
/// record id is strictly greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RecordId {
    pub ms: u64,
    pub seq: u64,
}

impl RecordId {
    pub const ZERO: RecordId = RecordId { ms: 0, seq: 0 };

    pub const fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// The smallest id strictly greater than `self`.
    pub fn successor(&self) -> RecordId {
        match self.seq.checked_add(1) {
            Some(seq) => RecordId { ms: self.ms, seq },
            None => RecordId { ms: self.ms + 1, seq: 0 },
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid record id '{0}'")]
pub struct ParseRecordIdError(pub String);

impl FromStr for RecordId {
    type Err = ParseRecordIdError;

    /// Accepts `<ms>-<seq>` and a bare `<ms>` (sequence 0).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRecordIdError(s.to_string());
        let (ms, seq) = match s.split_once('-') {
            Some((ms, seq)) => (ms, Some(seq)),
            None => (s, None),
        };
        let ms = ms.parse::<u64>().map_err(|_| err())?;
        let seq = match seq {
            Some(seq) => seq.parse::<u64>().map_err(|_| err())?,
            None => 0,
        };
        Ok(RecordId { ms, seq })
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One broker-delivered unit: an id plus named opaque payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub id: RecordId,
    pub fields: BTreeMap<String, Vec<u8>>,
}

impl StreamRecord {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&[u8]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}
