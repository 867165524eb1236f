use std::marker::PhantomData;

use streamtail_api::{DecodeError, Envelope, PayloadKind, StreamRecord};

/// Outcome of dispatching one record.
#[derive(Debug)]
pub enum Demuxed<E: Envelope> {
    /// A known field was present and decoded.
    Event(E),
    /// No known field present. Not an error.
    Unmatched,
    /// A known field was present but its bytes did not decode.
    Malformed { kind: E::Kind, error: DecodeError },
}

/// Field-presence dispatch for one envelope type.
///
/// Walks `E::Kind::PRIORITY` and picks the first kind whose field the record
/// carries. Extra known fields on the same record are ignored.
pub struct Demultiplexer<E> {
    _envelope: PhantomData<fn() -> E>,
}

impl<E: Envelope> Default for Demultiplexer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Envelope> Demultiplexer<E> {
    pub fn new() -> Self {
        Self { _envelope: PhantomData }
    }

    /// First kind in priority order whose field is present, with its bytes.
    pub fn select<'r>(&self, record: &'r StreamRecord) -> Option<(E::Kind, &'r [u8])> {
        let mut selected: Option<(E::Kind, &'r [u8])> = None;
        for &kind in E::Kind::PRIORITY {
            let Some(bytes) = record.field(kind.field()) else {
                continue;
            };
            match selected {
                None => selected = Some((kind, bytes)),
                Some((winner, _)) => {
                    tracing::debug!(
                        id = %record.id,
                        selected = %winner,
                        ignored = %kind,
                        "record carries more than one known field"
                    );
                }
            }
        }
        selected
    }

    pub fn demux(&self, record: &StreamRecord) -> Demuxed<E> {
        match self.select(record) {
            None => Demuxed::Unmatched,
            Some((kind, bytes)) => match E::decode(kind, bytes) {
                Ok(event) => Demuxed::Event(event),
                Err(error) => Demuxed::Malformed { kind, error },
            },
        }
    }
}
