use streamtail_api::RecordId;

use crate::error::TailError;

/// Position of one tail loop within its stream: the id of the last
/// processed record. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    current: RecordId,
}

impl Cursor {
    pub fn new(initial: RecordId) -> Self {
        Self { current: initial }
    }

    /// Exclusive lower bound for the next read.
    pub fn current(&self) -> RecordId {
        self.current
    }

    /// Move to `id`. Equal ids are accepted (redelivery of the boundary
    /// record), smaller ones are refused.
    pub fn advance(&mut self, id: RecordId) -> Result<(), TailError> {
        if id < self.current {
            return Err(TailError::CursorRegression {
                current: self.current,
                attempted: id,
            });
        }
        self.current = id;
        Ok(())
    }
}
