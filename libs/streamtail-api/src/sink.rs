use crate::error::SinkError;
use crate::record::RecordId;

/// Consumer of decoded events. Called once per successfully decoded record,
/// in stream order.
pub trait EventSink<E>: Send {
    fn emit(&mut self, id: &RecordId, event: &E) -> Result<(), SinkError>;
}

impl<E, S: EventSink<E> + ?Sized> EventSink<E> for Box<S> {
    fn emit(&mut self, id: &RecordId, event: &E) -> Result<(), SinkError> {
        (**self).emit(id, event)
    }
}
