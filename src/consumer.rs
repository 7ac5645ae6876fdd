use crate::BoxError;

/// Recipient of events registered in an [EventPipe](crate::EventPipe).
///
/// Closures `Fn(&T) -> Result<(), BoxError>` implement this trait automatically. Implement it directly
/// for named consumer types and register them with [subscribe_consumer](crate::EventPipe::subscribe_consumer).
///
/// Depending on executor the method may be called concurrently from several threads.
pub trait EventConsumer<T>: Send + Sync + 'static {
    fn on_event(&self, event: &T) -> Result<(), BoxError>;
}

impl<T, F> EventConsumer<T> for F
where
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
{
    fn on_event(&self, event: &T) -> Result<(), BoxError> {
        self(event)
    }
}
