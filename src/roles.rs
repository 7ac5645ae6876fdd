use crate::{BoxError, EventPipe, First, Published, Subscription};

///
/// Subscriber side of a pipe. Implemented by [EventPipe] itself and by [Subscriber] view, which
/// allows to hand out subscription rights without giving away publishing.
///
pub trait EventSubscriber<T: Send + Sync + 'static> {
    fn subscribe<F>(&self, consumer: F) -> Subscription<T>
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static;

    fn first<P>(&self, predicate: P) -> First<T>
    where
        T: Clone,
        P: Fn(&T) -> bool + Send + Sync + 'static;
}

/// Publisher side of a pipe
pub trait EventPublisher<T: Send + Sync + 'static> {
    fn publish(&self, event: T) -> Published;
}

impl<T: Send + Sync + 'static> EventSubscriber<T> for EventPipe<T> {
    fn subscribe<F>(&self, consumer: F) -> Subscription<T>
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        EventPipe::subscribe(self, consumer)
    }

    fn first<P>(&self, predicate: P) -> First<T>
    where
        T: Clone,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        EventPipe::first(self, predicate)
    }
}

impl<T: Send + Sync + 'static> EventPublisher<T> for EventPipe<T> {
    fn publish(&self, event: T) -> Published {
        EventPipe::publish(self, event)
    }
}

/// Subscribe-only view of [EventPipe], see [EventPipe::subscriber]
#[derive(Debug)]
pub struct Subscriber<T>(EventPipe<T>);

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Send + Sync + 'static> Subscriber<T> {
    pub(crate) fn new(pipe: EventPipe<T>) -> Self {
        Self(pipe)
    }
}

impl<T: Send + Sync + 'static> EventSubscriber<T> for Subscriber<T> {
    fn subscribe<F>(&self, consumer: F) -> Subscription<T>
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.0.subscribe(consumer)
    }

    fn first<P>(&self, predicate: P) -> First<T>
    where
        T: Clone,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.0.first(predicate)
    }
}

/// Publish-only view of [EventPipe], see [EventPipe::publisher]
#[derive(Debug)]
pub struct Publisher<T>(EventPipe<T>);

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Send + Sync + 'static> Publisher<T> {
    pub(crate) fn new(pipe: EventPipe<T>) -> Self {
        Self(pipe)
    }
}

impl<T: Send + Sync + 'static> EventPublisher<T> for Publisher<T> {
    fn publish(&self, event: T) -> Published {
        self.0.publish(event)
    }
}
