use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

use dashmap::DashMap;

use crate::{BoxError, EventExecutor, EventPipe, First, Published, Subscription};

/// Subscriber side of a typed pipe. The type parameter selects which events are received.
pub trait TypedEventSubscriber {
    fn subscribe<T, F>(&self, consumer: F) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static;

    fn first<T, P>(&self, predicate: P) -> First<T>
    where
        T: Clone + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static;
}

/// Publisher side of a typed pipe
pub trait TypedEventPublisher {
    fn publish<T: Send + Sync + 'static>(&self, event: T) -> Published;
}

// Type-erased EventPipe<T> together with a way to close it without knowing T
struct Route {
    pipe: Box<dyn Any + Send + Sync>,
    close: Arc<dyn Fn() + Send + Sync>,
}

impl Route {
    fn new<T: Send + Sync + 'static>(pipe: EventPipe<T>) -> Self {
        let handle = pipe.clone();
        Self {
            pipe: Box::new(pipe),
            close: Arc::new(move || handle.close()),
        }
    }

    fn pipe<T: Send + Sync + 'static>(&self) -> Option<&EventPipe<T>> {
        self.pipe.downcast_ref()
    }
}

///
/// Set of [EventPipe]s, one per event type. Events are routed by their [TypeId]: consumers of
/// ```EventPipe<T>``` receive only events of exact type ```T```.
///
/// Like [KeyedEventPipe](crate::KeyedEventPipe), pipe for a type exists only while it has consumers.
///
#[derive(Clone)]
pub struct TypedEventPipe {
    executor: Arc<dyn EventExecutor>,
    pipes: Arc<DashMap<TypeId, Route>>,
}

impl fmt::Debug for TypedEventPipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedEventPipe")
            .field("types", &self.pipes.len())
            .finish()
    }
}

impl TypedEventPipe {
    pub fn new(executor: Arc<dyn EventExecutor>) -> Self {
        Self {
            executor,
            pipes: Arc::new(DashMap::new()),
        }
    }

    fn create_pipe<T: Send + Sync + 'static>(&self) -> EventPipe<T> {
        let pipes = Arc::downgrade(&self.pipes);
        EventPipe::builder(self.executor.clone())
            .on_empty(move || {
                let Some(pipes) = pipes.upgrade() else {
                    return;
                };
                let evicted = pipes.remove_if(&TypeId::of::<T>(), |_, route| {
                    route.pipe::<T>().map_or(false, |pipe| pipe.is_empty())
                });
                if evicted.is_some() {
                    tracing::debug!(pipe = std::any::type_name::<T>(), "evicted empty typed pipe");
                }
            })
            .build()
    }

    fn with_pipe<T, R>(&self, f: impl FnOnce(&EventPipe<T>) -> R) -> R
    where
        T: Send + Sync + 'static,
    {
        let entry = self
            .pipes
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Route::new(self.create_pipe::<T>()));
        let pipe = entry
            .pipe::<T>()
            .expect("typed pipe is stored under TypeId of its event");
        f(pipe)
    }

    pub fn subscribe<T, F>(&self, consumer: F) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.with_pipe(|pipe| pipe.subscribe(consumer))
    }

    pub fn first<T, P>(&self, predicate: P) -> First<T>
    where
        T: Clone + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.with_pipe(|pipe| pipe.first(predicate))
    }

    /// Publish to consumers of type ```T```. Resolves immediately if there are none.
    pub fn publish<T: Send + Sync + 'static>(&self, event: T) -> Published {
        match self.pipe::<T>() {
            Some(pipe) => pipe.publish(event),
            None => Published::empty(),
        }
    }

    /// Pipe currently serving events of type ```T```
    pub fn pipe<T: Send + Sync + 'static>(&self) -> Option<EventPipe<T>> {
        self.pipes
            .get(&TypeId::of::<T>())
            .and_then(|route| route.pipe::<T>().cloned())
    }

    /// Number of event types with at least one consumer
    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    /// Close pipes of all event types
    pub fn close(&self) {
        let closers: Vec<_> = self.pipes.iter().map(|route| route.close.clone()).collect();
        for close in closers {
            close();
        }
    }

    pub fn subscriber(&self) -> TypedSubscriber {
        TypedSubscriber(self.clone())
    }

    pub fn publisher(&self) -> TypedPublisher {
        TypedPublisher(self.clone())
    }
}

impl TypedEventSubscriber for TypedEventPipe {
    fn subscribe<T, F>(&self, consumer: F) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        TypedEventPipe::subscribe(self, consumer)
    }

    fn first<T, P>(&self, predicate: P) -> First<T>
    where
        T: Clone + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        TypedEventPipe::first(self, predicate)
    }
}

impl TypedEventPublisher for TypedEventPipe {
    fn publish<T: Send + Sync + 'static>(&self, event: T) -> Published {
        TypedEventPipe::publish(self, event)
    }
}

/// Subscribe-only view of [TypedEventPipe]
#[derive(Clone, Debug)]
pub struct TypedSubscriber(TypedEventPipe);

impl TypedEventSubscriber for TypedSubscriber {
    fn subscribe<T, F>(&self, consumer: F) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.0.subscribe(consumer)
    }

    fn first<T, P>(&self, predicate: P) -> First<T>
    where
        T: Clone + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.0.first(predicate)
    }
}

/// Publish-only view of [TypedEventPipe]
#[derive(Clone, Debug)]
pub struct TypedPublisher(TypedEventPipe);

impl TypedEventPublisher for TypedPublisher {
    fn publish<T: Send + Sync + 'static>(&self, event: T) -> Published {
        self.0.publish(event)
    }
}
