use std::{
    any::Any,
    collections::HashMap,
    fmt,
    marker::PhantomData,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    task::{Context, Poll},
};

use futures::{
    future::{join_all, BoxFuture},
    ready, Future, FutureExt,
};
use parking_lot::RwLock;

use crate::{
    first::{First, Waiter},
    BoxError, DeliveryError, EventConsumer, EventExecutor, EventStream, PublishError, Publisher,
    Subscriber, Subscription, SubscriptionId, Work,
};

type Registry<T> = HashMap<SubscriptionId, Arc<dyn EventConsumer<T>>>;

pub(crate) type EmptyHook = Arc<dyn Fn() + Send + Sync + 'static>;

/// State shared by all clones of one [EventPipe]. Subscriptions and waiters point here weakly.
pub(crate) struct Shared<T> {
    label: Arc<str>,
    executor: Arc<dyn EventExecutor>,
    // Copy-on-write: publish clones the inner Arc and dispatches outside the lock
    consumers: RwLock<Arc<Registry<T>>>,
    next_id: AtomicU64,
    on_empty: Option<EmptyHook>,
}

impl<T: Send + Sync + 'static> Shared<T> {
    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn insert(&self, id: SubscriptionId, consumer: Arc<dyn EventConsumer<T>>) {
        let consumers = {
            let mut registry = self.consumers.write();
            Arc::make_mut(&mut registry).insert(id, consumer);
            registry.len()
        };
        tracing::debug!(pipe = %self.label, id = %id, consumers, "consumer registered");
    }

    fn snapshot(&self) -> Arc<Registry<T>> {
        self.consumers.read().clone()
    }

    fn len(&self) -> usize {
        self.consumers.read().len()
    }

    /// Remove consumer by id. Returns false if it was not registered.
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let (removed, emptied) = {
            let mut registry = self.consumers.write();
            if !registry.contains_key(&id) {
                return false;
            }
            let removed = Arc::make_mut(&mut registry).remove(&id);
            (removed, registry.is_empty())
        };
        // consumer is released outside of the lock, its drop may call back into the pipe
        drop(removed);
        tracing::debug!(pipe = %self.label, id = %id, "consumer removed");
        if emptied {
            self.fire_empty();
        }
        true
    }

    fn clear(&self) -> usize {
        let drained = std::mem::take(&mut *self.consumers.write());
        let count = drained.len();
        drop(drained);
        count
    }

    fn fire_empty(&self) {
        tracing::trace!(pipe = %self.label, "pipe became empty");
        if let Some(on_empty) = &self.on_empty {
            on_empty()
        }
    }
}

///
/// Registry of consumers with asynchronous fan-out dispatch. Each [publish](EventPipe::publish) takes a
/// point-in-time snapshot of registered consumers and submits one unit of work per consumer to
/// the pipe's [EventExecutor]. Returned [Published] future resolves when all of them finished.
///
/// ```EventPipe``` is a cheap handle: clones share the same registry.
///
pub struct EventPipe<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for EventPipe<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for EventPipe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPipe")
            .field("label", &self.shared.label)
            .field("consumers", &self.shared.consumers.read().len())
            .finish()
    }
}

impl<T: Send + Sync + 'static> EventPipe<T> {
    /// Create pipe with default settings
    pub fn new(executor: Arc<dyn EventExecutor>) -> Self {
        Self::builder(executor).build()
    }

    pub fn builder(executor: Arc<dyn EventExecutor>) -> EventPipeBuilder<T> {
        EventPipeBuilder::new(executor)
    }

    pub(crate) fn from_shared(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared<T>> {
        Arc::downgrade(&self.shared)
    }

    /// Label used in log records of this pipe
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Executor this pipe submits dispatch units to
    pub fn executor(&self) -> &Arc<dyn EventExecutor> {
        &self.shared.executor
    }

    /// Number of registered consumers, waiters included
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if both handles refer to the same pipe
    pub fn same_pipe(&self, other: &EventPipe<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Register closure as consumer. The consumer is visible to every publish started after this call returns.
    pub fn subscribe<F>(&self, consumer: F) -> Subscription<T>
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.subscribe_consumer(Arc::new(consumer))
    }

    /// Register consumer object. Registering the same object twice gives two independent subscriptions.
    pub fn subscribe_consumer(&self, consumer: Arc<dyn EventConsumer<T>>) -> Subscription<T> {
        let id = self.shared.next_id();
        self.shared.insert(id, consumer);
        Subscription::new(id, self.downgrade())
    }

    /// Wait for the first published event satisfying ```predicate```. The waiter removes itself
    /// from the pipe on match.
    ///
    /// Panic in predicate is reported as delivery failure of the publish which caused it, the waiter stays registered.
    pub fn first<P>(&self, predicate: P) -> First<T>
    where
        T: Clone,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let id = self.shared.next_id();
        let (waiter, first) = Waiter::new(id, predicate, self.downgrade());
        self.shared.insert(id, Arc::new(waiter));
        first
    }

    /// Subscribe and receive events as [futures::Stream]. Dropping the stream closes the subscription.
    pub fn stream(&self) -> EventStream<T>
    where
        T: Clone,
    {
        EventStream::subscribe(self)
    }

    /// Dispatch event to every currently registered consumer. Never blocks and never fails synchronously:
    /// delivery failures are reported by returned future only.
    pub fn publish(&self, event: T) -> Published {
        let consumers = self.shared.snapshot();
        tracing::trace!(pipe = %self.shared.label, consumers = consumers.len(), "publishing event");
        if consumers.is_empty() {
            return Published::empty();
        }
        let event = Arc::new(event);
        let dispatches = consumers
            .values()
            .map(|consumer| {
                let work = dispatch_unit(self.shared.label.clone(), event.clone(), consumer.clone());
                self.shared.executor.execute(work)
            })
            .collect();
        Published::new(dispatches)
    }

    /// Remove all consumers. The on-empty hook fires once per call, even if the pipe was already empty.
    ///
    /// Pipe stays usable: later subscriptions register as usual.
    pub fn close(&self) {
        let removed = self.shared.clear();
        tracing::debug!(pipe = %self.shared.label, removed, "pipe closed");
        self.shared.fire_empty();
    }

    /// Subscribe-only view of this pipe
    pub fn subscriber(&self) -> Subscriber<T> {
        Subscriber::new(self.clone())
    }

    /// Publish-only view of this pipe
    pub fn publisher(&self) -> Publisher<T> {
        Publisher::new(self.clone())
    }
}

fn dispatch_unit<T: Send + Sync + 'static>(
    label: Arc<str>,
    event: Arc<T>,
    consumer: Arc<dyn EventConsumer<T>>,
) -> Work {
    Box::new(move || {
        let res = match panic::catch_unwind(AssertUnwindSafe(|| consumer.on_event(&event))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DeliveryError::Consumer(e)),
            Err(payload) => Err(DeliveryError::Panicked(panic_message(&*payload))),
        };
        if let Err(e) = &res {
            tracing::debug!(pipe = %label, error = %e, "delivery failed");
        }
        res
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Settings of [EventPipe]
pub struct EventPipeBuilder<T> {
    executor: Arc<dyn EventExecutor>,
    label: Option<Arc<str>>,
    on_empty: Option<EmptyHook>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> EventPipeBuilder<T> {
    fn new(executor: Arc<dyn EventExecutor>) -> Self {
        Self {
            executor,
            label: None,
            on_empty: None,
            _phantom: PhantomData,
        }
    }

    /// Name shown in log records. Defaults to the event type name.
    pub fn label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Hook called whenever a removal leaves the pipe without consumers, and on every [close](EventPipe::close)
    pub fn on_empty<F>(mut self, on_empty: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_empty = Some(Arc::new(on_empty));
        self
    }

    pub fn build(self) -> EventPipe<T> {
        let label = self
            .label
            .unwrap_or_else(|| Arc::from(std::any::type_name::<T>()));
        EventPipe::from_shared(Arc::new(Shared {
            label,
            executor: self.executor,
            consumers: RwLock::new(Arc::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            on_empty: self.on_empty,
        }))
    }
}

/// Future returned by [publish](EventPipe::publish). Resolves when every dispatch unit of the publish
/// call has finished, with error if at least one of them failed.
///
/// Dropping it doesn't cancel deliveries.
pub struct Published {
    dispatched: usize,
    dispatches: BoxFuture<'static, Vec<Result<(), DeliveryError>>>,
}

impl Published {
    pub(crate) fn new(dispatches: Vec<crate::Dispatch>) -> Self {
        Self {
            dispatched: dispatches.len(),
            dispatches: join_all(dispatches).boxed(),
        }
    }

    /// Already completed publish with no consumers
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Number of consumers the event was dispatched to
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }
}

impl fmt::Debug for Published {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Published")
            .field("dispatched", &self.dispatched)
            .finish()
    }
}

impl Future for Published {
    type Output = Result<(), PublishError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let results = ready!(self.dispatches.poll_unpin(cx));
        let failures: Vec<_> = results.into_iter().filter_map(Result::err).collect();
        if failures.is_empty() {
            Poll::Ready(Ok(()))
        } else {
            Poll::Ready(Err(PublishError::new(self.dispatched, failures)))
        }
    }
}
