use std::{fmt, hash::Hash, sync::Arc};

use dashmap::DashMap;

use crate::{BoxError, EventExecutor, EventPipe, First, Published, Subscription};

/// Subscriber side of a keyed pipe
pub trait KeyedEventSubscriber<K, V: Send + Sync + 'static> {
    fn subscribe<F>(&self, key: K, consumer: F) -> Subscription<V>
    where
        F: Fn(&V) -> Result<(), BoxError> + Send + Sync + 'static;

    fn first<P>(&self, key: K, predicate: P) -> First<V>
    where
        V: Clone,
        P: Fn(&V) -> bool + Send + Sync + 'static;
}

/// Publisher side of a keyed pipe
pub trait KeyedEventPublisher<K, V: Send + Sync + 'static> {
    fn publish(&self, key: K, value: V) -> Published;
}

///
/// Set of [EventPipe]s addressed by key. A pipe for the key is created on first subscription and
/// dropped again as soon as it has no consumers, so publishing to a key nobody listens to costs
/// one map lookup.
///
pub struct KeyedEventPipe<K, V> {
    label: Arc<str>,
    executor: Arc<dyn EventExecutor>,
    pipes: Arc<DashMap<K, EventPipe<V>>>,
}

impl<K, V> Clone for KeyedEventPipe<K, V> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            executor: self.executor.clone(),
            pipes: self.pipes.clone(),
        }
    }
}

impl<K: Eq + Hash, V> fmt::Debug for KeyedEventPipe<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedEventPipe")
            .field("label", &self.label)
            .field("keys", &self.pipes.len())
            .finish()
    }
}

impl<K, V> KeyedEventPipe<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(executor: Arc<dyn EventExecutor>) -> Self {
        Self::with_label(executor, std::any::type_name::<V>())
    }

    pub fn with_label(executor: Arc<dyn EventExecutor>, label: impl Into<Arc<str>>) -> Self {
        Self {
            label: label.into(),
            executor,
            pipes: Arc::new(DashMap::new()),
        }
    }

    fn create_pipe(&self, key: K) -> EventPipe<V> {
        let pipes = Arc::downgrade(&self.pipes);
        let label = self.label.clone();
        EventPipe::builder(self.executor.clone())
            .label(self.label.clone())
            .on_empty(move || {
                let Some(pipes) = pipes.upgrade() else {
                    return;
                };
                if pipes.remove_if(&key, |_, pipe| pipe.is_empty()).is_some() {
                    tracing::debug!(pipe = %label, "evicted empty keyed pipe");
                }
            })
            .build()
    }

    // Entry lock is held while `f` registers, so eviction can't drop the pipe in between
    fn with_pipe<R>(&self, key: K, f: impl FnOnce(&EventPipe<V>) -> R) -> R {
        let entry = self
            .pipes
            .entry(key.clone())
            .or_insert_with(|| self.create_pipe(key));
        f(entry.value())
    }

    pub fn subscribe<F>(&self, key: K, consumer: F) -> Subscription<V>
    where
        F: Fn(&V) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.with_pipe(key, |pipe| pipe.subscribe(consumer))
    }

    pub fn first<P>(&self, key: K, predicate: P) -> First<V>
    where
        V: Clone,
        P: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.with_pipe(key, |pipe| pipe.first(predicate))
    }

    /// Publish to consumers of ```key```. Resolves immediately if there are none.
    pub fn publish(&self, key: K, value: V) -> Published {
        match self.pipe(&key) {
            Some(pipe) => pipe.publish(value),
            None => Published::empty(),
        }
    }

    /// Pipe currently serving ```key```
    pub fn pipe(&self, key: &K) -> Option<EventPipe<V>> {
        self.pipes.get(key).map(|pipe| pipe.value().clone())
    }

    /// Number of keys with at least one consumer
    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    /// Close pipes of all keys
    pub fn close(&self) {
        let pipes: Vec<_> = self.pipes.iter().map(|pipe| pipe.value().clone()).collect();
        for pipe in pipes {
            pipe.close();
        }
    }

    pub fn subscriber(&self) -> KeyedSubscriber<K, V> {
        KeyedSubscriber(self.clone())
    }

    pub fn publisher(&self) -> KeyedPublisher<K, V> {
        KeyedPublisher(self.clone())
    }
}

impl<K, V> KeyedEventSubscriber<K, V> for KeyedEventPipe<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn subscribe<F>(&self, key: K, consumer: F) -> Subscription<V>
    where
        F: Fn(&V) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        KeyedEventPipe::subscribe(self, key, consumer)
    }

    fn first<P>(&self, key: K, predicate: P) -> First<V>
    where
        V: Clone,
        P: Fn(&V) -> bool + Send + Sync + 'static,
    {
        KeyedEventPipe::first(self, key, predicate)
    }
}

impl<K, V> KeyedEventPublisher<K, V> for KeyedEventPipe<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn publish(&self, key: K, value: V) -> Published {
        KeyedEventPipe::publish(self, key, value)
    }
}

/// Subscribe-only view of [KeyedEventPipe]
#[derive(Debug)]
pub struct KeyedSubscriber<K: Eq + Hash, V>(KeyedEventPipe<K, V>);

impl<K: Eq + Hash, V> Clone for KeyedSubscriber<K, V> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<K, V> KeyedEventSubscriber<K, V> for KeyedSubscriber<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn subscribe<F>(&self, key: K, consumer: F) -> Subscription<V>
    where
        F: Fn(&V) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.0.subscribe(key, consumer)
    }

    fn first<P>(&self, key: K, predicate: P) -> First<V>
    where
        V: Clone,
        P: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.0.first(key, predicate)
    }
}

/// Publish-only view of [KeyedEventPipe]
#[derive(Debug)]
pub struct KeyedPublisher<K: Eq + Hash, V>(KeyedEventPipe<K, V>);

impl<K: Eq + Hash, V> Clone for KeyedPublisher<K, V> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<K, V> KeyedEventPublisher<K, V> for KeyedPublisher<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn publish(&self, key: K, value: V) -> Published {
        self.0.publish(key, value)
    }
}
