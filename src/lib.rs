//!
//! In-process event pipes: registry of consumers with asynchronous fan-out dispatch
//!
//! # Usage sample
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use futures::executor::block_on;
//! use event_pipes::{EventPipe, InlineExecutor};
//!
//! let pipe = EventPipe::<String>::new(Arc::new(InlineExecutor));
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let log = seen.clone();
//! let subscription = pipe.subscribe(move |event: &String| {
//!     log.lock().unwrap().push(event.clone());
//!     Ok(())
//! });
//! let first_b = pipe.first(|event: &String| event.starts_with('b'));
//!
//! block_on(pipe.publish("alpha".to_string())).unwrap();
//! block_on(pipe.publish("beta".to_string())).unwrap();
//! assert_eq!(block_on(first_b), Ok("beta".to_string()));
//!
//! subscription.close();
//! assert!(pipe.is_empty());
//! assert_eq!(*seen.lock().unwrap(), vec!["alpha", "beta"]);
//! ```
//!
//! # Dispatch
//!
//! [publish](EventPipe::publish) takes a snapshot of registered consumers and submits one unit of work per
//! consumer to the pipe's [EventExecutor]. It doesn't wait for anything: returned [Published] future resolves
//! when every unit has finished. If some consumers failed (returned error or panicked) the future resolves to
//! [PublishError] listing the failures, the other consumers are not affected in any way.
//!
//! Subscriptions made or closed while a publish is in flight don't change the set of consumers
//! this publish delivers to. There is no ordering between consumers, and with multithreaded executor
//! there is no ordering between consecutive publishes either. Use [InlineExecutor] if events must be
//! handled in the order they are published.
//!
//! # Waiting for an event
//!
//! [first](EventPipe::first) registers one-shot consumer which resolves returned [First] future with the
//! first event matching the predicate and unregisters itself. Concurrent deliveries of several matching
//! events are safe: exactly one of them wins.
//!
//! # Keys and types
//!
//! [KeyedEventPipe] and [TypedEventPipe] route events to per-key and per-type pipes, creating them
//! on subscription and dropping them when they become empty (see [EventPipeBuilder::on_empty]).
//! Role views ([Subscriber], [Publisher] and their keyed and typed counterparts) expose only one side of a pipe.
//!

mod consumer;
mod error;
mod event_stream;
mod executor;
mod first;
mod keyed;
mod pipe;
mod roles;
mod subscription;
mod typed;

pub use consumer::EventConsumer;
pub use error::{Abandoned, BoxError, DeliveryError, PublishError};
pub use event_stream::EventStream;
pub use executor::{Dispatch, EventExecutor, InlineExecutor, SpawnExecutor, Work};
pub use first::First;
pub use keyed::{
    KeyedEventPipe, KeyedEventPublisher, KeyedEventSubscriber, KeyedPublisher, KeyedSubscriber,
};
pub use pipe::{EventPipe, EventPipeBuilder, Published};
pub use roles::{EventPublisher, EventSubscriber, Publisher, Subscriber};
pub use subscription::{Subscription, SubscriptionId};
pub use typed::{
    TypedEventPipe, TypedEventPublisher, TypedEventSubscriber, TypedPublisher, TypedSubscriber,
};
