use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use event_pipes::{
    BoxError, EventPipe, EventPublisher, EventSubscriber, InlineExecutor, KeyedEventPipe,
    KeyedEventPublisher, KeyedEventSubscriber, Subscription, TypedEventPipe, TypedEventPublisher,
    TypedEventSubscriber,
};
use futures::{executor::block_on, StreamExt};

fn counter() -> (
    Arc<AtomicUsize>,
    impl Fn(&u32) -> Result<(), BoxError> + Send + Sync + 'static,
) {
    let count = Arc::new(AtomicUsize::new(0));
    let consumer = {
        let count = count.clone();
        move |_: &u32| -> Result<(), BoxError> {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    };
    (count, consumer)
}

#[test]
fn test_keyed_routes_by_key() {
    let pipes = KeyedEventPipe::<&'static str, u32>::new(Arc::new(InlineExecutor));
    let (left_count, left) = counter();
    let (right_count, right) = counter();
    let _l = pipes.subscribe("left", left);
    let _r = pipes.subscribe("right", right);
    assert_eq!(pipes.len(), 2);

    block_on(pipes.publish("left", 1)).unwrap();
    block_on(pipes.publish("left", 2)).unwrap();
    block_on(pipes.publish("right", 3)).unwrap();
    assert_eq!(left_count.load(Ordering::SeqCst), 2);
    assert_eq!(right_count.load(Ordering::SeqCst), 1);

    let nobody = pipes.publish("nowhere", 4);
    assert_eq!(nobody.dispatched(), 0);
    block_on(nobody).unwrap();
    assert!(pipes.pipe(&"nowhere").is_none());
}

#[test]
fn test_keyed_pipe_evicted_when_empty() {
    let pipes = KeyedEventPipe::<u8, u32>::new(Arc::new(InlineExecutor));
    let (_, consumer) = counter();
    let a = pipes.subscribe(1, consumer);
    let (_, consumer) = counter();
    let b = pipes.subscribe(1, consumer);

    a.close();
    assert!(pipes.pipe(&1).is_some());
    b.close();
    assert!(pipes.pipe(&1).is_none());
    assert!(pipes.is_empty());

    let first = pipes.first(2, |n: &u32| *n > 10);
    assert_eq!(pipes.len(), 1);
    block_on(pipes.publish(2, 5)).unwrap();
    block_on(pipes.publish(2, 50)).unwrap();
    assert_eq!(block_on(first), Ok(50));
    assert!(pipes.is_empty());
}

#[test]
fn test_keyed_close_closes_every_key() {
    let pipes = KeyedEventPipe::<u8, u32>::with_label(Arc::new(InlineExecutor), "keys");
    let subscriptions: Vec<_> = (0..4)
        .map(|key| {
            let (_, consumer) = counter();
            pipes.subscribe(key, consumer)
        })
        .collect();
    assert_eq!(pipes.len(), 4);
    pipes.close();
    assert!(pipes.is_empty());
    assert!(subscriptions.iter().all(|s| s.owner().is_none()));
}

#[test]
fn test_keyed_views_delegate() {
    let pipes = KeyedEventPipe::<u8, u32>::new(Arc::new(InlineExecutor));
    let subscriber = pipes.subscriber();
    let publisher = pipes.publisher();

    let (count, consumer) = counter();
    let _sub = KeyedEventSubscriber::subscribe(&subscriber, 7, consumer);
    let first = KeyedEventSubscriber::first(&subscriber, 7, |n: &u32| *n == 9);
    block_on(KeyedEventPublisher::publish(&publisher, 7, 9)).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(block_on(first), Ok(9));
}

#[derive(Clone, Debug, PartialEq)]
struct Ping(u32);

#[derive(Clone, Debug, PartialEq)]
struct Pong(&'static str);

#[test]
fn test_typed_routes_by_type() {
    let pipes = TypedEventPipe::new(Arc::new(InlineExecutor));
    let pings = Arc::new(AtomicUsize::new(0));
    let _ping = pipes.subscribe({
        let pings = pings.clone();
        move |ping: &Ping| {
            pings.fetch_add(ping.0 as usize, Ordering::SeqCst);
            Ok(())
        }
    });
    let pong = pipes.first(|pong: &Pong| pong.0 == "back");
    assert_eq!(pipes.len(), 2);

    block_on(pipes.publish(Ping(3))).unwrap();
    block_on(pipes.publish(Pong("away"))).unwrap();
    block_on(pipes.publish(Pong("back"))).unwrap();
    assert_eq!(pings.load(Ordering::SeqCst), 3);
    assert_eq!(block_on(pong), Ok(Pong("back")));

    // Pong pipe is gone with its only waiter
    assert!(pipes.pipe::<Pong>().is_none());
    assert_eq!(pipes.len(), 1);
    assert_eq!(pipes.publish(Pong("late")).dispatched(), 0);
    assert_eq!(pipes.publish(42u64).dispatched(), 0);
}

#[test]
fn test_typed_close_and_views() {
    let pipes = TypedEventPipe::new(Arc::new(InlineExecutor));
    let subscriber = pipes.subscriber();
    let publisher = pipes.publisher();

    let (count, consumer) = counter();
    let sub = TypedEventSubscriber::subscribe::<u32, _>(&subscriber, consumer);
    let first = TypedEventSubscriber::first(&subscriber, |ping: &Ping| ping.0 == 1);
    block_on(TypedEventPublisher::publish(&publisher, 5u32)).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    pipes.close();
    assert!(pipes.is_empty());
    assert!(sub.owner().is_none());
    assert!(block_on(first).is_err());
}

fn attach<S: EventSubscriber<u32>>(subscriber: &S) -> Subscription<u32> {
    let (_, consumer) = counter();
    subscriber.subscribe(consumer)
}

#[test]
fn test_pipe_views_delegate() {
    let pipe = EventPipe::<u32>::new(Arc::new(InlineExecutor));
    let subscriber = pipe.subscriber();
    let publisher = pipe.publisher();

    let _direct = attach(&pipe);
    let _viewed = attach(&subscriber);
    let first = subscriber.first(|n: &u32| *n == 2);
    assert_eq!(pipe.len(), 3);

    let published = publisher.publish(2);
    assert_eq!(published.dispatched(), 3);
    block_on(published).unwrap();
    assert_eq!(block_on(first), Ok(2));
}

#[test]
fn test_event_stream() {
    let pipe = EventPipe::<u32>::new(Arc::new(InlineExecutor));
    let stream = pipe.stream();
    assert_eq!(pipe.len(), 1);
    for n in 1..=3 {
        block_on(pipe.publish(n)).unwrap();
    }
    pipe.close();
    let received: Vec<u32> = block_on(stream.collect());
    assert_eq!(received, vec![1, 2, 3]);
}

#[test]
fn test_dropping_stream_unsubscribes() {
    let pipe = EventPipe::<u32>::new(Arc::new(InlineExecutor));
    let mut stream = pipe.stream();
    block_on(pipe.publish(1)).unwrap();
    assert_eq!(block_on(stream.next()), Some(1));
    drop(stream);
    assert!(pipe.is_empty());
}
