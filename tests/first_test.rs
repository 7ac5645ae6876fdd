use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_std::future::timeout;
use event_pipes::{Abandoned, DeliveryError, EventPipe, InlineExecutor, SpawnExecutor};
use futures::{
    executor::{block_on, ThreadPool},
    future::join_all,
    FutureExt,
};

fn thread_pool_pipe<T: Send + Sync + 'static>() -> EventPipe<T> {
    let pool = ThreadPool::builder().pool_size(4).create().unwrap();
    EventPipe::new(Arc::new(SpawnExecutor::new(pool)))
}

#[test]
fn test_first_matching_event() {
    let pipe = thread_pool_pipe::<String>();
    let a = Arc::new(Mutex::new(Vec::new()));
    let b = Arc::new(Mutex::new(Vec::new()));
    let _sa = pipe.subscribe({
        let a = a.clone();
        move |event: &String| {
            a.lock().unwrap().push(event.clone());
            Ok(())
        }
    });
    let _sb = pipe.subscribe({
        let b = b.clone();
        move |event: &String| {
            b.lock().unwrap().push(event.clone());
            Ok(())
        }
    });

    block_on(pipe.publish("x".to_string())).unwrap();
    assert_eq!(*a.lock().unwrap(), vec!["x"]);
    assert_eq!(*b.lock().unwrap(), vec!["x"]);

    let mut first = pipe.first(|event: &String| event == "y");
    assert_eq!(pipe.len(), 3);

    block_on(pipe.publish("z".to_string())).unwrap();
    assert!((&mut first).now_or_never().is_none());

    block_on(pipe.publish("y".to_string())).unwrap();
    let resolved = block_on(async { timeout(Duration::from_secs(5), first).await.unwrap() });
    assert_eq!(resolved, Ok("y".to_string()));
    assert_eq!(pipe.len(), 2);

    block_on(pipe.publish("y".to_string())).unwrap();
    assert_eq!(*a.lock().unwrap(), vec!["x", "z", "y", "y"]);
}

#[test]
fn test_waiter_is_not_invoked_after_match() {
    let pipe = EventPipe::<u32>::new(Arc::new(InlineExecutor));
    let checks = Arc::new(AtomicUsize::new(0));
    let first = pipe.first({
        let checks = checks.clone();
        move |n: &u32| {
            checks.fetch_add(1, Ordering::SeqCst);
            *n % 2 == 0
        }
    });

    block_on(pipe.publish(1)).unwrap();
    block_on(pipe.publish(4)).unwrap();
    assert_eq!(checks.load(Ordering::SeqCst), 2);
    assert_eq!(block_on(first), Ok(4));
    assert!(pipe.is_empty());

    let published = pipe.publish(6);
    assert_eq!(published.dispatched(), 0);
    block_on(published).unwrap();
    assert_eq!(checks.load(Ordering::SeqCst), 2);
}

#[test]
fn test_waiter_removal_fires_empty_hook() {
    let emptied = Arc::new(AtomicUsize::new(0));
    let pipe = EventPipe::<u32>::builder(Arc::new(InlineExecutor))
        .on_empty({
            let emptied = emptied.clone();
            move || {
                emptied.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build();
    let first = pipe.first(|n: &u32| *n == 1);
    block_on(pipe.publish(1)).unwrap();
    assert_eq!(block_on(first), Ok(1));
    assert_eq!(emptied.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_matches_resolve_once() {
    let pipe = thread_pool_pipe::<u32>();
    let deliveries = Arc::new(AtomicUsize::new(0));
    let _counter = pipe.subscribe({
        let deliveries = deliveries.clone();
        move |_: &u32| {
            deliveries.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });
    let first = pipe.first(|_: &u32| true);

    let published: Vec<_> = (0..64).map(|n| pipe.publish(n)).collect();
    let results = block_on(async {
        timeout(Duration::from_secs(5), join_all(published))
            .await
            .unwrap()
    });
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(deliveries.load(Ordering::SeqCst), 64);

    let winner = block_on(first).unwrap();
    assert!(winner < 64);
    assert_eq!(pipe.len(), 1);
}

#[test]
fn test_predicate_panic_keeps_waiter() {
    let pipe = EventPipe::<i32>::new(Arc::new(InlineExecutor));
    let first = pipe.first(|n: &i32| {
        if *n < 0 {
            panic!("negative input");
        }
        *n == 5
    });

    let err = block_on(pipe.publish(-1)).unwrap_err();
    assert!(matches!(err.failures(), [DeliveryError::Panicked(msg)] if msg == "negative input"));
    assert_eq!(pipe.len(), 1);

    block_on(pipe.publish(5)).unwrap();
    assert_eq!(block_on(first), Ok(5));
}

#[test]
fn test_close_abandons_waiter() {
    let pipe = EventPipe::<u32>::new(Arc::new(InlineExecutor));
    let first = pipe.first(|_: &u32| true);
    pipe.close();
    assert_eq!(block_on(first), Err(Abandoned));
}

#[test]
fn test_dropping_pipe_abandons_waiter() {
    let pipe = EventPipe::<u32>::new(Arc::new(InlineExecutor));
    let first = pipe.first(|_: &u32| true);
    drop(pipe);
    assert_eq!(block_on(first), Err(Abandoned));
}

#[test]
fn test_dropped_first_future_still_unregisters() {
    let pipe = EventPipe::<u32>::new(Arc::new(InlineExecutor));
    drop(pipe.first(|n: &u32| *n == 3));
    assert_eq!(pipe.len(), 1);
    block_on(pipe.publish(3)).unwrap();
    assert!(pipe.is_empty());
}
