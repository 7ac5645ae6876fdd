use std::{
    pin::Pin,
    sync::Weak,
    task::{Context, Poll},
};

use futures::{channel::oneshot, Future, FutureExt};
use parking_lot::Mutex;

use crate::{pipe::Shared, Abandoned, BoxError, EventConsumer, SubscriptionId};

/// One-shot consumer behind [first](crate::EventPipe::first)
pub(crate) struct Waiter<T, P> {
    id: SubscriptionId,
    predicate: P,
    // taken by the single matching delivery
    slot: Mutex<Option<oneshot::Sender<T>>>,
    pipe: Weak<Shared<T>>,
}

impl<T, P> Waiter<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    pub(crate) fn new(id: SubscriptionId, predicate: P, pipe: Weak<Shared<T>>) -> (Self, First<T>) {
        let (tx, rx) = oneshot::channel();
        let waiter = Self {
            id,
            predicate,
            slot: Mutex::new(Some(tx)),
            pipe,
        };
        (waiter, First { rx })
    }
}

impl<T, P> EventConsumer<T> for Waiter<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn on_event(&self, event: &T) -> Result<(), BoxError> {
        if !(self.predicate)(event) {
            return Ok(());
        }
        let Some(tx) = self.slot.lock().take() else {
            // lost the race to a concurrent delivery
            return Ok(());
        };
        if let Some(shared) = self.pipe.upgrade() {
            shared.unsubscribe(self.id);
        }
        // the First future may be already dropped, that's fine
        let _ = tx.send(event.clone());
        Ok(())
    }
}

/// Future returned by [first](crate::EventPipe::first), resolves to the first matching event.
///
/// Resolves to [Abandoned] if the waiter is removed from pipe without a match, e.g. by [close](crate::EventPipe::close).
#[derive(Debug)]
pub struct First<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for First<T> {
    type Output = Result<T, Abandoned>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.rx.poll_unpin(cx).map(|res| res.map_err(|_| Abandoned))
    }
}
