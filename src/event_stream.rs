use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{channel::mpsc, Stream, StreamExt};

use crate::{BoxError, EventPipe, Subscription};

/// Asychronous stream of events published to a pipe. The stream's ```next()``` returns ```Some(event)```
/// while the subscription is registered and ```None``` after the pipe is closed or dropped and all
/// pending events are read.
///
/// Dropping the stream closes its subscription.
pub struct EventStream<T: Send + Sync + 'static> {
    subscription: Subscription<T>,
    events: mpsc::UnboundedReceiver<T>,
}

impl<T: Clone + Send + Sync + 'static> EventStream<T> {
    pub(crate) fn subscribe(pipe: &EventPipe<T>) -> Self {
        let (tx, events) = mpsc::unbounded();
        let subscription = pipe.subscribe(move |event: &T| {
            tx.unbounded_send(event.clone())
                .map_err(|e| BoxError::from(e.into_send_error()))
        });
        Self {
            subscription,
            events,
        }
    }
}

impl<T: Send + Sync + 'static> EventStream<T> {
    pub fn subscription(&self) -> &Subscription<T> {
        &self.subscription
    }
}

impl<T: Send + Sync + 'static> Stream for EventStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}

impl<T: Send + Sync + 'static> Drop for EventStream<T> {
    fn drop(&mut self) {
        self.subscription.close()
    }
}
