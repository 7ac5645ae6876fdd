use futures::{
    channel::oneshot,
    future::{self, BoxFuture},
    task::{Spawn, SpawnExt},
    FutureExt,
};

use crate::DeliveryError;

/// Unit of work submitted by a pipe: delivery of one event to one consumer
pub type Work = Box<dyn FnOnce() -> Result<(), DeliveryError> + Send + 'static>;

/// Completion of a submitted [Work], resolves to the work's own result
pub type Dispatch = BoxFuture<'static, Result<(), DeliveryError>>;

///
/// Runs the dispatch units of event pipes. The pipe never schedules anything itself, it submits
/// one [Work] per (event, consumer) pair and joins the returned [Dispatch] handles.
///
/// Implementations may run work sequentially or in parallel. In the latter case one consumer can be
/// invoked concurrently for different events.
///
pub trait EventExecutor: Send + Sync {
    fn execute(&self, work: Work) -> Dispatch;
}

/// Executor running work on any [futures] spawner, e.g. [futures::executor::ThreadPool]
///
/// Result is passed back through a oneshot channel, so spawned work keeps running
/// even if nobody awaits the dispatch.
#[derive(Clone, Debug)]
pub struct SpawnExecutor<S> {
    spawner: S,
}

impl<S: Spawn + Send + Sync> SpawnExecutor<S> {
    pub fn new(spawner: S) -> Self {
        Self { spawner }
    }
    pub fn spawner(&self) -> &S {
        &self.spawner
    }
}

impl<S: Spawn + Send + Sync> EventExecutor for SpawnExecutor<S> {
    fn execute(&self, work: Work) -> Dispatch {
        let (tx, rx) = oneshot::channel();
        let spawned = self.spawner.spawn(async move {
            // receiver gone means nobody is interested in the outcome
            let _ = tx.send(work());
        });
        match spawned {
            Ok(()) => rx
                .map(|res| res.unwrap_or(Err(DeliveryError::Dropped)))
                .boxed(),
            Err(e) => future::ready(Err(DeliveryError::Rejected(e))).boxed(),
        }
    }
}

/// Executor running work immediately on the publishing thread.
///
/// Every dispatch is complete by the time [publish](crate::EventPipe::publish) returns.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl EventExecutor for InlineExecutor {
    fn execute(&self, work: Work) -> Dispatch {
        future::ready(work()).boxed()
    }
}
