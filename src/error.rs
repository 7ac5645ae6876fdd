use futures::task::SpawnError;
use thiserror::Error;

/// Error type returned by consumers. Anything convertible with `?` works.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a single dispatch unit, i.e. one event delivered to one consumer
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("consumer failed: {0}")]
    Consumer(#[source] BoxError),

    #[error("consumer panicked: {0}")]
    Panicked(String),

    #[error("executor rejected dispatch: {0}")]
    Rejected(#[from] SpawnError),

    #[error("dispatch was dropped before it completed")]
    Dropped,
}

/// Aggregate failure of one [publish](crate::EventPipe::publish) call.
///
/// Every dispatch unit ran to completion, at least one of them failed.
#[derive(Debug, Error)]
#[error("{} of {dispatched} deliveries failed", .failures.len())]
pub struct PublishError {
    dispatched: usize,
    failures: Vec<DeliveryError>,
}

impl PublishError {
    pub(crate) fn new(dispatched: usize, failures: Vec<DeliveryError>) -> Self {
        Self {
            dispatched,
            failures,
        }
    }
    /// Number of dispatch units submitted by the publish call
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }
    /// Failures of individual deliveries, never empty
    pub fn failures(&self) -> &[DeliveryError] {
        &self.failures
    }
    pub fn into_failures(self) -> Vec<DeliveryError> {
        self.failures
    }
}

/// Returned by [First](crate::First) when its waiter was removed from the pipe
/// (pipe closed or dropped) before any matching event arrived.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("waiter was removed before a matching event arrived")]
pub struct Abandoned;
