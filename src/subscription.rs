use std::{fmt, sync::Weak};

use crate::{pipe::Shared, EventPipe};

/// Identity of a registry entry. Unique within one pipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle of registered consumer returned by [subscribe](EventPipe::subscribe).
///
/// The handle doesn't keep the pipe alive. Dropping it does not unsubscribe, call [close](Subscription::close) for that.
pub struct Subscription<T> {
    id: SubscriptionId,
    pipe: Weak<Shared<T>>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub(crate) fn new(id: SubscriptionId, pipe: Weak<Shared<T>>) -> Self {
        Self { id, pipe }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove consumer from its pipe. Repeated calls do nothing.
    pub fn close(&self) {
        if let Some(shared) = self.pipe.upgrade() {
            shared.unsubscribe(self.id);
        }
    }

    /// Pipe this subscription belongs to, ```None``` if the pipe is already dropped
    pub fn owner(&self) -> Option<EventPipe<T>> {
        self.pipe.upgrade().map(EventPipe::from_shared)
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
