#![forbid(unsafe_code)]

//! Handles that remove a single subscription.
//!
//! A [`Disposer`] is explicit: nothing happens until [`Disposer::dispose`]
//! is called, and dropping it leaves the listener registered. Wrap it in a
//! [`Subscription`] to get drop-to-unsubscribe behavior instead.

use std::cell::RefCell;
use std::fmt;

use crate::error::SubscriptionId;

/// Removes exactly one previously registered listener.
///
/// Calling [`dispose`](Self::dispose) more than once, or after the
/// observable was torn down or dropped, is a no-op.
pub struct Disposer {
    id: SubscriptionId,
    remove: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Disposer {
    pub(crate) fn new(id: SubscriptionId, remove: impl FnOnce() + 'static) -> Self {
        Self {
            id,
            remove: RefCell::new(Some(Box::new(remove))),
        }
    }

    /// Subscription this disposer removes.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the listener.
    pub fn dispose(&self) {
        // Release the borrow before running; removal may re-enter user code
        // through a dropped closure's destructor.
        let remove = self.remove.borrow_mut().take();
        if let Some(remove) = remove {
            remove();
        }
    }

    /// Whether [`dispose`](Self::dispose) has already run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.remove.borrow().is_none()
    }

    /// Turn this handle into a guard that disposes on drop.
    #[must_use]
    pub fn into_subscription(self) -> Subscription {
        Subscription { disposer: self }
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// RAII guard for a listener.
///
/// Dropping the `Subscription` removes the listener immediately.
pub struct Subscription {
    disposer: Disposer,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.disposer.id()
    }

    /// Remove the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.disposer.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting() -> (Rc<Cell<u32>>, Disposer) {
        let hits = Rc::new(Cell::new(0u32));
        let hits_clone = Rc::clone(&hits);
        let disposer = Disposer::new(SubscriptionId(4), move || {
            hits_clone.set(hits_clone.get() + 1);
        });
        (hits, disposer)
    }

    #[test]
    fn dispose_runs_once() {
        let (hits, disposer) = counting();
        assert!(!disposer.is_disposed());
        disposer.dispose();
        disposer.dispose();
        assert_eq!(hits.get(), 1);
        assert!(disposer.is_disposed());
    }

    #[test]
    fn dropping_disposer_does_not_remove() {
        let (hits, disposer) = counting();
        drop(disposer);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn subscription_disposes_on_drop() {
        let (hits, disposer) = counting();
        let sub = disposer.into_subscription();
        assert_eq!(sub.id(), SubscriptionId(4));
        sub.unsubscribe();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn debug_format() {
        let (_, disposer) = counting();
        let dbg = format!("{disposer:?}");
        assert!(dbg.contains("Disposer"));
        assert!(dbg.contains("disposed: false"));
    }
}
