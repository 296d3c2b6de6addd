#![forbid(unsafe_code)]

//! Binding actions to handlers, with teardown as a unit.
//!
//! A [`Dispatcher`] is a ledger of the subscriptions it created. Application
//! reducers own one and register their handlers when they are built:
//!
//! ```
//! use statewire::{Dispatcher, Observable, Result};
//!
//! struct Counter {
//!     count: Observable<i64>,
//!     increment: Observable<()>,
//!     dispatcher: Dispatcher,
//! }
//!
//! impl Counter {
//!     fn new() -> Result<Self> {
//!         let count = Observable::new(0);
//!         let increment = Observable::action();
//!         let dispatcher = Dispatcher::named("counter");
//!
//!         let target = count.clone();
//!         dispatcher.on(&increment, move |_: &()| target.update(|n| *n += 1))?;
//!
//!         Ok(Self { count, increment, dispatcher })
//!     }
//! }
//!
//! let counter = Counter::new()?;
//! counter.increment.fire()?;
//! counter.increment.fire()?;
//! assert_eq!(counter.count.read()?, 2);
//! counter.dispatcher.dispose();
//! # Ok::<(), statewire::Error>(())
//! ```
//!
//! # Invariants
//!
//! 1. `dispose` removes exactly the subscriptions this dispatcher created,
//!    in registration order, and leaves every other listener in place.
//! 2. Handlers registered on the same signal run in registration order.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::task::{LocalSpawn, LocalSpawnExt, SpawnError};

use crate::disposer::Disposer;
use crate::error::{Error, ListenerOutcome, Result};
use crate::observable::Observable;

/// Owner of a set of action subscriptions that are torn down together.
pub struct Dispatcher {
    label: Option<String>,
    disposers: RefCell<Vec<Disposer>>,
    spawner: Option<Rc<dyn LocalSpawn>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("label", &self.label)
            .field("handlers", &self.handler_count())
            .field("has_spawner", &self.spawner.is_some())
            .finish()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            label: None,
            disposers: RefCell::new(Vec::new()),
            spawner: None,
        }
    }

    /// Create a dispatcher whose log events carry `label`.
    #[must_use]
    pub fn named(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::new()
        }
    }

    /// Use `spawner` to run handlers registered with
    /// [`on_async`](Self::on_async).
    #[must_use]
    pub fn with_spawner(mut self, spawner: impl LocalSpawn + 'static) -> Self {
        self.spawner = Some(Rc::new(spawner));
        self
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Run `handler` every time `signal` is written.
    pub fn on<T, F, R>(&self, signal: &Observable<T>, handler: F) -> Result<()>
    where
        T: Clone + 'static,
        F: Fn(&T) -> R + 'static,
        R: ListenerOutcome + 'static,
    {
        let disposer = signal.subscribe(handler)?;
        let mut disposers = self.disposers.borrow_mut();
        disposers.push(disposer);
        tracing::debug!(
            dispatcher = self.label.as_deref().unwrap_or("-"),
            observable = %signal.id(),
            handlers = disposers.len(),
            "handler registered"
        );
        Ok(())
    }

    /// Spawn the future returned by `handler` every time `signal` is written.
    ///
    /// The write does not wait for the future. Only a failure to spawn is
    /// reported as a listener failure; errors inside the future are the
    /// handler's own concern.
    pub fn on_async<T, F, Fut>(&self, signal: &Observable<T>, handler: F) -> Result<()>
    where
        T: Clone + 'static,
        F: Fn(&T) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let spawner = self.spawner.clone().ok_or(Error::NoSpawner)?;
        self.on(signal, move |value: &T| -> Result<(), SpawnError> {
            spawner.spawn_local(handler(value))
        })
    }

    /// Registrations recorded since the last [`dispose`](Self::dispose).
    ///
    /// Registrations whose signal was torn down elsewhere still count.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.disposers.borrow().len()
    }

    /// Remove every registration made through this dispatcher.
    ///
    /// Calling `dispose` again is a no-op.
    pub fn dispose(&self) {
        let disposers = std::mem::take(&mut *self.disposers.borrow_mut());
        if disposers.is_empty() {
            return;
        }
        tracing::debug!(
            dispatcher = self.label.as_deref().unwrap_or("-"),
            handlers = disposers.len(),
            "dispatcher disposed"
        );
        for disposer in &disposers {
            disposer.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn handlers_run_in_registration_order() {
        let signal = Observable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let dispatcher = Dispatcher::new();

        for tag in ['x', 'y', 'z'] {
            let log = Rc::clone(&log);
            dispatcher
                .on(&signal, move |v: &i32| log.borrow_mut().push((tag, *v)))
                .unwrap();
        }

        signal.write(4).unwrap();
        assert_eq!(*log.borrow(), vec![('x', 4), ('y', 4), ('z', 4)]);
        assert_eq!(dispatcher.handler_count(), 3);
    }

    #[test]
    fn dispose_is_idempotent() {
        let signal = Observable::action();
        let hits = Rc::new(Cell::new(0u32));
        let hits_clone = Rc::clone(&hits);
        let dispatcher = Dispatcher::named("once");
        dispatcher
            .on(&signal, move |_: &()| hits_clone.set(hits_clone.get() + 1))
            .unwrap();

        dispatcher.dispose();
        dispatcher.dispose();
        signal.fire().unwrap();

        assert_eq!(hits.get(), 0);
        assert_eq!(dispatcher.handler_count(), 0);
        assert!(!signal.has_subscribers());
    }

    #[test]
    fn registering_on_disposed_signal_fails() {
        let signal = Observable::action();
        signal.dispose();
        let dispatcher = Dispatcher::new();
        let err = dispatcher.on(&signal, |_: &()| {}).unwrap_err();
        assert!(err.is_disposed());
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[test]
    fn on_async_without_spawner_fails() {
        let signal = Observable::action();
        let dispatcher = Dispatcher::new();
        let err = dispatcher
            .on_async(&signal, |_: &()| async {})
            .unwrap_err();
        assert!(matches!(err, Error::NoSpawner));
        assert!(!signal.has_subscribers());
    }

    #[test]
    fn debug_format() {
        let dispatcher = Dispatcher::named("todos");
        let dbg = format!("{dispatcher:?}");
        assert!(dbg.contains("todos"));
        assert!(dbg.contains("has_spawner: false"));
        assert_eq!(dispatcher.label(), Some("todos"));
    }
}
