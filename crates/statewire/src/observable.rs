#![forbid(unsafe_code)]

//! Observable value with synchronous change notification.
//!
//! # Design
//!
//! [`Observable<T>`] wraps a value of type `T` in shared, reference-counted
//! storage (`Rc<RefCell<..>>`). Every write stores the new value first and
//! then calls each listener, in subscription order, with a reference to it.
//! No borrow of the interior is held while a listener runs, so listeners may
//! read, write or dispose the observable that is notifying them.
//!
//! # Performance
//!
//! | Operation       | Complexity                  |
//! |-----------------|-----------------------------|
//! | `read()`        | O(1) + clone of `T`         |
//! | `write()`       | O(L) where L = listeners    |
//! | `subscribe()`   | O(1) amortized              |
//! | `Disposer::dispose()` | O(1)                  |
//!
//! # Failure Modes
//!
//! - **Failing listener**: its error (or caught panic) is reported to the
//!   error sink or the unhandled-failure channel, the remaining listeners
//!   still run, and `write` returns [`Error::Listeners`] once the pass ends.
//!   The written value is kept.
//! - **Use after dispose**: every operation except the status queries
//!   returns [`Error::Disposed`].
//! - **Reentrant subscribe**: subscribing while this observable's listeners
//!   are running returns [`Error::ReentrantSubscription`] when the guard is
//!   enabled; otherwise the new listener is added and skipped by the pass
//!   already in progress.
//! - **Borrow inside [`with`](Observable::with)**: writing to the same
//!   observable from the closure passed to `with` panics (RefCell rules).

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ObservableConfig;
use crate::disposer::Disposer;
use crate::error::{
    AggregateListenerError, Error, ListenerError, ListenerFailure, ListenerOutcome, ObservableId,
    ObservableInfo, Result, SubscriptionId,
};
use crate::listeners::{ListenerKey, ListenerList};
use crate::report::{self, ErrorSink, FailureContext};

type Callback<T> = Rc<dyn Fn(&T) -> Result<(), ListenerError>>;

static NEXT_OBSERVABLE_ID: AtomicU64 = AtomicU64::new(0);

/// Shared interior for [`Observable<T>`].
struct ObservableInner<T> {
    value: T,
    version: u64,
    listeners: ListenerList<Callback<T>>,
    alive: bool,
    /// Set while listeners of this observable are being called.
    listeners_locked: bool,
    info: ObservableInfo,
    reentrancy_guard: bool,
    catch_panics: bool,
    error_sink: Option<ErrorSink>,
}

impl<T> ObservableInner<T> {
    fn ensure_alive(&self) -> Result<()> {
        if self.alive {
            Ok(())
        } else {
            Err(Error::Disposed {
                observable: self.info.clone(),
            })
        }
    }
}

/// A shared value that notifies its listeners synchronously on every write.
///
/// Cloning an `Observable` creates a new handle to the **same** inner state:
/// both handles see the same value, listeners and lifecycle.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each write.
/// 2. Listeners are notified in subscription order; removal never reorders
///    the others.
/// 3. The value is updated before any listener runs.
/// 4. Once disposed, an observable never becomes alive again.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

/// An observable used as an event trigger rather than as durable state.
pub type Action<P = ()> = Observable<P>;

// Manual Clone: shares the same Rc.
impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("id", &inner.info.id)
            .field("label", &inner.info.label)
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.listeners.len())
            .field("alive", &inner.alive)
            .finish()
    }
}

impl Observable<()> {
    /// Create a zero-payload action. Fire it with [`fire`](Observable::fire).
    #[must_use]
    pub fn action() -> Self {
        Self::new(())
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Create a new observable with the given initial value and the default
    /// configuration.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::with_config(value, ObservableConfig::default())
    }

    /// Create a new observable with an explicit configuration.
    #[must_use]
    pub fn with_config(value: T, config: ObservableConfig) -> Self {
        let id = ObservableId(NEXT_OBSERVABLE_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                listeners: ListenerList::new(),
                alive: true,
                listeners_locked: false,
                info: ObservableInfo {
                    id,
                    label: config.label,
                },
                reentrancy_guard: config.reentrancy_guard,
                catch_panics: config.catch_panics,
                error_sink: config.error_sink,
            })),
        }
    }

    #[must_use]
    pub fn id(&self) -> ObservableId {
        self.inner.borrow().info.id
    }

    #[must_use]
    pub fn label(&self) -> Option<String> {
        self.inner.borrow().info.label.clone()
    }

    /// Id and label, as carried by errors from this observable.
    #[must_use]
    pub fn info(&self) -> ObservableInfo {
        self.inner.borrow().info.clone()
    }

    /// Lifecycle status. Never fails.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.borrow().alive
    }

    /// Get a clone of the current value.
    pub fn read(&self) -> Result<T> {
        let inner = self.inner.borrow();
        inner.ensure_alive()?;
        Ok(inner.value.clone())
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if `f` writes to this observable.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let inner = self.inner.borrow();
        inner.ensure_alive()?;
        Ok(f(&inner.value))
    }

    /// Store `value` and notify every listener.
    ///
    /// The value is kept even when listeners fail; in that case the returned
    /// [`Error::Listeners`] lists every failure in notification order.
    pub fn write(&self, value: T) -> Result<()> {
        {
            let mut inner = self.inner.borrow_mut();
            inner.ensure_alive()?;
            inner.value = value;
            inner.version += 1;
        }
        self.notify()
    }

    /// Modify the value in place, then notify exactly like [`write`](Self::write).
    ///
    /// # Panics
    ///
    /// Panics if `f` reads or writes this observable.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> Result<()> {
        {
            let mut inner = self.inner.borrow_mut();
            inner.ensure_alive()?;
            f(&mut inner.value);
            inner.version += 1;
        }
        self.notify()
    }

    /// Write `payload`, or re-write the current value when `None`.
    pub fn invoke(&self, payload: impl Into<Option<T>>) -> Result<()> {
        match payload.into() {
            Some(value) => self.write(value),
            None => {
                let current = self.read()?;
                self.write(current)
            }
        }
    }

    /// Re-write the current value, notifying every listener.
    pub fn fire(&self) -> Result<()> {
        self.invoke(None)
    }

    /// Register `listener` at the end of the notification order.
    ///
    /// The listener may return `()` or `Result<(), E>`. The returned
    /// [`Disposer`] removes it.
    pub fn subscribe<F, R>(&self, listener: F) -> Result<Disposer>
    where
        F: Fn(&T) -> R + 'static,
        R: ListenerOutcome + 'static,
    {
        let (_, disposer) = self.attach(listener)?;
        Ok(disposer)
    }

    /// Register `listener` and call it once with the current value before
    /// returning.
    ///
    /// If that first call fails, the failure is reported like a write
    /// failure, the listener is removed again and the aggregate error is
    /// returned.
    pub fn subscribe_immediate<F, R>(&self, listener: F) -> Result<Disposer>
    where
        F: Fn(&T) -> R + 'static,
        R: ListenerOutcome + 'static,
    {
        let (callback, disposer) = self.attach(listener)?;
        let (value, catch_panics) = {
            let inner = self.inner.borrow();
            (inner.value.clone(), inner.catch_panics)
        };

        let outcome = {
            // Removes the listener unless the first call succeeds, including
            // when that call unwinds.
            let mut rollback = Rollback {
                disposer: &disposer,
                armed: true,
            };
            let outcome = {
                let _lock = ListenerLock::acquire(&self.inner);
                call_listener(&callback, &value, catch_panics)
            };
            rollback.armed = outcome.is_err();
            outcome
        };

        match outcome {
            Ok(()) => Ok(disposer),
            Err(error) => {
                let mut failures = Vec::with_capacity(1);
                let origin = self.record_failure(disposer.id(), error, &mut failures);
                Err(AggregateListenerError::new(origin, failures).into())
            }
        }
    }

    /// True iff at least one listener is registered. False after dispose.
    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        !self.inner.borrow().listeners.is_empty()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Number of writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Route listener failures to `sink` instead of the unhandled channel.
    pub fn set_error_sink(&self, sink: impl Fn(&ListenerError, &FailureContext<'_>) + 'static) {
        self.inner.borrow_mut().error_sink = Some(Rc::new(sink));
    }

    pub fn clear_error_sink(&self) {
        self.inner.borrow_mut().error_sink = None;
    }

    /// Drop every listener and mark the observable as torn down.
    ///
    /// Calling `dispose` again is a no-op.
    pub fn dispose(&self) {
        let listeners = {
            let mut inner = self.inner.borrow_mut();
            if !inner.alive {
                return;
            }
            inner.alive = false;
            tracing::debug!(
                observable = %inner.info,
                listeners = inner.listeners.len(),
                "observable disposed"
            );
            std::mem::take(&mut inner.listeners)
        };
        // Listener closures may own handles to this observable.
        drop(listeners);
    }

    fn attach<F, R>(&self, listener: F) -> Result<(Callback<T>, Disposer)>
    where
        F: Fn(&T) -> R + 'static,
        R: ListenerOutcome + 'static,
    {
        let callback: Callback<T> = Rc::new(move |value: &T| listener(value).into_outcome());

        let key = {
            let mut inner = self.inner.borrow_mut();
            inner.ensure_alive()?;
            if inner.listeners_locked && inner.reentrancy_guard {
                tracing::warn!(observable = %inner.info, "rejected reentrant subscription");
                return Err(Error::ReentrantSubscription {
                    observable: inner.info.clone(),
                });
            }
            let key = inner.listeners.push_back(Rc::clone(&callback));
            tracing::debug!(
                observable = %inner.info,
                subscription = %key.id(),
                listeners = inner.listeners.len(),
                "subscribed"
            );
            key
        };

        Ok((callback, self.disposer_for(key)))
    }

    fn disposer_for(&self, key: ListenerKey) -> Disposer {
        let weak = Rc::downgrade(&self.inner);
        Disposer::new(key.id(), move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let removed = inner.borrow_mut().listeners.remove(key);
            if removed.is_some() {
                tracing::debug!(
                    observable = %inner.borrow().info,
                    subscription = %key.id(),
                    "unsubscribed"
                );
            }
        })
    }

    /// Call every listener registered at the start of the pass.
    fn notify(&self) -> Result<()> {
        let (value, snapshot, catch_panics) = {
            let inner = self.inner.borrow();
            let snapshot: Vec<(ListenerKey, Callback<T>)> = inner
                .listeners
                .iter()
                .map(|(key, callback)| (key, Rc::clone(callback)))
                .collect();
            tracing::trace!(
                observable = %inner.info.id,
                version = inner.version,
                listeners = snapshot.len(),
                "notify"
            );
            (inner.value.clone(), snapshot, inner.catch_panics)
        };

        let mut failures = Vec::new();
        let mut origin = None;
        {
            let _lock = ListenerLock::acquire(&self.inner);
            for (key, callback) in &snapshot {
                // Disposed earlier in this pass.
                if !self.inner.borrow().listeners.contains(*key) {
                    continue;
                }
                if let Err(error) = call_listener(callback, &value, catch_panics) {
                    origin = Some(self.record_failure(key.id(), error, &mut failures));
                }
            }
        }

        match origin {
            None => Ok(()),
            Some(origin) => Err(AggregateListenerError::new(origin, failures).into()),
        }
    }

    /// Report one failure and append it to `failures`.
    fn record_failure(
        &self,
        subscription: SubscriptionId,
        error: ListenerError,
        failures: &mut Vec<ListenerFailure>,
    ) -> ObservableInfo {
        let (origin, sink) = {
            let inner = self.inner.borrow();
            (inner.info.clone(), inner.error_sink.clone())
        };
        let failure = ListenerFailure {
            subscription,
            error,
            backtrace: Backtrace::capture(),
        };
        report::report(
            sink.as_ref(),
            &failure.error,
            &FailureContext {
                observable: &origin,
                subscription,
                backtrace: &failure.backtrace,
            },
        );
        failures.push(failure);
        origin
    }
}

/// Sets `listeners_locked` for the lifetime of the guard and restores the
/// previous state on drop, including during unwinding.
struct ListenerLock<'a, T> {
    inner: &'a RefCell<ObservableInner<T>>,
    previous: bool,
}

impl<'a, T> ListenerLock<'a, T> {
    fn acquire(inner: &'a RefCell<ObservableInner<T>>) -> Self {
        let previous = std::mem::replace(&mut inner.borrow_mut().listeners_locked, true);
        Self { inner, previous }
    }
}

impl<T> Drop for ListenerLock<'_, T> {
    fn drop(&mut self) {
        self.inner.borrow_mut().listeners_locked = self.previous;
    }
}

/// Disposes a freshly attached listener on drop while armed.
struct Rollback<'a> {
    disposer: &'a Disposer,
    armed: bool,
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.disposer.dispose();
        }
    }
}

fn call_listener<T>(
    callback: &Callback<T>,
    value: &T,
    catch_panics: bool,
) -> Result<(), ListenerError> {
    if !catch_panics {
        return callback(value);
    }
    match panic::catch_unwind(AssertUnwindSafe(|| callback(value))) {
        Ok(outcome) => outcome,
        Err(payload) => Err(ListenerError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
