#![forbid(unsafe_code)]

//! Error types for observables and dispatchers.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | [`Error::Disposed`] | Operation on a torn-down observable | Fails fast, nothing changes |
//! | [`Error::ReentrantSubscription`] | `subscribe` from inside a listener while the guard is on | Subscription rejected |
//! | [`Error::Listeners`] | One or more listeners failed during a write | Value stays updated, every listener ran |
//! | [`Error::NoSpawner`] | `on_async` on a dispatcher without a spawner | Handler not registered |

use std::backtrace::Backtrace;
use std::fmt;

/// Boxed error returned by a listener.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Crate result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Process-unique identity of an observable.
///
/// Every clone of an [`Observable`](crate::Observable) reports the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservableId(pub(crate) u64);

impl ObservableId {
    /// Raw numeric value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a single subscription on one observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Id plus optional label, used to name an observable in errors and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableInfo {
    pub id: ObservableId,
    pub label: Option<String>,
}

impl fmt::Display for ObservableInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "observable '{label}' ({})", self.id),
            None => write!(f, "observable {}", self.id),
        }
    }
}

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{observable} used after dispose")]
    Disposed { observable: ObservableInfo },

    #[error("reentrant subscription on {observable} while its listeners are running")]
    ReentrantSubscription { observable: ObservableInfo },

    #[error(transparent)]
    Listeners(#[from] AggregateListenerError),

    #[error("async handler registered on a dispatcher without a spawner")]
    NoSpawner,
}

impl Error {
    /// True for [`Error::Disposed`].
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed { .. })
    }

    /// The aggregate listener error, if this is one.
    #[must_use]
    pub fn as_listeners(&self) -> Option<&AggregateListenerError> {
        match self {
            Self::Listeners(aggregate) => Some(aggregate),
            _ => None,
        }
    }
}

/// What went wrong inside a single listener call.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("listener failed: {0}")]
    Failed(BoxError),

    #[error("listener panicked: {0}")]
    Panicked(String),
}

impl ListenerError {
    /// Wrap any error value returned by a listener.
    pub fn failed(err: impl Into<BoxError>) -> Self {
        Self::Failed(err.into())
    }

    /// True if the listener panicked rather than returning an error.
    #[must_use]
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

/// One captured listener failure.
#[derive(Debug)]
pub struct ListenerFailure {
    pub subscription: SubscriptionId,
    pub error: ListenerError,
    /// Captured when the failure is recorded, so it shows the notification
    /// site (`write`, `update` or `subscribe_immediate`), not the frame
    /// inside the listener that failed or panicked. Empty unless
    /// `RUST_BACKTRACE` enables capture.
    pub backtrace: Backtrace,
}

/// Raised by a write after every listener has run, when at least one failed.
///
/// Failures are kept in notification order.
#[derive(Debug, thiserror::Error)]
#[error("{count} listener(s) failed while notifying {origin}", count = .failures.len())]
pub struct AggregateListenerError {
    origin: ObservableInfo,
    failures: Vec<ListenerFailure>,
}

impl AggregateListenerError {
    pub(crate) fn new(origin: ObservableInfo, failures: Vec<ListenerFailure>) -> Self {
        Self { origin, failures }
    }

    /// The observable whose write produced these failures.
    #[must_use]
    pub fn origin(&self) -> &ObservableInfo {
        &self.origin
    }

    #[must_use]
    pub fn failures(&self) -> &[ListenerFailure] {
        &self.failures
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_failures(self) -> Vec<ListenerFailure> {
        self.failures
    }
}

/// Conversion of a listener's return value into a per-call result.
///
/// Implemented for `()` (infallible listeners) and for `Result<(), E>`
/// where the error converts into a [`BoxError`].
pub trait ListenerOutcome {
    fn into_outcome(self) -> Result<(), ListenerError>;
}

impl ListenerOutcome for () {
    #[inline]
    fn into_outcome(self) -> Result<(), ListenerError> {
        Ok(())
    }
}

impl<E> ListenerOutcome for std::result::Result<(), E>
where
    E: Into<BoxError>,
{
    #[inline]
    fn into_outcome(self) -> Result<(), ListenerError> {
        self.map_err(|err| ListenerError::Failed(err.into()))
    }
}
