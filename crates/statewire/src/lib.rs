#![forbid(unsafe_code)]

//! Observable values and action dispatch for application state.
//!
//! # Role
//! `statewire` is a small state layer for single-threaded applications:
//! state lives in [`Observable`] containers, events are [`Action`]s (also
//! observables), and a [`Dispatcher`] wires actions to the handlers that
//! update state.
//!
//! # Primary pieces
//! - **Observable**: shared value with ordered listeners, synchronous
//!   notification and explicit teardown.
//! - **Disposer / Subscription**: explicit and RAII handles that remove one
//!   listener.
//! - **Dispatcher**: registers handlers on actions and tears them all down
//!   at once.
//! - **Errors and reporting**: listener failures are isolated, routed to an
//!   error sink (or the unhandled-failure channel) and returned from the
//!   write as one [`AggregateListenerError`].
//!
//! # Example
//!
//! ```
//! use statewire::{Dispatcher, Observable};
//!
//! let count = Observable::new(0);
//! let set_to = Observable::new(0);
//! let reducer = Dispatcher::new();
//!
//! let target = count.clone();
//! reducer.on(&set_to, move |v: &i32| target.write(*v))?;
//!
//! set_to.invoke(10)?;
//! assert_eq!(count.read()?, 10);
//! # Ok::<(), statewire::Error>(())
//! ```

pub mod config;
pub mod dispatcher;
pub mod disposer;
pub mod error;
mod listeners;
pub mod observable;
pub mod report;

pub use config::ObservableConfig;
pub use dispatcher::Dispatcher;
pub use disposer::{Disposer, Subscription};
pub use error::{
    AggregateListenerError, BoxError, Error, ListenerError, ListenerFailure, ListenerOutcome,
    ObservableId, ObservableInfo, Result, SubscriptionId,
};
pub use observable::{Action, Observable};
pub use report::{ErrorSink, FailureContext};
