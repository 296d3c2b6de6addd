#![forbid(unsafe_code)]

//! Per-observable configuration.

use std::fmt;
use std::rc::Rc;

use crate::error::ListenerError;
use crate::report::{ErrorSink, FailureContext};

/// Configuration for an [`Observable`](crate::Observable).
#[derive(Clone)]
pub struct ObservableConfig {
    /// Name used in logs and error messages.
    pub label: Option<String>,
    /// Reject `subscribe` calls made while this observable's listeners are
    /// running. Defaults to on in debug builds and off in release builds.
    pub reentrancy_guard: bool,
    /// Convert listener panics into [`ListenerError::Panicked`] instead of
    /// unwinding through `write`.
    pub catch_panics: bool,
    /// Receives each listener failure. When `None`, failures go to the
    /// unhandled-failure channel in [`report`](crate::report).
    pub error_sink: Option<ErrorSink>,
}

impl Default for ObservableConfig {
    fn default() -> Self {
        Self {
            label: None,
            reentrancy_guard: cfg!(debug_assertions),
            catch_panics: true,
            error_sink: None,
        }
    }
}

impl fmt::Debug for ObservableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableConfig")
            .field("label", &self.label)
            .field("reentrancy_guard", &self.reentrancy_guard)
            .field("catch_panics", &self.catch_panics)
            .field("error_sink", &self.error_sink.is_some())
            .finish()
    }
}

impl ObservableConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_reentrancy_guard(mut self, enabled: bool) -> Self {
        self.reentrancy_guard = enabled;
        self
    }

    #[must_use]
    pub fn with_catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    #[must_use]
    pub fn with_error_sink(
        mut self,
        sink: impl Fn(&ListenerError, &FailureContext<'_>) + 'static,
    ) -> Self {
        self.error_sink = Some(Rc::new(sink));
        self
    }
}
