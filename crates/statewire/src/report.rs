#![forbid(unsafe_code)]

//! Routing of individual listener failures.
//!
//! Each failure captured during a write goes to exactly one place:
//!
//! 1. the observable's own error sink, if one is configured;
//! 2. otherwise the thread's unhandled-failure hook, if installed;
//! 3. otherwise a `tracing` error event.
//!
//! Routing happens in addition to the aggregate error returned by the
//! write, never instead of it.

use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{ListenerError, ObservableInfo, SubscriptionId};

/// Where and how a listener failed.
#[derive(Debug, Clone, Copy)]
pub struct FailureContext<'a> {
    pub observable: &'a ObservableInfo,
    pub subscription: SubscriptionId,
    /// Notification-site backtrace; see [`ListenerFailure::backtrace`](crate::ListenerFailure).
    pub backtrace: &'a Backtrace,
}

/// Callback receiving each listener failure.
pub type ErrorSink = Rc<dyn Fn(&ListenerError, &FailureContext<'_>)>;

thread_local! {
    static UNHANDLED_HOOK: RefCell<Option<ErrorSink>> = const { RefCell::new(None) };
}

/// Install the unhandled-failure hook for the current thread, returning the
/// previous one.
pub fn set_unhandled_hook(
    hook: impl Fn(&ListenerError, &FailureContext<'_>) + 'static,
) -> Option<ErrorSink> {
    UNHANDLED_HOOK.with(|slot| slot.borrow_mut().replace(Rc::new(hook)))
}

/// Remove the unhandled-failure hook for the current thread.
pub fn take_unhandled_hook() -> Option<ErrorSink> {
    UNHANDLED_HOOK.with(|slot| slot.borrow_mut().take())
}

pub(crate) fn report(sink: Option<&ErrorSink>, error: &ListenerError, ctx: &FailureContext<'_>) {
    if let Some(sink) = sink {
        sink(error, ctx);
        return;
    }

    // Clone out so the hook may replace itself while running.
    let hook = UNHANDLED_HOOK.with(|slot| slot.borrow().clone());
    match hook {
        Some(hook) => hook(error, ctx),
        None => tracing::error!(
            observable = %ctx.observable,
            subscription = %ctx.subscription,
            error = %error,
            "unhandled listener failure"
        ),
    }
}
