//! # Adapter-wrapped invocation context.
//!
//! [`Invocation`] is the seam between the engine and one host invocation:
//! it owns the host context, a fresh [`StateBag`], the completion signal,
//! and the violation reporter. Step handlers receive a clone per call;
//! clones share the same underlying invocation.
//!
//! ## Completion rules
//! - [`complete`](Invocation::complete) / [`fail`](Invocation::fail) are the
//!   intercepted entry points: the first genuine call settles the deferred
//!   result, later calls are duplicate-completion violations.
//! - [`passthrough`](Invocation::passthrough) bypasses the deferred result
//!   entirely and forwards verbatim to the host's native entry point.

use std::sync::Arc;

use crate::engine::{Deferred, Signal};
use crate::error::{StepError, Violation};
use crate::host::context::HostContext;
use crate::host::state::StateBag;
use crate::observe::{Reporter, WarnSink};

/// One in-flight invocation, shared by every step it dispatches.
pub struct Invocation<C, T> {
    inner: Arc<Inner<C, T>>,
}

struct Inner<C, T> {
    host: C,
    state: StateBag,
    signal: Signal<T>,
    reporter: Arc<Reporter>,
    notify_host: bool,
}

impl<C, T> Clone for Invocation<C, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, T> Invocation<C, T>
where
    C: HostContext<T>,
    T: Clone + Send + 'static,
{
    /// Wraps `host` for one invocation: derives the warn sink (host sink
    /// first, `fallback` otherwise), installs a fresh state bag, and creates
    /// the completion signal.
    pub(crate) fn new(
        host: C,
        fallback: Arc<dyn WarnSink>,
        silent: bool,
        notify_host: bool,
    ) -> (Self, Deferred<T>) {
        let sink = host.warn_sink().unwrap_or(fallback);
        let (signal, deferred) = Signal::new();
        let inner = Inner {
            host,
            state: StateBag::new(),
            signal,
            reporter: Arc::new(Reporter::new(sink, silent)),
            notify_host,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            deferred,
        )
    }

    /// The wrapped host context.
    pub fn host(&self) -> &C {
        &self.inner.host
    }

    /// The invocation-scoped state container.
    pub fn state(&self) -> &StateBag {
        &self.inner.state
    }

    /// Finishes the invocation successfully with `value`.
    ///
    /// The first genuine completion resolves the deferred result; later
    /// calls are duplicate-completion violations (reported, ignored).
    pub fn complete(&self, value: T) {
        let forward = self.inner.notify_host.then(|| value.clone());
        if !self.inner.signal.resolve(value) {
            self.report(&Violation::DuplicateCompletion);
            return;
        }
        if let Some(value) = forward {
            self.inner.host.done(None, Some(value));
        }
    }

    /// Finishes the invocation with `error`.
    ///
    /// Rejects the deferred result with the identical error object. Later
    /// completion calls are duplicate-completion violations.
    pub fn fail(&self, error: StepError) {
        if !self.inner.signal.reject(error.clone()) {
            self.report(&Violation::DuplicateCompletion);
            return;
        }
        if self.inner.notify_host {
            self.inner.host.done(Some(error), None);
        }
    }

    /// Forwards verbatim to the host's native completion entry point.
    ///
    /// Never touches the deferred result: a passthrough neither settles it
    /// nor counts as a genuine completion.
    pub fn passthrough(&self, error: Option<StepError>, value: Option<T>) {
        self.inner.host.done(error, value);
    }

    /// End-of-chain rejection for an error no step recovered.
    ///
    /// Quiet when the invocation already completed; only a still-pending
    /// signal picks the error up.
    pub(crate) fn reject_unhandled(&self, error: StepError) {
        if self.inner.signal.reject(error.clone()) && self.inner.notify_host {
            self.inner.host.done(Some(error), None);
        }
    }

    pub(crate) fn reporter(&self) -> Arc<Reporter> {
        Arc::clone(&self.inner.reporter)
    }

    pub(crate) fn report(&self, violation: &Violation) {
        self.inner.reporter.report(violation);
    }
}
