//! # Frozen chain.
//!
//! [`Chain`] is the activation product: an immutable, ordered snapshot of
//! steps plus the options the builder carried. It is the only resource
//! shared across concurrent invocations, and since it is read-only no
//! locking is involved - clones share the same `Arc`-backed snapshot.

use std::sync::Arc;

use crate::chain::step::Step;
use crate::engine::{self, Deferred};
use crate::host::{HostContext, Invocation};
use crate::observe::WarnSink;

/// An activated, immutable chain of steps.
pub struct Chain<C, T> {
    steps: Arc<[Step<C, T>]>,
    silent: bool,
    notify_host: bool,
    fallback: Arc<dyn WarnSink>,
}

impl<C, T> Clone for Chain<C, T> {
    fn clone(&self) -> Self {
        Self {
            steps: Arc::clone(&self.steps),
            silent: self.silent,
            notify_host: self.notify_host,
            fallback: Arc::clone(&self.fallback),
        }
    }
}

impl<C, T> Chain<C, T>
where
    C: HostContext<T>,
    T: Clone + Send + 'static,
{
    pub(crate) fn new(
        steps: Arc<[Step<C, T>]>,
        silent: bool,
        notify_host: bool,
        fallback: Arc<dyn WarnSink>,
    ) -> Self {
        Self {
            steps,
            silent,
            notify_host,
            fallback,
        }
    }

    /// Runs one invocation of the chain against `host`.
    ///
    /// Dispatch starts eagerly on the current tokio runtime; the returned
    /// [`Deferred`] resolves or rejects when a step completes the
    /// invocation, and stays pending forever if none ever does. Concurrent
    /// invocations are fully isolated: each gets its own state bag, cursor
    /// and completion signal.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn invoke(&self, host: C) -> Deferred<T> {
        let (inv, deferred) =
            Invocation::new(host, Arc::clone(&self.fallback), self.silent, self.notify_host);
        tokio::spawn(engine::drive(Arc::clone(&self.steps), inv));
        deferred
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain has no steps at all.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
