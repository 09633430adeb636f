//! # Chain registration.
//!
//! [`ChainBuilder`] accumulates steps in registration order; insertion order
//! is execution priority order, and nothing reorders at runtime.
//! [`activate`](ChainBuilder::activate) consumes the builder and freezes the
//! list into a [`Chain`], so registering into an already-activated chain is
//! impossible by construction - a hard freeze.
//!
//! ## Example
//! ```
//! use stepline::{ChainBuilder, HostContext, Step, StepError};
//!
//! struct Ctx;
//! impl HostContext<i32> for Ctx {
//!     fn done(&self, _error: Option<StepError>, _value: Option<i32>) {}
//! }
//!
//! let chain = ChainBuilder::<Ctx, i32>::new()
//!     .step(|inv, next| async move {
//!         inv.state().put(1_i32);
//!         next.proceed();
//!         Ok(())
//!     })
//!     .recover(|error, inv, _next| async move {
//!         if let Some(error) = error {
//!             inv.fail(error);
//!         }
//!         Ok(())
//!     })
//!     .step(|inv, _next| async move {
//!         let n = inv.state().get::<i32>().unwrap_or(0);
//!         inv.complete(n);
//!         Ok(())
//!     })
//!     .activate();
//!
//! assert_eq!(chain.len(), 3);
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::chain::active::Chain;
use crate::chain::step::{PredicateRef, Step};
use crate::engine::Next;
use crate::error::{StepError, StepResult};
use crate::host::{HostContext, Invocation};
use crate::observe::{ConsoleSink, WarnSink};

/// Fluent registrar for an ordered sequence of steps.
pub struct ChainBuilder<C, T> {
    steps: Vec<Step<C, T>>,
    silent: bool,
    notify_host: bool,
    fallback: Arc<dyn WarnSink>,
    groups: u64,
}

impl<C, T> ChainBuilder<C, T>
where
    C: HostContext<T>,
    T: Clone + Send + 'static,
{
    /// Creates an empty builder with default options: violations reported,
    /// completions not mirrored to the host, [`ConsoleSink`] fallback.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            silent: false,
            notify_host: false,
            fallback: Arc::new(ConsoleSink),
            groups: 0,
        }
    }

    /// Appends an unconditional normal step.
    pub fn step<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Invocation<C, T>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        self.steps.push(Step::run(f));
        self
    }

    /// Appends a normal step gated by `predicate`.
    ///
    /// The predicate fully replaces the default "no error in flight" rule.
    pub fn step_if<P, F, Fut>(mut self, predicate: P, f: F) -> Self
    where
        P: Fn(&Invocation<C, T>, Option<&StepError>) -> bool + Send + Sync + 'static,
        F: Fn(Invocation<C, T>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        self.steps.push(Step::run_if(predicate, f));
        self
    }

    /// Appends an error step; it runs when an error is in flight.
    pub fn recover<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Option<StepError>, Invocation<C, T>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        self.steps.push(Step::recover(f));
        self
    }

    /// Appends an error step gated by `predicate` instead of the default
    /// "error present" rule.
    pub fn recover_if<P, F, Fut>(mut self, predicate: P, f: F) -> Self
    where
        P: Fn(&Invocation<C, T>, Option<&StepError>) -> bool + Send + Sync + 'static,
        F: Fn(Option<StepError>, Invocation<C, T>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        self.steps.push(Step::recover_if(predicate, f));
        self
    }

    /// Appends prebuilt steps in order, each keeping its own independent
    /// gate.
    pub fn group(mut self, steps: impl IntoIterator<Item = Step<C, T>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Appends `steps` gated by one shared `predicate`.
    ///
    /// The predicate body runs at most once per invocation for the whole
    /// group, however many items it gates or how many of them run; its
    /// memoized result gates every member. Side-effecting predicates
    /// therefore fire once, by design. A shared gate replaces whatever gate
    /// the items carried.
    pub fn group_if<P>(
        mut self,
        predicate: P,
        steps: impl IntoIterator<Item = Step<C, T>>,
    ) -> Self
    where
        P: Fn(&Invocation<C, T>, Option<&StepError>) -> bool + Send + Sync + 'static,
    {
        let group = self.groups;
        self.groups += 1;
        let predicate: PredicateRef<C, T> = Arc::new(predicate);
        self.steps.extend(
            steps
                .into_iter()
                .map(|step| step.share_gate(group, Arc::clone(&predicate))),
        );
        self
    }

    /// Suppresses protocol-violation reports.
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Also forwards genuine completions to the host's native entry point.
    ///
    /// Off by default: the deferred result is normally the only delivery
    /// channel, and the host callback is reached through
    /// [`Invocation::passthrough`] alone.
    pub fn notify_host(mut self, notify: bool) -> Self {
        self.notify_host = notify;
        self
    }

    /// Sets the warn sink used when the host context offers none.
    pub fn with_fallback_sink(mut self, sink: Arc<dyn WarnSink>) -> Self {
        self.fallback = sink;
        self
    }

    /// Freezes the registered steps into an invocable [`Chain`].
    ///
    /// Consumes the builder: the snapshot is read-only from here on and
    /// shared by every invocation without locking.
    pub fn activate(self) -> Chain<C, T> {
        Chain::new(
            self.steps.into(),
            self.silent,
            self.notify_host,
            self.fallback,
        )
    }
}

impl<C, T> Default for ChainBuilder<C, T>
where
    C: HostContext<T>,
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
