//! # Step descriptor.
//!
//! A [`Step`] is a flat record: the handler, the gate deciding whether it
//! runs, and the error-handler flag deciding how it is invoked. Built by
//! plain factory operations, immutable once registered. "Should this run"
//! and "how to invoke it" are two small functions over the record - no
//! handler subtyping involved.

use std::future::Future;
use std::sync::Arc;

use crate::chain::handler::{HandlerFn, HandlerRef, RecoverFn};
use crate::engine::Next;
use crate::error::{StepError, StepResult};
use crate::host::Invocation;

/// Predicate over the invocation context and the in-flight error.
pub(crate) type PredicateRef<C, T> =
    Arc<dyn Fn(&Invocation<C, T>, Option<&StepError>) -> bool + Send + Sync>;

/// Decides whether a step runs for a given dispatch.
pub(crate) enum Gate<C, T> {
    /// Default rule: normal steps run without an error in flight, error
    /// steps run with one.
    Default,
    /// Explicit predicate; fully overrides the default rule.
    Own(PredicateRef<C, T>),
    /// Group-shared predicate, evaluated at most once per invocation.
    Shared {
        group: u64,
        predicate: PredicateRef<C, T>,
    },
}

impl<C, T> Clone for Gate<C, T> {
    fn clone(&self) -> Self {
        match self {
            Gate::Default => Gate::Default,
            Gate::Own(predicate) => Gate::Own(Arc::clone(predicate)),
            Gate::Shared { group, predicate } => Gate::Shared {
                group: *group,
                predicate: Arc::clone(predicate),
            },
        }
    }
}

/// One registered unit of chain behavior.
pub struct Step<C, T> {
    pub(crate) handler: HandlerRef<C, T>,
    pub(crate) gate: Gate<C, T>,
    pub(crate) is_error: bool,
}

impl<C, T> Clone for Step<C, T> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            gate: self.gate.clone(),
            is_error: self.is_error,
        }
    }
}

impl<C, T> Step<C, T>
where
    C: Send + Sync + 'static,
    T: Send + 'static,
{
    /// Unconditional normal step.
    pub fn run<F, Fut>(f: F) -> Self
    where
        F: Fn(Invocation<C, T>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        Self {
            handler: HandlerFn::arc(f),
            gate: Gate::Default,
            is_error: false,
        }
    }

    /// Normal step gated by `predicate` instead of the default rule.
    pub fn run_if<P, F, Fut>(predicate: P, f: F) -> Self
    where
        P: Fn(&Invocation<C, T>, Option<&StepError>) -> bool + Send + Sync + 'static,
        F: Fn(Invocation<C, T>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        Self {
            handler: HandlerFn::arc(f),
            gate: Gate::Own(Arc::new(predicate)),
            is_error: false,
        }
    }

    /// Error step; by default it runs when an error is in flight.
    pub fn recover<F, Fut>(f: F) -> Self
    where
        F: Fn(Option<StepError>, Invocation<C, T>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        Self {
            handler: RecoverFn::arc(f),
            gate: Gate::Default,
            is_error: true,
        }
    }

    /// Error step gated by `predicate` instead of the default rule.
    ///
    /// The predicate fully overrides the default: such a step may match
    /// even with no error in flight, in which case its handler sees `None`.
    pub fn recover_if<P, F, Fut>(predicate: P, f: F) -> Self
    where
        P: Fn(&Invocation<C, T>, Option<&StepError>) -> bool + Send + Sync + 'static,
        F: Fn(Option<StepError>, Invocation<C, T>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        Self {
            handler: RecoverFn::arc(f),
            gate: Gate::Own(Arc::new(predicate)),
            is_error: true,
        }
    }

    /// Replaces the gate with a group-shared predicate.
    pub(crate) fn share_gate(mut self, group: u64, predicate: PredicateRef<C, T>) -> Self {
        self.gate = Gate::Shared { group, predicate };
        self
    }
}
