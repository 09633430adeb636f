//! # Step handler contract and function-backed adapters.
//!
//! [`Handle`] is the uniform calling convention the dispatcher invokes every
//! step through. Most code never implements it directly: [`HandlerFn`]
//! adapts a `(invocation, next)` closure and [`RecoverFn`] an
//! `(error, invocation, next)` closure, each producing a fresh future per
//! call. This keeps step bodies free of shared mutable state; steps that
//! need shared state reach for an explicit `Arc` inside the closure.
//!
//! ## Example
//! ```
//! use stepline::{HandlerFn, HandlerRef, HostContext, StepError};
//!
//! struct Ctx;
//! impl HostContext<i32> for Ctx {
//!     fn done(&self, _error: Option<StepError>, _value: Option<i32>) {}
//! }
//!
//! let h: HandlerRef<Ctx, i32> = HandlerFn::arc(|inv, next| async move {
//!     inv.state().put(1_i32);
//!     next.proceed();
//!     Ok(())
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::Next;
use crate::error::{StepError, StepResult};
use crate::host::Invocation;

/// Uniform calling convention for one step body.
///
/// `error` is the in-flight error at dispatch time, if any. Normal-step
/// adapters ignore it; error-step adapters hand it to their closure.
#[async_trait]
pub trait Handle<C, T>: Send + Sync + 'static {
    /// Runs the step body once for one invocation.
    async fn call(
        &self,
        error: Option<StepError>,
        inv: Invocation<C, T>,
        next: Next,
    ) -> StepResult;
}

/// Shared handle to a step body.
pub type HandlerRef<C, T> = Arc<dyn Handle<C, T>>;

/// Normal-step adapter: wraps a `(invocation, next)` closure.
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the handler and returns it as a shared [`HandlerRef`].
    pub fn arc<C, T>(f: F) -> HandlerRef<C, T>
    where
        Self: Handle<C, T>,
    {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<C, T, F, Fut> Handle<C, T> for HandlerFn<F>
where
    C: Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(Invocation<C, T>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    async fn call(
        &self,
        _error: Option<StepError>,
        inv: Invocation<C, T>,
        next: Next,
    ) -> StepResult {
        (self.f)(inv, next).await
    }
}

/// Error-step adapter: wraps an `(error, invocation, next)` closure.
///
/// The error is `Option` because an error step gated by an explicit
/// predicate may run with no error in flight.
pub struct RecoverFn<F> {
    f: F,
}

impl<F> RecoverFn<F> {
    /// Creates a new function-backed error handler.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the handler and returns it as a shared [`HandlerRef`].
    pub fn arc<C, T>(f: F) -> HandlerRef<C, T>
    where
        Self: Handle<C, T>,
    {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<C, T, F, Fut> Handle<C, T> for RecoverFn<F>
where
    C: Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(Option<StepError>, Invocation<C, T>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    async fn call(
        &self,
        error: Option<StepError>,
        inv: Invocation<C, T>,
        next: Next,
    ) -> StepResult {
        (self.f)(error, inv, next).await
    }
}
