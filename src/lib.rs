//! # stepline
//!
//! **Stepline** composes ordered chains of request-handling steps over a
//! callback-style host function runtime. It reconciles the host's single
//! completion callback with a clean sequential (sync or async) execution
//! model: conditional steps, dedicated error-recovery steps, and an
//! exactly-once deferred result per invocation.
//!
//! ## Architecture
//! ```text
//!  step / step_if          ┌──────────────┐     activate()
//!  recover / recover_if ──►│ ChainBuilder │────────────────┐
//!  group / group_if        └──────────────┘                ▼
//!                                              ┌─────────────────────┐
//!                                              │ Chain (frozen list) │
//!                                              │  read-only, shared  │
//!                                              └──────────┬──────────┘
//!                                                         │ invoke(host)
//!                                    one per invocation   ▼
//!                          ┌─────────────────────────────────────────┐
//!                          │ Invocation (host ctx + StateBag + sink) │
//!                          │ dispatch loop: cursor, gates, Next      │
//!                          │ Signal ──────────────► Deferred         │
//!                          └─────────────────────────────────────────┘
//! ```
//!
//! ## Dispatch lifecycle
//! ```text
//! invoke(host)
//!   ├─► wrap host: intercept completion, install StateBag, derive sink
//!   ├─► loop over the frozen list with a work cursor:
//!   │     ├─ gate false ─► skip, in-flight error travels unchanged
//!   │     ├─ gate true  ─► run handler body (one at a time)
//!   │     │     ├─ next.proceed()      ─► advance, no error in flight
//!   │     │     ├─ next.fail(e)        ─► advance, e in flight
//!   │     │     ├─ Err(e) / panic      ─► advance, e in flight
//!   │     │     └─ neither, handles gone ─► traversal ends
//!   │     └─ past the end with an error ─► reject the Deferred with it
//!   └─► Deferred resolves / rejects on the first genuine completion
//! ```
//!
//! ## Guarantees
//! | Concern            | Rule                                                       |
//! |--------------------|------------------------------------------------------------|
//! | Ordering           | Strictly left-to-right in registration order               |
//! | Execution          | At most once per step per invocation                       |
//! | Errors             | Carried until an error step recovers them, never dropped   |
//! | Completion         | Exactly once; duplicates are reported violations           |
//! | Isolation          | Concurrent invocations share only the frozen step list     |
//! | Misbehaving steps  | Violations reported via the warn sink, never fatal         |
//!
//! There is no built-in timeout or cancellation: a step that never completes
//! hangs its invocation's [`Deferred`] forever, and callers wanting bounded
//! latency race it against an external timer.
//!
//! ## Example
//! ```rust
//! use stepline::{ChainBuilder, Fault, HostContext, StepError};
//!
//! struct Ctx;
//!
//! impl HostContext<i32> for Ctx {
//!     fn done(&self, _error: Option<StepError>, _value: Option<i32>) {}
//! }
//!
//! #[derive(Clone)]
//! struct Count(i32);
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), StepError> {
//!     let chain = ChainBuilder::<Ctx, i32>::new()
//!         .step(|inv, next| async move {
//!             inv.state().put(Count(1));
//!             next.proceed();
//!             Ok(())
//!         })
//!         .step(|inv, next| async move {
//!             if inv.state().update(|c: &mut Count| c.0 += 1).is_none() {
//!                 return Err(Fault::arc("count missing"));
//!             }
//!             next.proceed();
//!             Ok(())
//!         })
//!         .recover(|error, inv, _next| async move {
//!             if let Some(error) = error {
//!                 inv.fail(error);
//!             }
//!             Ok(())
//!         })
//!         .step(|inv, _next| async move {
//!             let Count(n) = inv.state().get::<Count>().unwrap_or(Count(0));
//!             inv.complete(n);
//!             Ok(())
//!         })
//!         .activate();
//!
//!     let value = chain.invoke(Ctx).await?;
//!     assert_eq!(value, 2);
//!     Ok(())
//! }
//! ```

mod chain;
mod engine;
mod error;
mod host;
mod observe;

// ---- Public re-exports ----

pub use chain::{Chain, ChainBuilder, Handle, HandlerFn, HandlerRef, RecoverFn, Step};
pub use engine::{Deferred, Next};
pub use error::{Fault, StepError, StepResult, Violation};
pub use host::{HostContext, Invocation, StateBag};
pub use observe::{ConsoleSink, WarnSink};
