//! Per-invocation machinery: dispatch loop, continuation, completion.
//!
//! Internal modules:
//! - [`dispatch`]: the step-execution state machine driving one invocation;
//! - [`next`]: the single-use continuation handle handed to each step;
//! - [`signal`]: the exactly-once completion signal and its deferred view.
//!
//! The only public API from this module is [`Next`] (seen by step handlers)
//! and [`Deferred`] (returned to the invocation caller).

mod dispatch;
mod next;
mod signal;

pub(crate) use dispatch::drive;
pub use next::Next;
pub use signal::Deferred;
pub(crate) use signal::Signal;
