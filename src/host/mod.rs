//! Host boundary: context contract, adapter, per-invocation state.
//!
//! The engine never talks to a host runtime directly. [`HostContext`] is the
//! contract a host invocation context must satisfy; [`Invocation`] is the
//! adapter the engine wraps around it - capturing the native completion
//! entry point, installing the intercepting one, installing a fresh
//! [`StateBag`], and deriving the warn sink. The adapter performs no chain
//! logic; it is purely the boundary seam.

mod context;
mod invocation;
mod state;

pub use context::HostContext;
pub use invocation::Invocation;
pub use state::StateBag;
