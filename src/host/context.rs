//! # Host context contract.
//!
//! [`HostContext`] is what the external host runtime must supply per
//! invocation: a native completion callback, and optionally a warn-level
//! logging capability. `T` is the completion payload the host expects.
//!
//! ## Example
//! ```
//! use stepline::{HostContext, StepError};
//!
//! struct Ctx;
//!
//! impl HostContext<i32> for Ctx {
//!     fn done(&self, error: Option<StepError>, value: Option<i32>) {
//!         match error {
//!             Some(e) => println!("host done: error={e}"),
//!             None => println!("host done: value={value:?}"),
//!         }
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::error::StepError;
use crate::observe::WarnSink;

/// Contract the host invocation context must satisfy.
///
/// The engine intercepts completion: steps settle the invocation's deferred
/// result through [`Invocation::complete`](crate::Invocation::complete) and
/// [`Invocation::fail`](crate::Invocation::fail), and `done` is only reached
/// through the passthrough variant or the `notify_host` builder option.
pub trait HostContext<T>: Send + Sync + 'static {
    /// The host's native completion entry point, callable as `(error, value)`.
    fn done(&self, error: Option<StepError>, value: Option<T>);

    /// Warn-level logging capability offered by the host, if any.
    ///
    /// When `None`, the engine uses the fallback sink configured on the
    /// builder.
    fn warn_sink(&self) -> Option<Arc<dyn WarnSink>> {
        None
    }
}
