//! Chain construction and the frozen dispatch surface.
//!
//! This module owns everything that exists before an invocation starts:
//! - [`builder`]: fluent registration, freeze-on-activate;
//! - [`step`]: the flat step descriptor and its gate;
//! - [`handler`]: the step-body calling convention and closure adapters;
//! - [`active`]: the frozen [`Chain`] and its invocation entry point.

mod active;
mod builder;
mod handler;
pub(crate) mod step;

pub use active::Chain;
pub use builder::ChainBuilder;
pub use handler::{Handle, HandlerFn, HandlerRef, RecoverFn};
pub use step::Step;
