//! Diagnostics: warn sinks and violation reporting.
//!
//! The engine emits exactly one kind of diagnostic, protocol-violation
//! reports, and it emits them through a [`WarnSink`]. The sink is derived
//! from the host context when it offers one, falling back to the sink
//! configured on the builder (by default [`ConsoleSink`]). The fallback is
//! an explicit constructor dependency, never ambient global state, so
//! invocations stay independently testable.

mod report;
mod sink;

pub(crate) use report::Reporter;
pub use sink::{ConsoleSink, WarnSink};
