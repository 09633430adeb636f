//! # Violation reporting.
//!
//! [`Reporter`] routes protocol-violation reports to the active sink. One
//! reporter exists per invocation, shared by the invocation context and
//! every continuation handle handed to its steps.

use std::sync::Arc;

use crate::error::Violation;
use crate::observe::sink::WarnSink;

/// Per-invocation violation reporter.
pub(crate) struct Reporter {
    sink: Arc<dyn WarnSink>,
    silent: bool,
}

impl Reporter {
    pub(crate) fn new(sink: Arc<dyn WarnSink>, silent: bool) -> Self {
        Self { sink, silent }
    }

    /// Emits `violation` to the sink unless the chain was built silent.
    pub(crate) fn report(&self, violation: &Violation) {
        if !self.silent {
            self.sink
                .warn(&format!("[{}] {violation}", violation.as_label()));
        }
    }
}
