//! # Single-use continuation handle.
//!
//! [`Next`] is how a step hands control, and optionally an error, to its
//! successor. Each step gets a fresh handle; the first call wins and any
//! later call is a duplicate-continuation violation - reported, ignored,
//! advancing nothing.
//!
//! Handles are cheap to clone. A clone moved into a spawned task keeps the
//! chain resumable after the handler body returns; the dispatcher waits for
//! either a continuation call or the last handle to go away.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::error::{StepError, Violation};
use crate::observe::Reporter;

type Slot = Arc<Mutex<Option<oneshot::Sender<Option<StepError>>>>>;

/// Continuation handle for one step of one invocation.
#[derive(Clone)]
pub struct Next {
    slot: Slot,
    index: usize,
    reporter: Arc<Reporter>,
}

impl Next {
    /// Creates the handle for the step at `index` plus the receive half the
    /// dispatcher waits on.
    pub(crate) fn new(
        index: usize,
        reporter: Arc<Reporter>,
    ) -> (Self, oneshot::Receiver<Option<StepError>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
                index,
                reporter,
            },
            rx,
        )
    }

    /// Hands control to the next step with no error in flight.
    pub fn proceed(&self) {
        self.dispatch(None);
    }

    /// Hands control to the next step with `error` in flight.
    ///
    /// Error steps use this to forward the error they were given (resuming
    /// the search for a matching error step) or to escalate a new one.
    pub fn fail(&self, error: StepError) {
        self.dispatch(Some(error));
    }

    fn dispatch(&self, error: Option<StepError>) {
        let tx = self.take();
        match tx {
            Some(tx) => {
                // Receiver gone means the dispatcher already moved on after
                // the step failed; that path reported its own violation.
                let _ = tx.send(error);
            }
            None => self.reporter.report(&Violation::DuplicateContinuation {
                index: self.index,
            }),
        }
    }

    /// Drops the send half so later calls report instead of advancing.
    ///
    /// Used by the dispatcher when the owning step failed: the failure takes
    /// the continuation's place, and the handle must not fire afterwards.
    pub(crate) fn invalidate(&self) {
        self.take();
    }

    fn take(&self) -> Option<oneshot::Sender<Option<StepError>>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
