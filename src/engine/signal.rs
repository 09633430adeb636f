//! # Exactly-once completion signal.
//!
//! [`Signal`] is the internal resolve/reject pair owned by the invocation;
//! [`Deferred`] is the caller-facing future view. A signal is tri-state -
//! pending, resolved, rejected - and transitions out of pending exactly once.
//! Further settle attempts change nothing and report back `false` so the
//! caller can surface a duplicate-completion violation.
//!
//! A chain that ends without anyone settling the signal leaves the deferred
//! view pending indefinitely. That is the documented contract, not a defect:
//! callers wanting bounded latency race the deferred against an external
//! timer.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::StepError;

/// Internal settle pair: pending → resolved(value) | rejected(error).
pub(crate) struct Signal<T> {
    tx: Mutex<Option<oneshot::Sender<Result<T, StepError>>>>,
}

impl<T> Signal<T> {
    /// Creates a fresh signal and its deferred view.
    pub(crate) fn new() -> (Self, Deferred<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            Deferred { rx: Some(rx) },
        )
    }

    /// pending → resolved. Returns `false` when already settled.
    pub(crate) fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// pending → rejected. Returns `false` when already settled.
    pub(crate) fn reject(&self, error: StepError) -> bool {
        self.settle(Err(error))
    }

    fn settle(&self, outcome: Result<T, StepError>) -> bool {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match tx {
            // A dropped receiver still counts as settled: the transition
            // happened, there is just nobody left to observe it.
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}

/// Deferred view of one invocation's outcome.
///
/// Resolves with the value a step completed with, or rejects with the exact
/// in-flight error no step recovered. Stays pending forever when the chain
/// ends without anyone completing.
pub struct Deferred<T> {
    rx: Option<oneshot::Receiver<Result<T, StepError>>>,
}

impl<T> Future for Deferred<T> {
    type Output = Result<T, StepError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(rx) = this.rx.as_mut() else {
            return Poll::Pending;
        };
        match Pin::new(rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => {
                this.rx = None;
                Poll::Ready(outcome)
            }
            // Sender gone without settling: the chain ended and nobody
            // completed. Pending forever, by contract; no waker is armed.
            Poll::Ready(Err(_)) => {
                this.rx = None;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
