//! Error types used by the chain engine and step handlers.
//!
//! Three kinds of failure exist, with different propagation rules:
//!
//! - [`StepError`] — a domain error produced by a step. The only kind that
//!   travels through the chain: it stays in flight until an error step
//!   recovers it or the chain ends, at which point it rejects the deferred
//!   result with the identical error object.
//! - [`Violation`] — an unexpected call sequence (double completion, double
//!   continuation). Reported through the warn sink, never handed to a step
//!   or the host, never terminal.
//! - [`Fault`] — a minimal message-carrying error for hosts, steps and tests
//!   that have no richer error type of their own.

use std::sync::Arc;

use thiserror::Error;

/// A domain error carried through the chain.
///
/// `Arc`-backed so clones are cheap and identity survives the trip from the
/// failing step to the rejected [`Deferred`](crate::Deferred): the caller
/// receives the very object the step failed with, not a copy.
pub type StepError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of one step handler body.
pub type StepResult = Result<(), StepError>;

/// Minimal message-carrying error.
///
/// ## Example
/// ```
/// use stepline::Fault;
///
/// let err = Fault::arc("boom");
/// assert_eq!(err.to_string(), "boom");
/// ```
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Fault {
    message: String,
}

impl Fault {
    /// Creates a new fault with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Creates the fault and returns it as a shared [`StepError`].
    pub fn arc(message: impl Into<String>) -> StepError {
        Arc::new(Self::new(message))
    }
}

/// Unexpected call sequences detected by the engine.
///
/// A violation is always local to the offending call: it is reported through
/// the warn sink (unless the chain was built `silent`), the call is ignored,
/// and no state advances. Violations never travel through the chain and are
/// never fatal to the invocation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The continuation for a step was invoked a second time.
    #[error("continuation invoked more than once for step {index}")]
    DuplicateContinuation {
        /// Index of the step that owns the continuation.
        index: usize,
    },

    /// A step failed after it had already invoked its continuation.
    #[error("step {index} failed after invoking its continuation")]
    FailedAfterContinuation {
        /// Index of the failing step.
        index: usize,
    },

    /// The invocation was completed a second time.
    #[error("completion invoked more than once for this invocation")]
    DuplicateCompletion,
}

impl Violation {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use stepline::Violation;
    ///
    /// let v = Violation::DuplicateCompletion;
    /// assert_eq!(v.as_label(), "duplicate_completion");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            Violation::DuplicateContinuation { .. } => "duplicate_continuation",
            Violation::FailedAfterContinuation { .. } => "failed_after_continuation",
            Violation::DuplicateCompletion => "duplicate_completion",
        }
    }
}
