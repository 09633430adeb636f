//! # Warn-level sink contract and console fallback.
//!
//! [`WarnSink`] is the single logging capability the engine requires. Host
//! contexts that carry their own logger expose it through
//! [`HostContext::warn_sink`](crate::HostContext::warn_sink); everything else
//! falls back to the sink configured on the
//! [`ChainBuilder`](crate::ChainBuilder).

/// Warn-level message sink.
///
/// Implementations should be cheap and non-blocking; the engine calls them
/// inline from the dispatch path.
pub trait WarnSink: Send + Sync + 'static {
    /// Emits one warn-level message.
    fn warn(&self, message: &str);
}

/// Simple stdout sink used when neither the host nor the builder supplies
/// anything better.
///
/// Intended for development and demos - production hosts usually expose
/// their own sink through the host context.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl WarnSink for ConsoleSink {
    fn warn(&self, message: &str) {
        println!("[warn] {message}");
    }
}
