//! # Example: error_recovery
//!
//! A failing step routed to an error step, plus an unrecovered variant.
//!
//! Demonstrates how to:
//! - Fail a step by returning `Err` (equivalent to continuing with the error).
//! - Recover with an error step and complete the invocation.
//! - Observe an unrecovered error rejecting the deferred result.
//!
//! ## Run
//! ```bash
//! cargo run --example error_recovery
//! ```

use stepline::{ChainBuilder, Fault, HostContext, StepError};

struct Ctx;

impl HostContext<String> for Ctx {
    fn done(&self, error: Option<StepError>, value: Option<String>) {
        println!("[host] done: error={error:?} value={value:?}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let recovered = ChainBuilder::<Ctx, String>::new()
        .step(|_inv, _next| async move {
            println!("[step] failing with boom");
            Err(Fault::arc("boom"))
        })
        .recover(|error, inv, _next| async move {
            let reason = error.map(|e| e.to_string()).unwrap_or_default();
            println!("[recover] handling: {reason}");
            inv.complete(format!("recovered from {reason}"));
            Ok(())
        })
        .activate();

    match recovered.invoke(Ctx).await {
        Ok(value) => println!("[main] resolved with {value:?}"),
        Err(error) => println!("[main] rejected with {error}"),
    }

    let unrecovered = ChainBuilder::<Ctx, String>::new()
        .step(|_inv, _next| async move { Err(Fault::arc("nobody catches this")) })
        .activate();

    match unrecovered.invoke(Ctx).await {
        Ok(value) => println!("[main] resolved with {value:?}"),
        Err(error) => println!("[main] rejected with {error}"),
    }
}
