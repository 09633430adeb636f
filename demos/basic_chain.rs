//! # Example: basic_chain
//!
//! Minimal chain of three unconditional steps over a toy host context.
//!
//! Demonstrates how to:
//! - Implement [`HostContext`] for a host invocation context.
//! - Register steps with [`ChainBuilder`] and freeze them with `activate()`.
//! - Share per-invocation state through the [`StateBag`].
//! - Await the deferred result of one invocation.
//!
//! ## Run
//! ```bash
//! cargo run --example basic_chain
//! ```

use stepline::{ChainBuilder, HostContext, StepError};

struct Ctx;

impl HostContext<i32> for Ctx {
    fn done(&self, error: Option<StepError>, value: Option<i32>) {
        println!("[host] done: error={error:?} value={value:?}");
    }
}

#[derive(Clone)]
struct Count(i32);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), StepError> {
    let chain = ChainBuilder::<Ctx, i32>::new()
        .step(|inv, next| async move {
            println!("[step-1] seed the counter");
            inv.state().put(Count(1));
            next.proceed();
            Ok(())
        })
        .step(|inv, next| async move {
            println!("[step-2] bump the counter");
            inv.state().update(|c: &mut Count| c.0 += 1);
            next.proceed();
            Ok(())
        })
        .step(|inv, _next| async move {
            println!("[step-3] complete the invocation");
            let Count(n) = inv.state().get::<Count>().unwrap_or(Count(0));
            inv.complete(n + 1);
            Ok(())
        })
        .activate();

    let value = chain.invoke(Ctx).await?;
    println!("[main] resolved with {value}");
    Ok(())
}
