//! # The step-execution state machine.
//!
//! One [`drive`] call walks one invocation across the frozen step list as an
//! explicit loop over a work cursor - no recursion, so chain length never
//! grows the stack.
//!
//! ## Step loop
//! ```text
//! loop {
//!   past the end?
//!     ├─ error in flight, signal pending ─► reject with that error, exit
//!     └─ otherwise ──────────────────────► exit (deferred stays pending)
//!   gate false? ─► skip, error travels unchanged
//!   gate true?  ─► fresh Next handle, run handler body
//!        │
//!        ├─ Ok, continuation called ──► advance with forwarded error state
//!        ├─ Ok, all handles dropped ──► traversal ends (step completed it)
//!        ├─ Err before continuation ──► advance with the failure in flight
//!        └─ Err after continuation  ──► violation; earlier call stands
//! }
//! ```
//!
//! ## Rules
//! - Each step executes at most once per invocation; traversal is strictly
//!   left-to-right.
//! - Every gate is evaluated at most once per invocation of its index;
//!   group-shared gates at most once per invocation of the whole group.
//! - Exactly one handler body is active at a time. The loop only resumes
//!   after the body returns, and only advances once per step however the
//!   body misbehaves.
//! - A panicking handler body is a failing handler body: the panic payload
//!   becomes the in-flight error, same as an `Err` return.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::oneshot::error::TryRecvError;

use crate::chain::step::{Gate, Step};
use crate::engine::next::Next;
use crate::error::{Fault, StepError, Violation};
use crate::host::{HostContext, Invocation};

/// Drives one invocation across the frozen step list.
pub(crate) async fn drive<C, T>(steps: Arc<[Step<C, T>]>, inv: Invocation<C, T>)
where
    C: HostContext<T>,
    T: Clone + Send + 'static,
{
    let mut memo: HashMap<u64, bool> = HashMap::new();
    let mut index = 0_usize;
    let mut in_flight: Option<StepError> = None;

    loop {
        let Some(step) = steps.get(index) else {
            // Past the end. An unrecovered error rejects the deferred result
            // with the identical error object; a clean fall-off settles
            // nothing and the deferred result stays pending.
            if let Some(error) = in_flight {
                inv.reject_unhandled(error);
            }
            return;
        };

        if !allows(step, &inv, in_flight.as_ref(), &mut memo) {
            // Transparent skip: the in-flight error travels unchanged.
            index += 1;
            continue;
        }

        let (next, mut rx) = Next::new(index, inv.reporter());
        let body = step.handler.call(in_flight.clone(), inv.clone(), next.clone());
        let outcome = match AssertUnwindSafe(body).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(panic_error(panic)),
        };

        match outcome {
            Ok(()) => {
                // Release our handle first, otherwise the send half can
                // never close while we wait.
                drop(next);
                match rx.await {
                    Ok(forwarded) => {
                        index += 1;
                        in_flight = forwarded;
                    }
                    // Every handle is gone without a continuation call: the
                    // step ended traversal. Completion, if any, was its own.
                    Err(_) => return,
                }
            }
            Err(error) => match rx.try_recv() {
                // The step had already continued; the failure must not
                // advance the cursor a second time.
                Ok(forwarded) => {
                    inv.report(&Violation::FailedAfterContinuation { index });
                    index += 1;
                    in_flight = forwarded;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => {
                    next.invalidate();
                    // A clone in a spawned task may have fired between the
                    // failure and the invalidation; that call still wins.
                    if let Ok(forwarded) = rx.try_recv() {
                        inv.report(&Violation::FailedAfterContinuation { index });
                        index += 1;
                        in_flight = forwarded;
                    } else {
                        // Failing before continuing is the same as
                        // continuing with the failure value.
                        index += 1;
                        in_flight = Some(error);
                    }
                }
            },
        }
    }
}

/// Evaluates the gate for `step`, memoizing group-shared predicates.
fn allows<C, T>(
    step: &Step<C, T>,
    inv: &Invocation<C, T>,
    error: Option<&StepError>,
    memo: &mut HashMap<u64, bool>,
) -> bool {
    match &step.gate {
        Gate::Default => {
            if step.is_error {
                error.is_some()
            } else {
                error.is_none()
            }
        }
        Gate::Own(predicate) => predicate(inv, error),
        Gate::Shared { group, predicate } => {
            *memo.entry(*group).or_insert_with(|| predicate(inv, error))
        }
    }
}

fn panic_error(panic: Box<dyn Any + Send>) -> StepError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "step handler panicked".to_string());
    Fault::arc(message)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::{ChainBuilder, Fault, HostContext, Step, StepError, WarnSink};

    type DoneLog<T> = Arc<Mutex<Vec<(Option<String>, Option<T>)>>>;
    type Trace = Arc<Mutex<Vec<&'static str>>>;

    /// Host context with an `i32` completion payload.
    #[derive(Default)]
    struct NumCtx {
        done: DoneLog<i32>,
    }

    impl NumCtx {
        fn with_log() -> (Self, DoneLog<i32>) {
            let ctx = Self::default();
            let log = ctx.done.clone();
            (ctx, log)
        }
    }

    impl HostContext<i32> for NumCtx {
        fn done(&self, error: Option<StepError>, value: Option<i32>) {
            self.done
                .lock()
                .unwrap()
                .push((error.map(|e| e.to_string()), value));
        }
    }

    /// Host context with a `String` completion payload.
    #[derive(Default)]
    struct TextCtx {
        done: DoneLog<String>,
    }

    impl HostContext<String> for TextCtx {
        fn done(&self, error: Option<StepError>, value: Option<String>) {
            self.done
                .lock()
                .unwrap()
                .push((error.map(|e| e.to_string()), value));
        }
    }

    #[derive(Default)]
    struct Capture(Mutex<Vec<String>>);

    impl Capture {
        fn lines(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl WarnSink for Capture {
        fn warn(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    #[derive(Clone, PartialEq, Debug)]
    struct Count(i32);

    fn mark(trace: &Trace, name: &'static str) {
        trace.lock().unwrap().push(name);
    }

    /// Lets the spawned dispatch task finish whatever is ready.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_unconditional_steps_run_in_order() {
        let trace: Trace = Arc::default();
        let (a, b, c) = (trace.clone(), trace.clone(), trace.clone());
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .step(move |_inv, next| {
                let t = a.clone();
                async move {
                    mark(&t, "a");
                    next.proceed();
                    Ok(())
                }
            })
            .step(move |_inv, next| {
                let t = b.clone();
                async move {
                    mark(&t, "b");
                    next.proceed();
                    Ok(())
                }
            })
            .step(move |inv, _next| {
                let t = c.clone();
                async move {
                    mark(&t, "c");
                    inv.complete(3);
                    Ok(())
                }
            })
            .activate();

        let value = chain.invoke(NumCtx::default()).await.unwrap();
        assert_eq!(value, 3);
        settle().await;
        assert_eq!(*trace.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_steps_preserve_order() {
        let trace: Trace = Arc::default();
        let (a, b) = (trace.clone(), trace.clone());
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .step(move |inv, next| {
                let t = a.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    mark(&t, "a");
                    inv.state().put(Count(1));
                    next.proceed();
                    Ok(())
                }
            })
            .step(move |inv, _next| {
                let t = b.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    mark(&t, "b");
                    let Count(n) = inv.state().get::<Count>().unwrap_or(Count(0));
                    inv.complete(n + 1);
                    Ok(())
                }
            })
            .activate();

        let value = chain.invoke(NumCtx::default()).await.unwrap();
        assert_eq!(value, 2);
        settle().await;
        assert_eq!(*trace.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_error_step_recovers_and_completes() {
        let trace: Trace = Arc::default();
        let (a, e, f) = (trace.clone(), trace.clone(), trace.clone());
        let chain = ChainBuilder::<TextCtx, String>::new()
            .step(move |_inv, _next| {
                let t = a.clone();
                async move {
                    mark(&t, "a");
                    Err(Fault::arc("boom"))
                }
            })
            .recover(move |error, inv, _next| {
                let t = e.clone();
                async move {
                    mark(&t, "e");
                    assert_eq!(error.unwrap().to_string(), "boom");
                    inv.complete("recovered".to_string());
                    Ok(())
                }
            })
            .step(move |_inv, next| {
                let t = f.clone();
                async move {
                    mark(&t, "f");
                    next.proceed();
                    Ok(())
                }
            })
            .activate();

        let value = chain.invoke(TextCtx::default()).await.unwrap();
        assert_eq!(value, "recovered");
        settle().await;
        assert_eq!(*trace.lock().unwrap(), vec!["a", "e"]);
    }

    #[tokio::test]
    async fn test_error_step_can_clear_error_and_resume() {
        let trace: Trace = Arc::default();
        let (a, e, f) = (trace.clone(), trace.clone(), trace.clone());
        let chain = ChainBuilder::<TextCtx, String>::new()
            .step(move |_inv, _next| {
                let t = a.clone();
                async move {
                    mark(&t, "a");
                    Err(Fault::arc("boom"))
                }
            })
            .recover(move |_error, _inv, next| {
                let t = e.clone();
                async move {
                    mark(&t, "e");
                    next.proceed();
                    Ok(())
                }
            })
            .step(move |inv, _next| {
                let t = f.clone();
                async move {
                    mark(&t, "f");
                    inv.complete("after".to_string());
                    Ok(())
                }
            })
            .activate();

        let value = chain.invoke(TextCtx::default()).await.unwrap();
        assert_eq!(value, "after");
        settle().await;
        assert_eq!(*trace.lock().unwrap(), vec!["a", "e", "f"]);
    }

    #[tokio::test]
    async fn test_unmatched_error_rejects_with_identical_object() {
        let boom = Fault::arc("boom");
        let thrown = boom.clone();
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .step(move |_inv, _next| {
                let e = thrown.clone();
                async move { Err(e) }
            })
            .step(|inv, _next| async move {
                inv.complete(99);
                Ok(())
            })
            .activate();

        let got = chain.invoke(NumCtx::default()).await.unwrap_err();
        assert!(Arc::ptr_eq(&boom, &got), "must be the same error object");
    }

    #[tokio::test]
    async fn test_false_conditional_behaves_as_unregistered() {
        let trace: Trace = Arc::default();
        let (two, one) = (trace.clone(), trace.clone());
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .step(|inv, next| async move {
                inv.state().put(Count(1));
                next.proceed();
                Ok(())
            })
            .step_if(
                |inv, _error| inv.state().get::<Count>() == Some(Count(2)),
                move |_inv, next| {
                    let t = two.clone();
                    async move {
                        mark(&t, "two");
                        next.proceed();
                        Ok(())
                    }
                },
            )
            .step_if(
                |inv, _error| inv.state().get::<Count>() == Some(Count(1)),
                move |_inv, next| {
                    let t = one.clone();
                    async move {
                        mark(&t, "one");
                        next.proceed();
                        Ok(())
                    }
                },
            )
            .step(|inv, _next| async move {
                let Count(n) = inv.state().get::<Count>().unwrap_or(Count(0));
                inv.complete(n);
                Ok(())
            })
            .activate();

        let value = chain.invoke(NumCtx::default()).await.unwrap();
        assert_eq!(value, 1);
        settle().await;
        assert_eq!(*trace.lock().unwrap(), vec!["one"]);
    }

    #[tokio::test]
    async fn test_skipped_step_never_swallows_error() {
        let boom = Fault::arc("boom");
        let thrown = boom.clone();
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .step(move |_inv, _next| {
                let e = thrown.clone();
                async move { Err(e) }
            })
            .step_if(
                |_inv, _error| false,
                |inv, _next| async move {
                    inv.complete(99);
                    Ok(())
                },
            )
            .activate();

        let got = chain.invoke(NumCtx::default()).await.unwrap_err();
        assert!(Arc::ptr_eq(&boom, &got));
    }

    #[tokio::test]
    async fn test_explicit_predicate_overrides_default_rule() {
        // A normal step gated onto the error path runs despite the error.
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .step(|_inv, _next| async move { Err(Fault::arc("boom")) })
            .step_if(
                |_inv, error| error.is_some(),
                |inv, _next| async move {
                    inv.complete(42);
                    Ok(())
                },
            )
            .activate();

        let value = chain.invoke(NumCtx::default()).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_error_step_with_predicate_may_run_without_error() {
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .recover_if(
                |_inv, error| error.is_none(),
                |error, inv, _next| async move {
                    assert!(error.is_none());
                    inv.complete(7);
                    Ok(())
                },
            )
            .activate();

        let value = chain.invoke(NumCtx::default()).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_forwarded_error_resumes_search_at_next_index() {
        let trace: Trace = Arc::default();
        let (a, e1, e2) = (trace.clone(), trace.clone(), trace.clone());
        let chain = ChainBuilder::<TextCtx, String>::new()
            .step(move |_inv, _next| {
                let t = a.clone();
                async move {
                    mark(&t, "a");
                    Err(Fault::arc("boom"))
                }
            })
            .recover(move |error, _inv, next| {
                let t = e1.clone();
                async move {
                    mark(&t, "e1");
                    next.fail(error.unwrap());
                    Ok(())
                }
            })
            .recover(move |error, inv, _next| {
                let t = e2.clone();
                async move {
                    mark(&t, "e2");
                    inv.complete(error.unwrap().to_string());
                    Ok(())
                }
            })
            .activate();

        let value = chain.invoke(TextCtx::default()).await.unwrap();
        assert_eq!(value, "boom");
        settle().await;
        assert_eq!(*trace.lock().unwrap(), vec!["a", "e1", "e2"]);
    }

    #[tokio::test]
    async fn test_group_predicate_evaluates_once_per_invocation() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .group_if(
                move |_inv, _error| {
                    h.fetch_add(1, Ordering::SeqCst);
                    true
                },
                [
                    Step::run(|_inv, next| async move {
                        next.proceed();
                        Ok(())
                    }),
                    Step::run(|_inv, next| async move {
                        next.proceed();
                        Ok(())
                    }),
                    Step::run(|inv, _next| async move {
                        inv.complete(1);
                        Ok(())
                    }),
                ],
            )
            .activate();

        assert_eq!(chain.invoke(NumCtx::default()).await.unwrap(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // The memo is invocation-scoped, not chain-scoped.
        assert_eq!(chain.invoke(NumCtx::default()).await.unwrap(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_false_group_predicate_skips_every_member() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .group_if(
                move |_inv, _error| {
                    h.fetch_add(1, Ordering::SeqCst);
                    false
                },
                [
                    Step::run(|inv, _next| async move {
                        inv.complete(-1);
                        Ok(())
                    }),
                    Step::run(|inv, _next| async move {
                        inv.complete(-2);
                        Ok(())
                    }),
                ],
            )
            .step(|inv, _next| async move {
                inv.complete(5);
                Ok(())
            })
            .activate();

        assert_eq!(chain.invoke(NumCtx::default()).await.unwrap(), 5);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_continuation_is_reported_not_replayed() {
        let sink = Arc::new(Capture::default());
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .with_fallback_sink(sink.clone())
            .step(|_inv, next| async move {
                next.proceed();
                next.proceed();
                Ok(())
            })
            .step(|inv, _next| async move {
                inv.complete(1);
                Ok(())
            })
            .activate();

        let value = chain.invoke(NumCtx::default()).await.unwrap();
        assert_eq!(value, 1);
        settle().await;
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("[duplicate_continuation]"), "{lines:?}");
    }

    #[tokio::test]
    async fn test_duplicate_completion_keeps_first_value() {
        let sink = Arc::new(Capture::default());
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .with_fallback_sink(sink.clone())
            .step(|inv, next| async move {
                inv.complete(1);
                next.proceed();
                Ok(())
            })
            .step(|inv, _next| async move {
                inv.complete(2);
                Ok(())
            })
            .activate();

        let value = chain.invoke(NumCtx::default()).await.unwrap();
        assert_eq!(value, 1);
        settle().await;
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("[duplicate_completion]"), "{lines:?}");
    }

    #[tokio::test]
    async fn test_silent_suppresses_violation_reports() {
        let sink = Arc::new(Capture::default());
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .with_fallback_sink(sink.clone())
            .silent(true)
            .step(|inv, next| async move {
                inv.complete(1);
                next.proceed();
                Ok(())
            })
            .step(|inv, _next| async move {
                inv.complete(2);
                Ok(())
            })
            .activate();

        assert_eq!(chain.invoke(NumCtx::default()).await.unwrap(), 1);
        settle().await;
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn test_failure_after_continuation_does_not_double_advance() {
        let sink = Arc::new(Capture::default());
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .with_fallback_sink(sink.clone())
            .step(|_inv, next| async move {
                next.proceed();
                Err(Fault::arc("late"))
            })
            .step(|inv, _next| async move {
                inv.complete(5);
                Ok(())
            })
            .activate();

        // The continuation already ran with no error, so the chain completes
        // normally and the late failure is only reported.
        let value = chain.invoke(NumCtx::default()).await.unwrap();
        assert_eq!(value, 5);
        settle().await;
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(
            lines[0].starts_with("[failed_after_continuation]"),
            "{lines:?}"
        );
    }

    #[tokio::test]
    async fn test_panicking_step_behaves_like_failing_step() {
        let chain = ChainBuilder::<TextCtx, String>::new()
            .step(|_inv, _next| async move { panic!("kaboom") })
            .recover(|error, inv, _next| async move {
                inv.complete(error.unwrap().to_string());
                Ok(())
            })
            .activate();

        let value = chain.invoke(TextCtx::default()).await.unwrap();
        assert_eq!(value, "kaboom");
    }

    #[tokio::test]
    async fn test_passthrough_reaches_host_without_settling() {
        let (ctx, done) = NumCtx::with_log();
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .step(|inv, next| async move {
                inv.passthrough(None, Some(10));
                next.proceed();
                Ok(())
            })
            .step(|inv, _next| async move {
                inv.complete(20);
                Ok(())
            })
            .activate();

        // The deferred result carries the genuine completion, not the
        // passthrough value.
        let value = chain.invoke(ctx).await.unwrap();
        assert_eq!(value, 20);
        settle().await;
        assert_eq!(*done.lock().unwrap(), vec![(None, Some(10))]);
    }

    #[tokio::test]
    async fn test_notify_host_mirrors_completion() {
        let (ctx, done) = NumCtx::with_log();
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .notify_host(true)
            .step(|inv, _next| async move {
                inv.complete(8);
                Ok(())
            })
            .activate();

        assert_eq!(chain.invoke(ctx).await.unwrap(), 8);
        settle().await;
        assert_eq!(*done.lock().unwrap(), vec![(None, Some(8))]);
    }

    #[tokio::test]
    async fn test_notify_host_mirrors_unhandled_error() {
        let (ctx, done) = NumCtx::with_log();
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .notify_host(true)
            .step(|_inv, _next| async move { Err(Fault::arc("boom")) })
            .activate();

        let got = chain.invoke(ctx).await.unwrap_err();
        assert_eq!(got.to_string(), "boom");
        settle().await;
        assert_eq!(
            *done.lock().unwrap(),
            vec![(Some("boom".to_string()), None)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_fall_off_leaves_deferred_pending() {
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .step(|_inv, next| async move {
                next.proceed();
                Ok(())
            })
            .activate();

        let raced =
            tokio::time::timeout(Duration::from_secs(60), chain.invoke(NumCtx::default())).await;
        assert!(raced.is_err(), "deferred must stay pending");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stashed_continuation_resumes_chain_later() {
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .step(|_inv, next| async move {
                let stashed = next.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    stashed.proceed();
                });
                Ok(())
            })
            .step(|inv, _next| async move {
                inv.complete(3);
                Ok(())
            })
            .activate();

        let value = chain.invoke(NumCtx::default()).await.unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_concurrent_invocations_are_isolated() {
        let chain = ChainBuilder::<NumCtx, i32>::new()
            .step(|inv, next| async move {
                inv.state().put(Count(1));
                next.proceed();
                Ok(())
            })
            .step(|inv, next| async move {
                inv.state().update(|c: &mut Count| c.0 += 1);
                next.proceed();
                Ok(())
            })
            .step(|inv, _next| async move {
                let Count(n) = inv.state().get::<Count>().unwrap_or(Count(0));
                inv.complete(n);
                Ok(())
            })
            .activate();

        let first = chain.invoke(NumCtx::default());
        let second = chain.invoke(NumCtx::default());
        let (a, b) = tokio::join!(first, second);
        // Each invocation has its own state bag; counters never cross.
        assert_eq!(a.unwrap(), 2);
        assert_eq!(b.unwrap(), 2);
    }
}
