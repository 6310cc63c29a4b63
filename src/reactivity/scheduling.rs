// ============================================================================
// quartz-signals - Effect Scheduling
// Handles scheduling effects for execution
// ============================================================================
//
// In TypeScript, effects are scheduled via queueMicrotask.
// In Rust, we don't have microtasks, so we use synchronous scheduling with
// explicit flush. This is actually cleaner for many use cases.
//
// Key functions:
// - schedule_effect: Queue an effect for execution
// - flush_pending_reactions: Run pending reactions queued during a batch
// - flush_sync: Synchronously flush with loop detection
// ============================================================================

use std::rc::Rc;

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::error::ReactiveError;
use crate::core::types::AnyReaction;
use crate::primitives::effect::EffectInner;
use crate::reactivity::tracking::is_dirty;

// =============================================================================
// SCHEDULE EFFECT
// =============================================================================

/// Schedule an effect for execution.
///
/// For sync effects (RENDER_EFFECT), this runs immediately.
/// For async effects, this queues and schedules a flush.
///
/// In Rust, since we don't have microtasks, we flush immediately
/// unless we're in a batch.
pub fn schedule_effect(effect: Rc<EffectInner>) {
    let reaction: Rc<dyn AnyReaction> = effect.clone();

    with_context(|ctx| {
        // Always add to pending reactions for flushSync to catch
        ctx.add_pending_reaction(Rc::downgrade(&reaction));

        // For ROOT_EFFECT, walk up to find the root and queue it
        let flags = effect.flags();
        if (flags & ROOT_EFFECT) != 0 {
            ctx.add_queued_root_effect(Rc::downgrade(&reaction));
        }
    });

    // Flush outside of with_context to avoid nested borrows.
    let should_flush = with_context(|ctx| !ctx.is_batching() && !ctx.is_flushing_sync());

    if should_flush {
        if let Err(err) = flush_sync_inner(None) {
            tracing::error!(%err, "flush triggered by schedule_effect failed");
        }
    }
}

// =============================================================================
// FLUSH PENDING REACTIONS
// =============================================================================

/// Flush pending reactions from a batch.
pub fn flush_pending_reactions() {
    let reactions = with_context(|ctx| ctx.take_pending_reactions());

    for reaction_weak in reactions {
        if let Some(reaction) = reaction_weak.upgrade() {
            // Skip inert (paused) effects
            if (reaction.flags() & INERT) != 0 {
                continue;
            }

            if is_dirty(&*reaction) {
                // Check if it's an effect
                if (reaction.flags() & EFFECT) != 0 {
                    reaction.update();
                }
                // Deriveds are handled by their next read
            }
        }
    }
}

// =============================================================================
// FLUSH SYNC
// =============================================================================

/// Synchronously flush all pending updates.
///
/// Runs all effects immediately instead of waiting for a microtask.
/// Detects infinite loops where effects keep triggering themselves and
/// reports them as [`ReactiveError::MaxUpdateDepthExceeded`] rather than
/// panicking, so a host embedding the engine can tear down the affected
/// scope instead of unwinding.
pub fn flush_sync() -> Result<(), ReactiveError> {
    flush_sync_inner(None).map(|_| ())
}

/// Synchronously flush with optional function to run.
///
/// If a function is provided, effects are flushed, then the function
/// runs, then effects are flushed again.
pub fn flush_sync_with<T: 'static>(
    f: impl FnOnce() -> T + 'static,
) -> Result<T, ReactiveError> {
    let boxed = flush_sync_inner(Some(Box::new(|| Box::new(f()) as Box<dyn std::any::Any>)))?;
    Ok(*boxed
        .downcast::<T>()
        .ok()
        .expect("flush_sync_with: type mismatch"))
}

/// Inner flush implementation.
fn flush_sync_inner(
    f: Option<Box<dyn FnOnce() -> Box<dyn std::any::Any>>>,
) -> Result<Box<dyn std::any::Any>, ReactiveError> {
    let was_flushing = with_context(|ctx| {
        let was = ctx.is_flushing_sync();
        ctx.set_flushing_sync(true);
        was
    });

    let cap = with_context(|ctx| ctx.options().max_update_iterations);
    let outcome = run_flush_loop(f, cap);

    with_context(|ctx| ctx.set_flushing_sync(was_flushing));
    outcome
}

fn run_flush_loop(
    f: Option<Box<dyn FnOnce() -> Box<dyn std::any::Any>>>,
    cap: u32,
) -> Result<Box<dyn std::any::Any>, ReactiveError> {
    let mut flush_count = 0u32;

    let result = if let Some(func) = f {
        func()
    } else {
        Box::new(()) as Box<dyn std::any::Any>
    };

    loop {
        flush_count += 1;
        if flush_count > cap {
            tracing::error!(iterations = flush_count, "flush_sync exceeded update depth cap");
            return Err(ReactiveError::MaxUpdateDepthExceeded {
                iterations: flush_count,
            });
        }

        let roots = with_context(|ctx| ctx.take_queued_root_effects());

        if roots.is_empty() {
            let pending = with_context(|ctx| ctx.take_pending_reactions());

            if pending.is_empty() {
                break;
            }

            for reaction_weak in pending {
                if let Some(reaction) = reaction_weak.upgrade() {
                    if (reaction.flags() & INERT) != 0 {
                        continue;
                    }

                    if is_dirty(&*reaction) && (reaction.flags() & EFFECT) != 0 {
                        reaction.update();
                    }
                }
            }
            continue;
        }

        for root_weak in roots {
            if let Some(root) = root_weak.upgrade() {
                if (root.flags() & INERT) != 0 {
                    continue;
                }

                if is_dirty(&*root) {
                    root.update();
                }
            }
        }
    }

    tracing::debug!(iterations = flush_count, "flush_sync settled");
    Ok(result)
}

// =============================================================================
// SPECIALIZED SCHEDULING FOR EFFECT INNER
// =============================================================================

/// Schedule an EffectInner directly (preferred method).
///
/// This version keeps the Rc<EffectInner> and can call update_effect properly.
pub fn schedule_effect_inner(effect: Rc<EffectInner>) {
    let flags = effect.flags();

    let should_run_now = with_context(|ctx| {
        ctx.add_pending_reaction(Rc::downgrade(&(effect.clone() as Rc<dyn AnyReaction>)));
        !ctx.is_batching() && !ctx.is_flushing_sync()
    });

    if should_run_now && (flags & (RENDER_EFFECT | EFFECT)) != 0 {
        if let Err(err) = run_effect_flush() {
            tracing::error!(%err, "effect self-flush failed");
        }
    }
}

/// Run effect flush - processes pending effects with proper Rc handling.
fn run_effect_flush() -> Result<(), ReactiveError> {
    let was_flushing = with_context(|ctx| {
        let was = ctx.is_flushing_sync();
        ctx.set_flushing_sync(true);
        was
    });

    let cap = with_context(|ctx| ctx.options().max_update_iterations);
    let mut flush_count = 0u32;

    let outcome = loop {
        flush_count += 1;
        if flush_count > cap {
            break Err(ReactiveError::MaxUpdateDepthExceeded {
                iterations: flush_count,
            });
        }

        let pending = with_context(|ctx| ctx.take_pending_reactions());

        if pending.is_empty() {
            break Ok(());
        }

        for reaction_weak in pending {
            if let Some(reaction) = reaction_weak.upgrade() {
                if (reaction.flags() & INERT) != 0 {
                    continue;
                }

                if !is_dirty(&*reaction) {
                    continue;
                }

                if (reaction.flags() & EFFECT) != 0 {
                    reaction.update();
                }
            }
        }
    };

    with_context(|ctx| ctx.set_flushing_sync(was_flushing));
    outcome
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::{with_context_options, EngineOptions};
    use crate::primitives::effect::EffectInner;
    use std::cell::Cell;

    #[test]
    fn flush_sync_runs_pending_effects() {
        let run_count = Rc::new(Cell::new(0));
        let run_count_clone = run_count.clone();

        let effect = EffectInner::new(
            EFFECT | USER_EFFECT,
            Some(Box::new(move || {
                run_count_clone.set(run_count_clone.get() + 1);
                None
            })),
        );

        // Add to pending
        with_context(|ctx| {
            ctx.add_pending_reaction(Rc::downgrade(&(effect.clone() as Rc<dyn AnyReaction>)));
        });

        assert_eq!(run_count.get(), 0);

        flush_sync().expect("flush should settle");

        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn max_flush_count_prevents_infinite_loop() {
        // A self-invalidating effect (reads and writes the same signal) never
        // settles; with a low iteration cap, flush_sync must report
        // MaxUpdateDepthExceeded instead of looping forever.
        use crate::primitives::signal::signal;

        with_context_options(
            EngineOptions {
                max_update_iterations: 5,
                ..EngineOptions::default()
            },
            || {
                let count = signal(0);
                let count_clone = count.clone();

                let effect = EffectInner::new(
                    EFFECT | USER_EFFECT,
                    Some(Box::new(move || {
                        let current = count_clone.get();
                        count_clone.set(current + 1);
                        None
                    })),
                );

                with_context(|ctx| {
                    ctx.add_pending_reaction(Rc::downgrade(
                        &(effect.clone() as Rc<dyn AnyReaction>),
                    ));
                });

                let result = flush_sync();
                assert!(matches!(
                    result,
                    Err(ReactiveError::MaxUpdateDepthExceeded { .. })
                ));
            },
        );
    }

    #[test]
    fn schedule_effect_in_batch_defers_execution() {
        let run_count = Rc::new(Cell::new(0));
        let run_count_clone = run_count.clone();

        let effect = EffectInner::new(
            EFFECT | USER_EFFECT,
            Some(Box::new(move || {
                run_count_clone.set(run_count_clone.get() + 1);
                None
            })),
        );

        // Enter batch
        with_context(|ctx| ctx.enter_batch());

        // Schedule effect
        schedule_effect_inner(effect.clone());

        // Effect should not have run yet (we're in a batch)
        assert_eq!(run_count.get(), 0);

        // Exit batch - this should trigger flush
        with_context(|ctx| ctx.exit_batch());

        // Manual flush required since we used low-level context methods
        // (normally batch() helper handles this)
        flush_sync().expect("flush should settle");

        // Effect should have run
        assert_eq!(run_count.get(), 1);
    }
}
