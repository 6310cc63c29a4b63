// ============================================================================
// quartz-signals - Batching
// Group multiple updates into a single reaction cycle
// ============================================================================
//
// Ported from the upstream TypeScript implementation batching.ts
// ============================================================================

use crate::core::context::with_context;
use crate::reactivity::scheduling::flush_pending_reactions;

// =============================================================================
// BATCH
// =============================================================================

/// Batch multiple signal updates into a single reaction cycle.
///
/// Without batching, each signal update triggers effects immediately.
/// With batching, effects only run once after all updates complete.
///
/// # Example
///
/// ```
/// use quartz_signals::{signal, effect, batch};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let a = signal(1);
/// let b = signal(2);
/// let run_count = Rc::new(Cell::new(0));
///
/// // Create effect that tracks both signals
/// let run_count_clone = run_count.clone();
/// let a_clone = a.clone();
/// let b_clone = b.clone();
/// let _dispose = effect(move || {
///     let _ = a_clone.get() + b_clone.get();
///     run_count_clone.set(run_count_clone.get() + 1);
/// });
///
/// // Effect ran once on creation
/// assert_eq!(run_count.get(), 1);
///
/// // Without batch: would run effect twice (once per update)
/// // With batch: runs effect once (after both updates)
/// batch(|| {
///     a.set(10);
///     b.set(20);
/// });
///
/// // Effect ran only once more (not twice)
/// assert_eq!(run_count.get(), 2);
/// ```
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    with_context(|ctx| ctx.enter_batch());

    // Use a guard pattern to ensure we exit the batch even on panic
    struct BatchGuard;

    impl Drop for BatchGuard {
        fn drop(&mut self) {
            let depth = with_context(|ctx| ctx.exit_batch());

            // When outermost batch completes, flush pending reactions
            if depth == 0 {
                flush_pending_reactions();
            }
        }
    }

    let _guard = BatchGuard;
    f()
}

/// Check if currently inside a batch.
///
/// # Example
///
/// ```
/// use quartz_signals::{batch, is_batching};
///
/// assert!(!is_batching());
///
/// batch(|| {
///     assert!(is_batching());
/// });
///
/// assert!(!is_batching());
/// ```
pub fn is_batching() -> bool {
    with_context(|ctx| ctx.is_batching())
}

// =============================================================================
// UNTRACK
// =============================================================================

/// Read signals without creating dependencies.
///
/// Useful when you need to read a value but don't want the effect
/// to re-run when it changes.
///
/// # Example
///
/// ```
/// use quartz_signals::{signal, effect, untrack};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let a = signal(1);
/// let b = signal(2);
/// let run_count = Rc::new(Cell::new(0));
///
/// let a_clone = a.clone();
/// let b_clone = b.clone();
/// let run_count_clone = run_count.clone();
/// let _dispose = effect(move || {
///     // This creates a dependency on 'a'
///     let a_val = a_clone.get();
///
///     // This does NOT create a dependency on 'b'
///     let b_val = untrack(|| b_clone.get());
///
///     run_count_clone.set(run_count_clone.get() + 1);
/// });
///
/// assert_eq!(run_count.get(), 1);
///
/// a.set(10); // Effect re-runs (dependency)
/// assert_eq!(run_count.get(), 2);
///
/// b.set(20); // Effect does NOT re-run (untracked)
/// assert_eq!(run_count.get(), 2);
/// ```
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let prev = with_context(|ctx| ctx.set_untracking(true));

    // Use a guard pattern to ensure we restore even on panic
    struct UntrackGuard {
        prev: bool,
    }

    impl Drop for UntrackGuard {
        fn drop(&mut self) {
            with_context(|ctx| ctx.set_untracking(self.prev));
        }
    }

    let _guard = UntrackGuard { prev };
    f()
}

/// Alias for `untrack()`.
///
/// Some prefer this name as it's more explicit about "peeking" at a value
/// without creating a dependency.
///
/// # Example
///
/// ```
/// use quartz_signals::{signal, effect, peek};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = signal(0);
/// let count_clone = count.clone();
///
/// let _dispose = effect(move || {
///     // Peek at value without tracking
///     let val = peek(|| count_clone.get());
///     // Effect won't re-run when count changes
/// });
/// ```
pub fn peek<T>(f: impl FnOnce() -> T) -> T {
    untrack(f)
}

/// Check if currently in untrack mode.
///
/// Returns true if inside an `untrack()` or `peek()` block.
pub fn is_untracking() -> bool {
    with_context(|ctx| ctx.is_untracking())
}

// =============================================================================
// TICK
// =============================================================================

/// Wait for the next update cycle.
///
/// In TypeScript with microtasks, this waits for a Promise tick then flushes.
/// In Rust without microtasks, this simply flushes all pending effects synchronously.
///
/// Use this when you need to ensure all pending effects have run before continuing.
///
/// # Example
///
/// ```
/// use quartz_signals::{signal, effect, batch, tick};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = signal(0);
/// let seen = Rc::new(Cell::new(0));
///
/// let count_clone = count.clone();
/// let seen_clone = seen.clone();
/// let _dispose = effect(move || {
///     seen_clone.set(count_clone.get());
/// });
///
/// // Inside a batch, effects are deferred
/// batch(|| {
///     count.set(42);
///     // Effect hasn't run yet
/// });
///
/// // But tick() ensures effects have flushed
/// tick();
/// assert_eq!(seen.get(), 42);
/// ```
pub fn tick() {
    if let Err(err) = crate::reactivity::scheduling::flush_sync() {
        tracing::error!(%err, "tick() flush failed");
    }
}

// =============================================================================
// TESTS
// =============================================================================
