// ============================================================================
// quartz-signals - Dependency Tracking
// The core of the reactivity system - tracking reads and propagating writes
// ============================================================================
//
// The key challenge in Rust is borrow scoping: we must release RefCell borrows
// before mutating, using the "collect-then-mutate" pattern.
// ============================================================================

use std::rc::Rc;

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::error::ReactiveError;
use crate::core::types::{AnyReaction, AnySource};

// =============================================================================
// TRACK READ - Register dependency when reading a signal
// =============================================================================

/// Track a read of a source, registering it as a dependency if inside a reaction.
///
/// Called by Signal::get() after reading the value.
///
/// # Borrow Safety
/// This function accesses the thread-local context and may modify both the
/// source's reactions list and the reaction's deps list. Care is taken to
/// not hold borrows across these mutations.
pub fn track_read(source: Rc<dyn AnySource>) {
    with_context(|ctx| {
        // Only track if we're inside a reaction and not untracking
        if !ctx.has_active_reaction() || ctx.is_untracking() {
            return;
        }

        // Get the active reaction
        let reaction_weak = match ctx.get_active_reaction() {
            Some(r) => r,
            None => return,
        };

        let reaction = match reaction_weak.upgrade() {
            Some(r) => r,
            None => return,
        };

        // Check if we're in the reaction's update cycle
        if (reaction.flags() & REACTION_IS_UPDATING) != 0 {
            // Version-based deduplication: only add if not already tracked this cycle
            let read_version = ctx.get_read_version();

            if source.read_version() < read_version {
                // First read of this source in this cycle
                source.set_read_version(read_version);

                // Add to the new deps list being built
                ctx.add_new_dep(source.clone());
            }
            // If rv >= readVersion, we already tracked this source this cycle - skip
        } else {
            // Outside update cycle (e.g., reading after reaction setup)
            // Add dependency directly with duplicate checking

            // Add source to reaction's deps
            reaction.add_dep(source.clone());

            // Add reaction to source's reactions
            source.add_reaction(Rc::downgrade(&reaction));
        }
    });
}

// =============================================================================
// NOTIFY WRITE - Called when a signal's value changes
// =============================================================================

/// Notify the reactive system that a source's value is about to change.
///
/// Called by `Signal::set()`/`Signal::update()` before the new value is
/// stored, so a rejected write never lets a derived observe a partial
/// mutation of its own dependencies.
pub fn guard_write(ctx_label: &'static str) -> Result<(), ReactiveError> {
    with_context(|ctx| {
        if let Some(reaction_weak) = ctx.get_active_reaction() {
            if let Some(reaction) = reaction_weak.upgrade() {
                if (reaction.flags() & DERIVED) != 0 {
                    tracing::warn!(site = ctx_label, "write rejected inside a derived");
                    return Err(ReactiveError::WriteInsideDerived);
                }
            }
        }
        Ok(())
    })
}

/// Notify the reactive system that a source's value has changed.
///
/// Called by Signal::set() after the value is updated. This triggers
/// mark_reactions to propagate dirty state through the graph. Callers that
/// need to reject the write outright (because it originates inside a
/// derived) must call [`guard_write`] first; by the time `notify_write` runs
/// the mutation has already happened and can only be propagated.
pub fn notify_write(source: Rc<dyn AnySource>) {
    mark_reactions(source, DIRTY);
}

// =============================================================================
// MARK REACTIONS - Propagate dirty state through the graph
// =============================================================================

/// Mark all reactions of a source with the given status.
///
/// For direct dependents: mark with the given status (usually DIRTY)
/// For deriveds: cascade MAYBE_DIRTY to their dependents
/// For effects: schedule them for execution
///
/// # Algorithm
/// Uses an iterative approach with an explicit stack to avoid stack overflow
/// on deep dependency chains. This is critical for performance with deeply
/// nested deriveds.
///
/// # Borrow Safety
/// The key challenge: we iterate over a source's reactions while also needing
/// to modify those reactions (set their flags) and potentially iterate THEIR
/// reactions (for deriveds).
///
/// Solution: "collect-then-mutate" pattern
/// 1. Collect reactions into a temporary Vec (releases the borrow)
/// 2. Iterate the Vec and mutate freely
pub fn mark_reactions(source: Rc<dyn AnySource>, status: u32) {
    // Collect effects to schedule (we can't schedule inside with_context)
    let mut effects_to_schedule: Vec<Rc<dyn AnyReaction>> = Vec::new();

    // Use iterative approach with explicit stack
    let mut stack: Vec<(Rc<dyn AnySource>, u32)> = vec![(source, status)];

    while let Some((current_source, current_status)) = stack.pop() {
        // Clean up dead reactions first (prevents O(n) memory growth in reaction lists)
        current_source.cleanup_dead_reactions();

        // BORROW SAFETY: Collect reactions first, then release the borrow
        // This is the critical pattern that prevents RefCell panics
        let reactions: Vec<Rc<dyn AnyReaction>> = {
            let mut collected = Vec::new();
            current_source.for_each_reaction(&mut |reaction| {
                collected.push(reaction);
                true // continue iteration
            });
            collected
        };
        // Borrow on current_source.reactions is now released

        for reaction in reactions {
            let flags = reaction.flags();

            // Skip if already DIRTY (don't downgrade to MAYBE_DIRTY)
            let not_dirty = (flags & DIRTY) == 0;

            if not_dirty {
                set_signal_status(&*reaction, current_status);
            }

            // For derived signals, cascade MAYBE_DIRTY to their dependents
            if (flags & DERIVED) != 0 {
                // Derived is also a Source - get its reactions
                // We need to push it to the stack to process its reactions
                if let Some(derived_as_source) = reaction.as_derived_source() {
                    stack.push((derived_as_source, MAYBE_DIRTY));
                }
            } else if not_dirty && (flags & EFFECT) != 0 {
                // For effects that just became dirty, schedule them for execution
                effects_to_schedule.push(reaction);
            }
        }
    }

    // Schedule all dirty effects
    for effect in effects_to_schedule {
        schedule_effect(effect);
    }
}

/// Schedule an effect for execution.
///
/// Adds the effect to the pending queue and triggers a flush. Mirrors
/// [`crate::reactivity::scheduling::schedule_effect`], which runs the same
/// loop over concrete `Rc<EffectInner>`s; this copy exists because
/// `mark_reactions` only has type-erased `Rc<dyn AnyReaction>`s in hand. A
/// cap violation is logged and swallowed here, same as in `scheduling.rs` -
/// `notify_write`'s caller has no way to observe it since the signal write
/// that triggered it has already committed.
fn schedule_effect(effect: Rc<dyn AnyReaction>) {
    with_context(|ctx| {
        ctx.add_pending_reaction(Rc::downgrade(&effect));
    });

    // Flush immediately (Rust doesn't have microtasks)
    // Check if we're already flushing to avoid recursion
    let should_flush = with_context(|ctx| !ctx.is_batching() && !ctx.is_flushing_sync());

    if should_flush {
        if let Err(err) = flush_pending_effects() {
            tracing::error!(%err, "flush triggered by mark_reactions failed");
        }
    }
}

/// Flush all pending effects.
fn flush_pending_effects() -> Result<(), ReactiveError> {
    let was_flushing = with_context(|ctx| {
        let was = ctx.is_flushing_sync();
        ctx.set_flushing_sync(true);
        was
    });

    let cap = with_context(|ctx| ctx.options().max_update_iterations);
    let mut iterations = 0u32;

    let outcome = loop {
        iterations += 1;
        if iterations > cap {
            tracing::error!(iterations, "flush_pending_effects exceeded update depth cap");
            break Err(ReactiveError::MaxUpdateDepthExceeded { iterations });
        }

        let pending = with_context(|ctx| ctx.take_pending_reactions());

        if pending.is_empty() {
            break Ok(());
        }

        for reaction_weak in pending {
            if let Some(reaction) = reaction_weak.upgrade() {
                let flags = reaction.flags();

                // Skip inert (paused) or destroyed effects
                if (flags & (INERT | DESTROYED)) != 0 {
                    continue;
                }

                // Only run if still dirty
                if !is_dirty(&*reaction) {
                    continue;
                }

                // Run the effect
                if (flags & EFFECT) != 0 {
                    reaction.update();
                }
            }
        }
    };

    with_context(|ctx| ctx.set_flushing_sync(was_flushing));
    outcome
}

// =============================================================================
// SET SIGNAL STATUS - Helper to update status flags
// =============================================================================

/// Set the status flags of a signal/reaction (CLEAN, DIRTY, MAYBE_DIRTY).
///
/// Clears the existing status bits and sets the new status.
pub fn set_signal_status(target: &dyn AnyReaction, status: u32) {
    let new_flags = (target.flags() & STATUS_MASK) | status;
    target.set_flags(new_flags);
}

/// Set status on an AnySource (for consistency, same operation)
pub fn set_source_status(target: &dyn AnySource, status: u32) {
    let new_flags = (target.flags() & STATUS_MASK) | status;
    target.set_flags(new_flags);
}

// =============================================================================
// IS DIRTY - Check if a reaction needs to update
// =============================================================================

/// Check if a reaction is dirty and needs to be updated.
///
/// - DIRTY: definitely needs update
/// - MAYBE_DIRTY: check dependencies to see if any actually changed
/// - CLEAN: no update needed
///
/// For Phase 3, this is a simple flag check.
/// Phase 4 will add the MAYBE_DIRTY dependency walk for deriveds.
pub fn is_dirty(reaction: &dyn AnyReaction) -> bool {
    let flags = reaction.flags();

    // Definitely dirty
    if (flags & DIRTY) != 0 {
        return true;
    }

    // Not maybe dirty - definitely clean
    if (flags & MAYBE_DIRTY) == 0 {
        return false;
    }

    // MAYBE_DIRTY: For now, treat as dirty.
    // Phase 4 will implement the proper dependency version checking.
    // This is conservative but correct - we might do unnecessary updates
    // but we won't miss necessary ones.
    true
}

// =============================================================================
// REMOVE REACTIONS - Clean up stale dependencies
// =============================================================================

/// Remove a reaction from its dependencies, starting at the given index.
///
/// When a reaction re-runs, its dependencies might change. This function
/// removes the reaction from dependencies that are no longer used.
///
/// # Borrow Safety
/// We iterate the reaction's deps (which requires borrowing) and then
/// modify each dep's reactions list. The collect-then-mutate pattern
/// ensures we don't hold conflicting borrows.
pub fn remove_reactions(reaction: Rc<dyn AnyReaction>, start: usize) {
    // Collect deps to remove from (starting at index 'start')
    let deps_to_remove: Vec<Rc<dyn AnySource>> = {
        let mut collected = Vec::new();
        let mut idx = 0;
        reaction.for_each_dep(&mut |dep| {
            if idx >= start {
                collected.push(dep.clone());
            }
            idx += 1;
            true
        });
        collected
    };
    // Borrow on reaction.deps is released

    // Now remove the reaction from each dep's reactions list
    for dep in deps_to_remove {
        remove_reaction_from_source(&reaction, &*dep);
    }

    // Truncate the reaction's deps list
    reaction.remove_deps_from(start);
}

/// Remove a single reaction from a source's reactions list.
///
/// Uses the source's cleanup method which handles the Weak reference removal.
fn remove_reaction_from_source(reaction: &Rc<dyn AnyReaction>, source: &dyn AnySource) {
    // The source stores Weak<dyn AnyReaction>, so we need to find and remove
    // the matching weak reference.
    //
    // Since we can't directly compare Weak references by identity easily,
    // we use a different approach: mark the reaction for removal and let
    // the source's cleanup handle it.
    //
    // Actually, we need to add a method to AnySource for this.
    // For now, the source.cleanup_dead_reactions() will clean up dropped refs,
    // but for active removal we need source.remove_reaction(reaction).

    source.remove_reaction(reaction);
}

// =============================================================================
// INSTALL DEPENDENCIES - Wire up deps after reaction execution
// =============================================================================

/// Install new dependencies after a reaction has run.
///
/// Called after a reaction's function executes. Takes the collected new_deps
/// and wires them up properly:
/// 1. Keep deps that were skipped (read in same order as last time)
/// 2. Add new deps
/// 3. Register the reaction with each new dep
pub fn install_dependencies(reaction: Rc<dyn AnyReaction>, skipped: usize) {
    with_context(|ctx| {
        // Take the new deps collected during execution
        let new_deps = ctx.swap_new_deps(Vec::new());

        if new_deps.is_empty() && skipped == 0 {
            // No dependencies at all
            reaction.clear_deps();
            return;
        }

        // Remove old deps that are no longer used (from skipped onwards)
        remove_reactions(reaction.clone(), skipped);

        // Add new deps to the reaction
        for dep in &new_deps {
            reaction.add_dep(dep.clone());
            dep.add_reaction(Rc::downgrade(&reaction));
        }
    });
}

// =============================================================================
// TESTS
// =============================================================================
