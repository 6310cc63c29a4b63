// ============================================================================
// quartz-signals - createSelector (Solid's O(n)->O(2) optimization)
//
// For list selection patterns, instead of O(n) effects re-running on every
// selection change, only the previous and current selected items' effects
// run = O(2).
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::core::constants::{DESTROYED, DIRTY};
use crate::core::context::with_context;
use crate::core::error::ReactiveError;
use crate::core::types::AnyReaction;
use crate::primitives::effect::effect_sync;
use crate::reactivity::tracking::set_signal_status;

// =============================================================================
// SELECTOR
// =============================================================================

/// A selector for efficient list selection tracking.
///
/// When used in effects, only effects whose selection status changed will re-run,
/// turning O(n) updates into O(2) updates.
pub struct Selector<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Clone + Eq + Hash + 'static,
{
    /// Current selection value
    current_value: Rc<RefCell<Option<T>>>,

    /// Has the selector been initialized
    initialized: Rc<Cell<bool>>,

    /// Map of keys to their subscribed reactions
    subscribers: Rc<RefCell<HashMap<K, HashSet<SubscriberEntry>>>>,

    /// The comparison function
    compare: Rc<dyn Fn(&K, &T) -> bool>,

    /// Dispose function for the internal effect (stored as boxed closure)
    /// We use RefCell<Option<...>> so we can take it once for disposal
    _dispose: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

impl<T, K> Drop for Selector<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Clone + Eq + Hash + 'static,
{
    fn drop(&mut self) {
        // Dispose the internal effect only if this is the last reference
        if Rc::strong_count(&self._dispose) == 1 {
            if let Some(dispose) = self._dispose.borrow_mut().take() {
                dispose();
            }
        }
    }
}

/// Entry for a subscriber reaction
#[derive(Clone)]
struct SubscriberEntry {
    reaction: Weak<dyn AnyReaction>,
}

impl PartialEq for SubscriberEntry {
    fn eq(&self, other: &Self) -> bool {
        // Compare by pointer without upgrading
        Weak::ptr_eq(&self.reaction, &other.reaction)
    }
}

impl Eq for SubscriberEntry {}

impl std::hash::Hash for SubscriberEntry {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Hash by the weak pointer's data address
        self.reaction.as_ptr().hash(state);
    }
}

impl<T, K> Selector<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Clone + Eq + Hash + 'static,
{
    /// Check if a key is currently selected.
    ///
    /// When called inside a reactive context (effect/derived), this subscribes
    /// the current reaction to changes for this specific key only.
    pub fn is_selected(&self, key: &K) -> bool {
        // Get current value
        let current = self.current_value.borrow();
        let result = if let Some(ref val) = *current {
            (self.compare)(key, val)
        } else {
            false
        };

        // Subscribe this key if we're in a reactive context
        with_context(|ctx| {
            if let Some(weak_reaction) = ctx.get_active_reaction() {
                if let Some(reaction) = weak_reaction.upgrade() {
                    // Skip if destroyed
                    if (reaction.flags() & DESTROYED) == 0 {
                        let mut subscribers = self.subscribers.borrow_mut();
                        let key_subscribers = subscribers.entry(key.clone()).or_default();
                        key_subscribers.insert(SubscriberEntry {
                            reaction: Rc::downgrade(&reaction),
                        });
                    }
                }
            }
        });

        result
    }
}

impl<T, K> Clone for Selector<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Clone + Eq + Hash + 'static,
{
    fn clone(&self) -> Self {
        Self {
            current_value: self.current_value.clone(),
            initialized: self.initialized.clone(),
            subscribers: self.subscribers.clone(),
            compare: self.compare.clone(),
            // Clones share the dispose - it will only be called once
            _dispose: self._dispose.clone(),
        }
    }
}

// =============================================================================
// CREATE SELECTOR
// =============================================================================

/// Create a selector function for efficient list selection tracking.
///
/// Instead of each list item effect depending on the full selection state,
/// only items whose selection status changed will re-run.
///
/// This turns O(n) updates into O(2) updates: only the previously selected
/// and newly selected items' effects run.
///
/// # Arguments
///
/// * `source` - Function returning the current selection value
/// * `compare` - Optional comparison function (defaults to equality)
///
/// # Example
///
/// ```
/// use quartz_signals::{signal, create_selector, effect_sync};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let selected_id = signal(1);
/// let is_selected = create_selector(
///     {
///         let selected_id = selected_id.clone();
///         move || selected_id.get()
///     },
///     None::<fn(&i32, &i32) -> bool>,
/// ).expect("key and value are both i32, no comparator needed");
///
/// // Track effect runs for item 1
/// let item1_runs = Rc::new(Cell::new(0));
/// let item1_runs_clone = item1_runs.clone();
/// let selector1 = is_selected.clone();
///
/// let _e1 = effect_sync(move || {
///     let _ = selector1.is_selected(&1);
///     item1_runs_clone.set(item1_runs_clone.get() + 1);
/// });
///
/// // Track effect runs for item 2
/// let item2_runs = Rc::new(Cell::new(0));
/// let item2_runs_clone = item2_runs.clone();
/// let selector2 = is_selected.clone();
///
/// let _e2 = effect_sync(move || {
///     let _ = selector2.is_selected(&2);
///     item2_runs_clone.set(item2_runs_clone.get() + 1);
/// });
///
/// // Initial run
/// assert_eq!(item1_runs.get(), 1);
/// assert_eq!(item2_runs.get(), 1);
///
/// // Change selection from 1 to 2
/// selected_id.set(2);
///
/// // Both items' effects run (one became selected, one became unselected)
/// assert_eq!(item1_runs.get(), 2);
/// assert_eq!(item2_runs.get(), 2);
///
/// // Change selection from 2 to 3
/// selected_id.set(3);
///
/// // Only item 2's effect runs (became unselected)
/// // Item 1 and 3 don't run because their selection status didn't change
/// assert_eq!(item1_runs.get(), 2); // Still 2 (wasn't selected before, isn't now)
/// assert_eq!(item2_runs.get(), 3); // Was selected, now isn't
/// ```
pub fn create_selector<T, K, F, C>(
    source: F,
    compare: Option<C>,
) -> Result<Selector<T, K>, ReactiveError>
where
    T: Clone + PartialEq + 'static,
    K: Clone + Eq + Hash + 'static,
    F: Fn() -> T + 'static,
    C: Fn(&K, &T) -> bool + 'static,
{
    let current_value: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    let initialized = Rc::new(Cell::new(false));
    let subscribers: Rc<RefCell<HashMap<K, HashSet<SubscriberEntry>>>> =
        Rc::new(RefCell::new(HashMap::new()));

    // Default comparison: equality, only valid when K and T are the same type
    let compare: Rc<dyn Fn(&K, &T) -> bool> = match compare {
        Some(f) => Rc::new(f),
        None => {
            if std::any::TypeId::of::<K>() != std::any::TypeId::of::<T>() {
                return Err(ReactiveError::InvalidSourceBinding {
                    reason: "no comparator supplied and key type differs from value type"
                        .to_string(),
                });
            }
            Rc::new(|k: &K, v: &T| {
                let k_any: &dyn Any = k;
                k_any.downcast_ref::<T>() == Some(v)
            })
        }
    };

    // Clone for the effect
    let current_value_clone = current_value.clone();
    let initialized_clone = initialized.clone();
    let subscribers_clone = subscribers.clone();
    let compare_clone = compare.clone();

    // Internal effect to track source changes
    let dispose = effect_sync(move || {
        let value = source();

        #[cfg(test)]
        eprintln!("Selector internal effect running, initialized={}", initialized_clone.get());

        // Only notify if value actually changed and we're initialized
        let prev_value = current_value_clone.borrow().clone();
        if initialized_clone.get() {
            if prev_value.as_ref() != Some(&value) {
                // Find keys whose selection state changed
                let subscribers_snapshot: Vec<(K, HashSet<SubscriberEntry>)> = {
                    let subs = subscribers_clone.borrow();
                    subs.iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                };

                // Collect reactions that need to be marked dirty
                let mut dirty_reactions: Vec<Rc<dyn AnyReaction>> = Vec::new();

                #[cfg(test)]
                eprintln!(
                    "Selector: prev_value changed={}, checking {} keys",
                    prev_value.is_some(), subscribers_snapshot.len()
                );

                for (key, reactions) in subscribers_snapshot {
                    let was_selected = prev_value
                        .as_ref()
                        .map(|pv| (compare_clone)(&key, pv))
                        .unwrap_or(false);
                    let is_selected = (compare_clone)(&key, &value);

                    #[cfg(test)]
                    eprintln!(
                        "  Key: was_selected={}, is_selected={}, reactions={}",
                        was_selected, is_selected, reactions.len()
                    );

                    if was_selected != is_selected {
                        // Selection state changed - collect these reactions
                        let mut to_remove = Vec::new();

                        for entry in &reactions {
                            if let Some(reaction) = entry.reaction.upgrade() {
                                if (reaction.flags() & DESTROYED) != 0 {
                                    to_remove.push(entry.clone());
                                    continue;
                                }

                                dirty_reactions.push(reaction);
                            } else {
                                to_remove.push(entry.clone());
                            }
                        }

                        // Clean up destroyed/dropped reactions
                        if !to_remove.is_empty() {
                            let mut subs = subscribers_clone.borrow_mut();
                            // Check if the key still exists (it might have been removed via drop)
                            if let Some(key_subs) = subs.get_mut(&key) {
                                for entry in to_remove {
                                    key_subs.remove(&entry);
                                }
                                
                                // Cleanup empty sets to prevent memory leaks
                                if key_subs.is_empty() {
                                    subs.remove(&key);
                                }
                            }
                        }
                    }
                }

                // Mark all affected reactions as dirty and add to pending queue
                // Don't flush here - we're inside an effect. Let the outer flush loop
                // pick up the pending reactions (just like TypeScript's scheduleEffect)
                if !dirty_reactions.is_empty() {
                    with_context(|ctx| {
                        for reaction in &dirty_reactions {
                            set_signal_status(&**reaction, DIRTY);
                            ctx.add_pending_reaction(Rc::downgrade(reaction));
                        }
                    });
                }
            }
        }

        *current_value_clone.borrow_mut() = Some(value);
        initialized_clone.set(true);
    });

    Ok(Selector {
        current_value,
        initialized,
        subscribers,
        compare,
        _dispose: Rc::new(RefCell::new(Some(Box::new(dispose)))),
    })
}

/// Create a selector with default equality comparison.
///
/// This is a convenience wrapper for `create_selector` when keys and values
/// are the same type.
///
/// # Example
///
/// ```
/// use quartz_signals::{signal, create_selector_eq};
///
/// let selected = signal(1i32);
/// let is_selected = create_selector_eq({
///     let selected = selected.clone();
///     move || selected.get()
/// });
///
/// assert!(is_selected.is_selected(&1));
/// assert!(!is_selected.is_selected(&2));
///
/// selected.set(2);
/// assert!(!is_selected.is_selected(&1));
/// assert!(is_selected.is_selected(&2));
/// ```
pub fn create_selector_eq<T, F>(source: F) -> Selector<T, T>
where
    T: Clone + Eq + Hash + 'static,
    F: Fn() -> T + 'static,
{
    create_selector(source, Some(|k: &T, v: &T| k == v))
        .expect("an explicit comparator is always supplied, so this never fails")
}

// =============================================================================
// TESTS
// =============================================================================
