// ============================================================================
// quartz-signals - ReactiveList<T>
// Per-index reactivity over a plain Vec, with a shareable handle
// ============================================================================

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::core::context::with_context;
use crate::core::types::{AnySource, SourceInner};
use crate::proxy::reactive::Reactive;
use crate::reactivity::batching::untrack;
use crate::reactivity::tracking::{notify_write, track_read};

// =============================================================================
// REACTIVE LIST
// =============================================================================

/// A deeply reactive wrapper around a plain `Vec<T>`.
///
/// Three levels of granularity:
/// 1. Per-index signals - reading an index only tracks that index.
/// 2. A length signal - tracks push/pop/set-past-the-end/truncate.
/// 3. A structural version signal - tracks any change at all, for `iter()`.
///
/// `ReactiveList<T>` is a cheap `Clone`-able handle (an `Rc` to shared
/// interior state) rather than an owned collection, so it can be stored in
/// multiple places the way a JavaScript reactive array can be held by
/// multiple consumers.
///
/// Internally the backing storage is `Vec<Option<T>>`, not `Vec<T>`:
/// `None` is the "uninitialized" sentinel for a deleted or never-written
/// index, distinct from any legitimate value of `T`, so a hole can be
/// observed (and later refilled) without shifting every other index down.
///
/// # Example
///
/// ```
/// use quartz_signals::reactive_list;
///
/// let list = reactive_list(vec![1, 2, 3]);
///
/// assert_eq!(list.get(0, |v| *v), Some(1));
///
/// list.push(4);
/// assert_eq!(list.len(), 4);
///
/// // Writing past the end grows the list.
/// list.set(9, 100);
/// assert_eq!(list.len(), 10);
/// assert_eq!(list.get(5, |v| *v), None); // hole, not an error
/// ```
pub struct ReactiveList<T> {
    data: Rc<RefCell<Vec<Option<T>>>>,
    index_signals: Rc<RefCell<HashMap<usize, Rc<SourceInner<u32>>>>>,
    version: Rc<SourceInner<u64>>,
    length: Rc<SourceInner<usize>>,
    /// Lazily-created child wrappers for indices holding an eligible nested
    /// value, keyed by index alongside the index-signal version they were
    /// built from.
    nested: Rc<RefCell<HashMap<usize, (u32, Rc<dyn Any>)>>>,
}

impl<T> Clone for ReactiveList<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            index_signals: self.index_signals.clone(),
            version: self.version.clone(),
            length: self.length.clone(),
            nested: self.nested.clone(),
        }
    }
}

impl<T> ReactiveList<T> {
    /// Wrap a plain `Vec<T>`, enabling per-index tracking.
    ///
    /// Like `Reactive::new`, construction runs untracked so that building
    /// the wrapper never attaches a dependency to whatever reaction happens
    /// to be active at the call site.
    pub fn new(values: Vec<T>) -> Self {
        untrack(|| {
            let data: Vec<Option<T>> = values.into_iter().map(Some).collect();
            let len = data.len();
            Self {
                data: Rc::new(RefCell::new(data)),
                index_signals: Rc::new(RefCell::new(HashMap::new())),
                version: Rc::new(SourceInner::new(0)),
                length: Rc::new(SourceInner::new(len)),
                nested: Rc::new(RefCell::new(HashMap::new())),
            }
        })
    }

    fn index_signal(&self, index: usize) -> Rc<SourceInner<u32>> {
        if let Some(sig) = self.index_signals.borrow().get(&index) {
            return sig.clone();
        }

        let sig = Rc::new(SourceInner::new(0));
        self.index_signals.borrow_mut().insert(index, sig.clone());
        sig
    }

    fn bump_u32(sig: &Rc<SourceInner<u32>>) {
        let next = sig.get().wrapping_add(1);
        sig.set(next);
        with_context(|ctx| {
            let wv = ctx.increment_write_version();
            sig.set_write_version(wv);
        });
        notify_write(sig.clone() as Rc<dyn AnySource>);
    }

    fn bump_u64(sig: &Rc<SourceInner<u64>>) {
        let next = sig.get().wrapping_add(1);
        sig.set(next);
        with_context(|ctx| {
            let wv = ctx.increment_write_version();
            sig.set_write_version(wv);
        });
        notify_write(sig.clone() as Rc<dyn AnySource>);
    }

    fn set_length(&self, new_len: usize) {
        self.length.set(new_len);
        with_context(|ctx| {
            let wv = ctx.increment_write_version();
            self.length.set_write_version(wv);
        });
        notify_write(self.length.clone() as Rc<dyn AnySource>);
    }

    /// Number of elements (including holes). Tracks the length signal.
    pub fn len(&self) -> usize {
        track_read(self.length.clone() as Rc<dyn AnySource>);
        self.data.borrow().len()
    }

    /// Returns true if the list contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the element at `index` through `f`, tracking that index.
    ///
    /// Returns `None` both when `index` is past the end and when it names a
    /// deleted/never-written hole within bounds - either way there is
    /// nothing there to read. Reading past the end tracks the length signal
    /// instead of an index signal, so an effect that speculatively reads
    /// past the end re-runs once the list grows far enough to cover it.
    pub fn get<R>(&self, index: usize, f: impl FnOnce(&T) -> R) -> Option<R> {
        let len = self.data.borrow().len();
        if index < len {
            track_read(self.index_signal(index) as Rc<dyn AnySource>);
            self.data.borrow()[index].as_ref().map(f)
        } else {
            track_read(self.length.clone() as Rc<dyn AnySource>);
            None
        }
    }

    /// Replace the element at `index`, notifying that index's subscribers.
    ///
    /// If `index` is beyond the current length, the list grows to
    /// `index + 1`, filling the gap with holes, and the length and
    /// structural-version signals are notified as well.
    pub fn set(&self, index: usize, value: T) -> Option<T> {
        let grew = {
            let len = self.data.borrow().len();
            index >= len
        };

        let old = {
            let mut data = self.data.borrow_mut();
            if grew {
                data.resize_with(index + 1, || None);
            }
            std::mem::replace(&mut data[index], Some(value))
        };

        Self::bump_u32(&self.index_signal(index));
        if grew {
            self.set_length(index + 1);
            Self::bump_u64(&self.version);
        }

        old
    }

    /// Mutate the element at `index` in place via `mutate`, notifying that
    /// index's subscribers.
    ///
    /// Panics if `index` is out of bounds or names a hole; use [`ReactiveList::set`]
    /// to write into a hole or grow the list.
    pub fn with_index(&self, index: usize, mutate: impl FnOnce(&mut T)) {
        {
            let mut data = self.data.borrow_mut();
            let slot = data
                .get_mut(index)
                .and_then(|slot| slot.as_mut())
                .unwrap_or_else(|| panic!("with_index: no element at index {index}"));
            mutate(slot);
        }
        Self::bump_u32(&self.index_signal(index));
    }

    /// Append an element, notifying its new index, the length signal, and
    /// the structural version signal.
    pub fn push(&self, value: T) {
        let new_len = {
            let mut data = self.data.borrow_mut();
            data.push(Some(value));
            data.len()
        };
        Self::bump_u32(&self.index_signal(new_len - 1));
        self.set_length(new_len);
        Self::bump_u64(&self.version);
    }

    /// Remove and return the last element, or `None` if the list is empty.
    ///
    /// Unlike [`ReactiveList::remove`], this physically shrinks the list
    /// (the same shrink `truncate` performs for a single element) rather
    /// than leaving a hole in place.
    pub fn pop(&self) -> Option<T> {
        let (value, new_len) = {
            let mut data = self.data.borrow_mut();
            let value = data.pop().flatten();
            (value, data.len())
        };

        if let Some(sig) = self.index_signals.borrow_mut().remove(&new_len) {
            Self::bump_u32(&sig);
        }
        self.nested.borrow_mut().remove(&new_len);
        self.set_length(new_len);
        Self::bump_u64(&self.version);

        value
    }

    /// Mark the element at `index` as deleted, leaving a hole behind
    /// without shrinking the list or shifting later indices.
    ///
    /// Returns the value that was there, or `None` if `index` was already a
    /// hole or out of bounds. Bumps that index's signal (so readers of the
    /// now-empty slot re-run) and the structural-version signal (so `iter()`
    /// consumers see the key disappear).
    pub fn remove(&self, index: usize) -> Option<T> {
        let old = {
            let mut data = self.data.borrow_mut();
            data.get_mut(index).and_then(std::mem::take)
        };

        if old.is_some() {
            Self::bump_u32(&self.index_signal(index));
            self.nested.borrow_mut().remove(&index);
            Self::bump_u64(&self.version);
        }

        old
    }

    /// Shrink the list to `new_len` elements, discarding everything past
    /// that point.
    ///
    /// Every discarded index's signal is bumped (so a reader left holding
    /// one sees the now-missing slot) and then dropped from the index-signal
    /// table, along with the length and structural-version signals. Does
    /// nothing if `new_len` is not shorter than the current length.
    pub fn truncate(&self, new_len: usize) {
        let removed_indices: Vec<usize> = {
            let data = self.data.borrow();
            if new_len >= data.len() {
                return;
            }
            (new_len..data.len()).collect()
        };

        self.data.borrow_mut().truncate(new_len);

        for idx in removed_indices {
            if let Some(sig) = self.index_signals.borrow_mut().remove(&idx) {
                Self::bump_u32(&sig);
            }
            self.nested.borrow_mut().remove(&idx);
        }

        self.set_length(new_len);
        Self::bump_u64(&self.version);
    }

    /// Read the element at `index` as an eligible nested value, returning a
    /// child `Reactive` over it instead of the plain value.
    ///
    /// Returns `None` if `index` is out of bounds or a hole. Mirrors
    /// [`Reactive::nested_field`]: the child is cached against this index's
    /// signal version, and a later write through [`ReactiveList::set`] or
    /// [`ReactiveList::with_index`] invalidates the cache so the next read
    /// rebuilds it from the fresh value.
    pub fn nested_index<C: 'static>(
        &self,
        index: usize,
        extract: impl FnOnce(&T) -> C,
    ) -> Option<Reactive<C>> {
        let sig = self.index_signal(index);
        track_read(sig.clone() as Rc<dyn AnySource>);
        let current_version = sig.get();

        if let Some((cached_version, cached)) = self.nested.borrow().get(&index) {
            if *cached_version == current_version {
                return Some(
                    cached
                        .clone()
                        .downcast::<Reactive<C>>()
                        .unwrap_or_else(|_| {
                            panic!("nested_index: index {index} read as a different type than before")
                        })
                        .as_ref()
                        .clone(),
                );
            }
        }

        let child = {
            let data = self.data.borrow();
            let value = data.get(index)?.as_ref()?;
            untrack(|| Reactive::new(extract(value)))
        };
        self.nested
            .borrow_mut()
            .insert(index, (current_version, Rc::new(child.clone())));
        Some(child)
    }

    /// Run `f` over a cloned snapshot of every present (non-hole) element.
    ///
    /// Tracks the structural version signal rather than each index
    /// individually, since any element appearing or disappearing should
    /// re-run an effect built on iteration.
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        track_read(self.version.clone() as Rc<dyn AnySource>);
        for item in self.data.borrow().iter().flatten() {
            f(item);
        }
    }

    /// Unwrap back to a plain `Vec<Option<T>>`, discarding reactivity.
    ///
    /// Holes are preserved as `None` rather than silently compacted away.
    pub fn into_inner(self) -> Vec<Option<T>> {
        untrack(|| {
            drop(self.index_signals);
            drop(self.version);
            drop(self.length);
            drop(self.nested);
            Rc::try_unwrap(self.data)
                .unwrap_or_else(|_| panic!("into_inner: ReactiveList has other live handles"))
                .into_inner()
        })
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReactiveList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveList")
            .field("data", &*self.data.borrow())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
