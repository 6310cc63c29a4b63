// ============================================================================
// quartz-signals - Reactive<T>
// Per-field reactivity over a plain struct value
// ============================================================================

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::core::context::with_context;
use crate::core::types::{AnySource, SourceInner};
use crate::reactivity::batching::untrack;
use crate::reactivity::tracking::{notify_write, track_read};

// =============================================================================
// REACTIVE<T>
// =============================================================================

/// A deeply reactive wrapper around a plain value.
///
/// `Reactive<T>` does not intercept field access the way a JavaScript Proxy
/// does - Rust has no operator overloading for `.field` - so reads and
/// writes go through explicit accessor methods instead. Each field name gets
/// its own lazily created "bump" signal the first time it is read, and a
/// structural version signal tracks the object as a whole, for code that
/// wants to react to "anything about this object changed" without naming a
/// field. A field holding an eligible nested value can be read through
/// [`Reactive::nested_field`] instead, which returns a child `Reactive` over
/// just that value rather than the plain leaf.
///
/// # Example
///
/// ```
/// use quartz_signals::reactive;
///
/// struct Point { x: i32, y: i32 }
///
/// let p = reactive(Point { x: 0, y: 0 });
///
/// assert_eq!(p.get_field("x", |p| p.x), 0);
///
/// p.set_field("x", |p| p.x = 10);
/// assert_eq!(p.get_field("x", |p| p.x), 10);
/// ```
pub struct Reactive<T> {
    value: Rc<RefCell<T>>,
    field_signals: Rc<RefCell<HashMap<&'static str, Rc<SourceInner<u32>>>>>,
    version: Rc<SourceInner<u64>>,
    /// Lazily-created child wrappers for fields that hold an eligible nested
    /// value, keyed by field name alongside the field-signal version they
    /// were built from so a later field write invalidates the cached child.
    nested: Rc<RefCell<HashMap<&'static str, (u32, Rc<dyn Any>)>>>,
}

impl<T> Clone for Reactive<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            field_signals: self.field_signals.clone(),
            version: self.version.clone(),
            nested: self.nested.clone(),
        }
    }
}

impl<T> Reactive<T> {
    /// Wrap a value, making its fields individually trackable.
    ///
    /// Construction itself happens untracked: building the wrapper and its
    /// (initially empty) field-signal table must not register a dependency
    /// on whatever reaction happens to be running when `reactive()` is
    /// called, the same "parent-context trick" `untrack` uses elsewhere to
    /// swap the active-reaction context out for the duration of a block.
    pub fn new(value: T) -> Self {
        untrack(|| Self {
            value: Rc::new(RefCell::new(value)),
            field_signals: Rc::new(RefCell::new(HashMap::new())),
            version: Rc::new(SourceInner::new(0)),
            nested: Rc::new(RefCell::new(HashMap::new())),
        })
    }

    /// Get or lazily create the bump signal for a field name.
    fn field_signal(&self, name: &'static str) -> Rc<SourceInner<u32>> {
        if let Some(sig) = self.field_signals.borrow().get(name) {
            return sig.clone();
        }

        let sig = Rc::new(SourceInner::new(0));
        self.field_signals.borrow_mut().insert(name, sig.clone());
        sig
    }

    fn bump(sig: &Rc<SourceInner<u32>>) {
        let next = sig.get().wrapping_add(1);
        sig.set(next);
        with_context(|ctx| {
            let wv = ctx.increment_write_version();
            sig.set_write_version(wv);
        });
        notify_write(sig.clone() as Rc<dyn AnySource>);
    }

    /// Read a field, tracking it as a dependency.
    ///
    /// `f` runs under a shared borrow of the wrapped value; use
    /// [`Reactive::get_field`] instead if you just want a cloned value out.
    pub fn with_field<R>(&self, name: &'static str, f: impl FnOnce(&T) -> R) -> R {
        track_read(self.field_signal(name) as Rc<dyn AnySource>);
        f(&self.value.borrow())
    }

    /// Read and clone a field, tracking it as a dependency.
    pub fn get_field<R>(&self, name: &'static str, f: impl Fn(&T) -> R) -> R {
        self.with_field(name, |v| f(v))
    }

    /// Mutate the wrapped value through `mutate`, then notify the named
    /// field's subscribers and bump the structural version.
    ///
    /// There is no generic way to tell whether an arbitrary field actually
    /// changed without requiring `T: PartialEq` down to the leaf, so this
    /// always notifies - the same always-notify semantics
    /// `mutable_source()` uses for values that don't make equality-checked
    /// updates worthwhile.
    pub fn set_field(&self, name: &'static str, mutate: impl FnOnce(&mut T)) {
        mutate(&mut self.value.borrow_mut());
        Self::bump(&self.field_signal(name));
        Self::bump(&self.version);
    }

    /// Track the structural version signal without reading any field.
    ///
    /// Useful for effects that want to re-run on any mutation of the
    /// wrapped object, regardless of which field changed.
    pub fn track_any_change(&self) {
        track_read(self.version.clone() as Rc<dyn AnySource>);
    }

    /// Read a field that itself holds an eligible nested value, returning a
    /// child `Reactive` over it instead of the plain value.
    ///
    /// `extract` is only called to build (or rebuild) the child; once built,
    /// the child is cached against this field's signal version, so repeated
    /// reads of an unchanged nested field return the very same child wrapper
    /// - and so the same per-field sources underneath it - rather than a
    /// fresh one every time. The cache entry is invalidated the moment
    /// [`Reactive::set_field`] bumps this field again, so the next read
    /// rebuilds a child that reflects the new value.
    ///
    /// Building the child itself runs untracked, the same parent-context
    /// trick `Reactive::new` uses, so construction never pollutes the
    /// caller's dependency set - only the read that follows does.
    pub fn nested_field<C: 'static>(
        &self,
        name: &'static str,
        extract: impl FnOnce(&T) -> C,
    ) -> Reactive<C> {
        let sig = self.field_signal(name);
        track_read(sig.clone() as Rc<dyn AnySource>);
        let current_version = sig.get();

        if let Some((cached_version, cached)) = self.nested.borrow().get(name) {
            if *cached_version == current_version {
                return cached
                    .clone()
                    .downcast::<Reactive<C>>()
                    .unwrap_or_else(|_| {
                        panic!("nested_field: field `{name}` read as a different type than before")
                    })
                    .as_ref()
                    .clone();
            }
        }

        let child = untrack(|| Reactive::new(extract(&self.value.borrow())));
        self.nested
            .borrow_mut()
            .insert(name, (current_version, Rc::new(child.clone())));
        child
    }

    /// Unwrap back to the plain value, discarding reactivity.
    ///
    /// Equivalent to the TypeScript `toRaw()` helper. Fails to compile
    /// unless the wrapper is uniquely held, so callers can't silently drop
    /// a clone's worth of subscribers.
    pub fn into_inner(self) -> T {
        untrack(|| {
            drop(self.field_signals);
            drop(self.version);
            drop(self.nested);
            Rc::try_unwrap(self.value)
                .unwrap_or_else(|_| panic!("into_inner: Reactive value has other live handles"))
                .into_inner()
        })
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Reactive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactive")
            .field("value", &*self.value.borrow())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
