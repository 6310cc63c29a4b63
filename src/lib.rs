// ============================================================================
// quartz-signals - A fine-grained reactive dependency-tracking engine
// ============================================================================

mod macros;
pub mod core;
pub mod primitives;
pub mod proxy;
pub mod reactivity;

// Re-export core items at crate root for ergonomic access
pub use core::constants;
pub use core::context::{
    is_batching, is_tracking, is_untracking, read_version, with_context, with_context_options,
    write_version, EngineOptions, ReactiveContext,
};
pub use core::error::ReactiveError;
pub use core::types::{default_equals, AnyReaction, AnySource, EqualsFn, SourceInner};

// Re-export primitives at crate root (TypeScript-like API)
pub use primitives::derived::{derived, derived_with_equals, Derived, DerivedInner};
pub use primitives::effect::{
    effect, effect_root, effect_sync, effect_sync_with_cleanup, effect_tracking,
    effect_with_cleanup, CleanupFn, DisposeFn, Effect, EffectFn, EffectInner,
};
pub use primitives::selector::{create_selector, create_selector_eq, Selector};
pub use primitives::scope::{
    effect_scope, get_current_scope, on_scope_dispose, EffectScope, ScopeCleanupFn,
};
pub use primitives::signal::{
    mutable_source, signal, signal_f32, signal_f64, signal_with_equals, source, Signal,
    SourceOptions,
};

// Re-export reactivity functions
pub use reactivity::batching::{batch, peek, tick, untrack};
pub use reactivity::equality::{
    always_equals, by_field, deep_equals, equals, never_equals, safe_equals_f32, safe_equals_f64,
    safe_equals_option_f64, safe_not_equal_f32, safe_not_equal_f64, shallow_equals_slice,
    shallow_equals_vec,
};
pub use reactivity::scheduling::{flush_sync, flush_sync_with};
pub use reactivity::tracking::{
    guard_write, is_dirty, mark_reactions, notify_write, remove_reactions, set_signal_status,
    track_read,
};

// Re-export the deep reactivity proxy
pub use proxy::{is_reactive, reactive, reactive_list, IsReactive, Reactive, ReactiveList};

// =============================================================================
// TESTS
// =============================================================================
