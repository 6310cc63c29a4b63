// ============================================================================
// quartz-signals - Primitives Module
// Core reactive primitives: signal, derived, effect, scope, selector
// ============================================================================

pub mod derived;
pub mod effect;
pub mod scope;
pub mod selector;
pub mod signal;

// Re-export for convenience
pub use derived::{derived, derived_with_equals, Derived, DerivedInner};
pub use effect::{
    destroy_effect, update_effect, CleanupFn, DisposeFn, Effect, EffectFn, EffectInner,
};
pub use scope::{
    effect_scope, get_current_scope, on_scope_dispose, register_effect_with_scope, EffectScope,
    ScopeCleanupFn,
};
pub use signal::{signal, signal_with_equals, source, Signal, SourceOptions};
