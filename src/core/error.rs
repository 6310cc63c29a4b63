// ============================================================================
// quartz-signals - Error taxonomy
// ============================================================================
//
// The engine's public error surface. Four kinds, matching the contract:
// a write rejected because a derived is mid-computation, the update-depth
// cap tripping in flush_sync or an effect's self-invalidation loop, access
// through a disposed handle, and a helper asked to bind to something it
// can't represent.
// ============================================================================

use thiserror::Error;

/// Errors the reactive engine can report to a caller.
///
/// Internal invariant violations that indicate a bug in the engine itself
/// (not a caller mistake) still panic, as they do in the upstream
/// implementation this crate follows; this enum covers only the four
/// documented, recoverable error kinds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReactiveError {
    /// A write was attempted while a derived was computing. The derived's
    /// compute function must be pure; rejecting the write keeps it from
    /// observing a partial mutation of its own dependencies.
    #[error("cannot write to a source while a derived is computing; deriveds must be pure")]
    WriteInsideDerived,

    /// `flush_sync` (or an effect's self-invalidation retry) reached its
    /// iteration cap without reaching a fixed point.
    #[error("maximum update depth exceeded after {iterations} iterations; check for effects or deriveds that continuously invalidate themselves")]
    MaxUpdateDepthExceeded {
        /// Number of iterations attempted before the cap tripped.
        iterations: u32,
    },

    /// A read or write was attempted through a handle whose effect has
    /// already been disposed.
    #[error("attempted access through a disposed effect")]
    DisposedAccess,

    /// A binding helper was asked to bind to a value that is neither a
    /// primitive, a signal/derived, a callable, nor a supported compound.
    #[error("invalid source binding: {reason}")]
    InvalidSourceBinding {
        /// Human-readable description of why the binding was rejected.
        reason: String,
    },
}
