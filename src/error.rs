//! Error types and error handling strategy for Filament.
//!
//! Errors in this crate are explicit and typed. Every fallible operation
//! reports the name of the operation that raised the error together with a
//! short human-readable message, and every [`ErrorKind`] is classified into
//! an [`ErrorCategory`]:
//!
//! - **Protocol violation**: calling an operation a second time where only
//!   one call is allowed (completing a completed state, closing a closed
//!   channel, retrieving an already-retrieved result). Always fatal to the
//!   call and surfaced to the immediate caller.
//! - **Precondition**: invoking an elasticity operation on a pool that does
//!   not support the required scheduling mode, or from a context where the
//!   operation cannot make progress. Surfaced synchronously to
//!   callback-style callers and as a failed [`AsyncResult`] to
//!   awaitable-style callers.
//! - **Bounds**: a join threshold exceeding the available input count, or an
//!   unknown processing-unit index. Surfaced immediately, no partial side
//!   effects.
//! - **Config**: an unparseable environment override.
//!
//! Channel backpressure (full/empty/closed on push and pop) is an expected,
//! frequent condition and is *not* modeled as an [`Error`]; see
//! [`sync::channel`](crate::sync::channel).
//!
//! [`AsyncResult`]: crate::completion::AsyncResult

use thiserror::Error as ThisError;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Protocol violations ===
    /// A completion state was completed a second time.
    AlreadyCompleted,
    /// A result payload was retrieved a second time.
    ResultRetrieved,
    /// A channel was closed a second time.
    ChannelAlreadyClosed,

    // === Preconditions ===
    /// The pool does not have the elasticity scheduling mode enabled.
    ElasticityDisabled,
    /// A unit tried to suspend itself on a pool without work stealing.
    StealingDisabled,
    /// A pool was asked to suspend itself from one of its own tasks.
    PoolSelfSuspend,
    /// An awaitable operation was invoked from outside the runtime.
    OutsideRuntime,

    // === Bounds ===
    /// A join threshold exceeded the number of supplied results.
    ThresholdOutOfBounds,
    /// A processing-unit index is out of range for its pool.
    UnknownUnit,

    // === Config ===
    /// An environment override contained an unparseable value.
    InvalidConfigValue,

    // === Internal / task outcomes ===
    /// A task panicked while computing its result.
    TaskPanicked,
    /// A promise was dropped without completing its state.
    BrokenPromise,
    /// The OS refused to spawn a worker or callback thread.
    ThreadSpawnFailed,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::AlreadyCompleted | Self::ResultRetrieved | Self::ChannelAlreadyClosed => {
                ErrorCategory::ProtocolViolation
            }
            Self::ElasticityDisabled
            | Self::StealingDisabled
            | Self::PoolSelfSuspend
            | Self::OutsideRuntime => ErrorCategory::Precondition,
            Self::ThresholdOutOfBounds | Self::UnknownUnit => ErrorCategory::Bounds,
            Self::InvalidConfigValue => ErrorCategory::Config,
            Self::TaskPanicked | Self::BrokenPromise | Self::ThreadSpawnFailed => {
                ErrorCategory::Internal
            }
        }
    }
}

/// Coarse classification of an [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A one-shot contract was violated by a repeated call.
    ProtocolViolation,
    /// A required mode or calling-context precondition was not met.
    Precondition,
    /// An index or threshold was out of range.
    Bounds,
    /// A configuration value could not be interpreted.
    Config,
    /// Task failure or OS-level resource exhaustion.
    Internal,
}

/// The error type used throughout Filament.
///
/// Carries the kind, the fully-qualified name of the operation that raised
/// it, and a message. Errors are cheap to clone so that a single failure can
/// be observed through several result handles.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("{op}: {message}")]
pub struct Error {
    kind: ErrorKind,
    op: &'static str,
    message: String,
}

impl Error {
    /// Creates a new error.
    #[must_use]
    pub fn new(kind: ErrorKind, op: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            op,
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the category of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the name of the operation that raised this error.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.op
    }

    /// Converts a caught panic payload into a task error.
    pub(crate) fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&'static str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "task panicked with a non-string payload".to_string());
        Self::new(ErrorKind::TaskPanicked, "filament::task", message)
    }
}

/// Result alias using the crate [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
