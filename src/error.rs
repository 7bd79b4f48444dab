use std::fmt;

/// Error kinds a fallible `World` operation can return.
///
/// Stale-handle lookups are deliberately NOT represented here: they return
/// `None`/`false` sentinels at the call site instead of propagating an
/// error, so a stale lookup is always a no-op returning a documented
/// sentinel rather than an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsError {
    /// A handle referred to a generation that no longer exists. Reserved for
    /// call sites that must distinguish "stale" from other failures instead
    /// of silently returning a sentinel.
    Stale,
    /// A caller-supplied argument violated a documented precondition
    /// (negative mass, non-finite transform, shape with zero vertices, ...).
    InvalidArgument(&'static str),
    /// The world is mid-`step` and a topology mutation or nested `step` was
    /// attempted from another thread or from a callback.
    Locked,
    /// The world's internal state failed an invariant check it cannot
    /// recover from (arena/solver-set bookkeeping desync). Every subsequent
    /// call fails with `Corrupt` until the world is dropped.
    Corrupt,
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicsError::Stale => write!(f, "handle refers to a freed or stale entity"),
            PhysicsError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            PhysicsError::Locked => write!(f, "world is locked (re-entrant step or mutation)"),
            PhysicsError::Corrupt => write!(f, "world state is corrupt"),
        }
    }
}

impl std::error::Error for PhysicsError {}

pub type PhysicsResult<T> = Result<T, PhysicsError>;
