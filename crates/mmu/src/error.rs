//! Error types for mapping operations.

use core::fmt;

use crate::VirtualAddress;

/// Failure kinds reported by the mapping layer.
///
/// All failures are synchronous and none are retried internally; retry
/// policy (for example reclaiming memory after [`Error::OutOfMemory`])
/// belongs to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Misaligned address, bad size, or a flag combination the architecture
    /// cannot express.
    InvalidArgument,
    /// The frame allocator was exhausted while installing an intermediate
    /// table level.
    OutOfMemory,
    /// An existing entry is incompatible with the request: an occupied leaf,
    /// or a page-size mismatch along the walk.
    ConflictingMapping,
    /// This architecture has no page-table walker.
    Unsupported,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::InvalidArgument => "invalid address, size, or flag combination",
            Error::OutOfMemory => "frame allocator exhausted",
            Error::ConflictingMapping => "existing mapping conflicts with request",
            Error::Unsupported => "operation not supported on this architecture",
        };
        f.write_str(msg)
    }
}

/// Failure from a range operation.
///
/// Range operations are atomic per page, not per range: pages before
/// `stopped_at` were processed and remain in effect, pages from `stopped_at`
/// on were not touched. There is no automatic rollback; whether to unmap the
/// prefix is the caller's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeError {
    /// What went wrong.
    pub cause: Error,
    /// First address in the range that was not processed.
    pub stopped_at: VirtualAddress,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.cause, self.stopped_at)
    }
}
