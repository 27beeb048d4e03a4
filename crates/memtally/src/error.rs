use std::collections::TryReserveError;

/// Why a tracked operation did not produce a block.
///
/// Whatever the variant, the registry and the usage counters are exactly as they were
/// before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackError {
    /// The underlying allocator returned null.
    #[error("allocator could not provide {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("block size overflows usize: {count} x {size} bytes")]
    SizeOverflow { count: usize, size: usize },

    /// The tracker could not grow its own bookkeeping storage. Checked before the
    /// underlying allocator is called, so no untracked block is left behind.
    #[error("tracker bookkeeping storage unavailable: {0}")]
    RegistryStorage(#[from] TryReserveError),
}

pub(crate) fn array_size(count: usize, size: usize) -> Result<usize, TrackError> {
    count
        .checked_mul(size)
        .ok_or(TrackError::SizeOverflow { count, size })
}
