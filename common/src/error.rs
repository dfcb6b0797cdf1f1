//! Error types for the buffer-pool-manager layer.

use thiserror::Error;

/// A specialized error type for buffer pool manager operations.
#[derive(Debug, Error)]
pub enum BpmError {
    /// Returned when the pool is full (every frame is pinned) and nothing can be evicted.
    #[error("no free frames available in the buffer pool")]
    NoFreeFrames,
    /// An I/O error from the underlying disk manager.
    #[error("disk I/O error: {0}")]
    Io(#[from] std::io::Error),
}
