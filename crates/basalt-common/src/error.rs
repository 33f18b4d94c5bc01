//! Error types for BasaltDB.

use thiserror::Error;

/// Result type alias using BasaltError.
pub type Result<T> = std::result::Result<T, BasaltError>;

/// Errors that can occur in BasaltDB operations.
#[derive(Debug, Error)]
pub enum BasaltError {
    // Buffer management errors
    #[error("Frame id {frame_id} out of range (capacity {capacity})")]
    FrameOutOfRange { frame_id: u32, capacity: usize },

    #[error("Frame {frame_id} is not evictable")]
    FrameNotEvictable { frame_id: u32 },

    // Configuration errors
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },
}
