//! Configuration structures for BasaltDB.

use crate::error::{BasaltError, Result};
use serde::{Deserialize, Serialize};

/// Buffer management configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Number of frames tracked by the replacer.
    pub frame_count: usize,
    /// History horizon K for the LRU-K replacement policy.
    pub replacer_k: usize,
    /// Entry capacity of each page table bucket.
    pub bucket_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            frame_count: 8192,
            replacer_k: 2,
            bucket_size: 8,
        }
    }
}

impl BufferConfig {
    /// Validates the configuration. Every field must be at least 1.
    pub fn validate(&self) -> Result<()> {
        if self.frame_count == 0 {
            return Err(invalid("frame_count", self.frame_count));
        }
        if self.replacer_k == 0 {
            return Err(invalid("replacer_k", self.replacer_k));
        }
        if self.bucket_size == 0 {
            return Err(invalid("bucket_size", self.bucket_size));
        }
        Ok(())
    }
}

fn invalid(name: &str, value: usize) -> BasaltError {
    BasaltError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    }
}
