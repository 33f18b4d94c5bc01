//! Frame handles for the buffer pool.

/// Unique identifier for a frame in the buffer pool.
///
/// Frames hold page data owned by the outer buffer manager; the replacer
/// and page table only deal in these handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_display() {
        let frame_id = FrameId(42);
        assert_eq!(frame_id.to_string(), "frame:42");
    }

    #[test]
    fn test_frame_id_hash_and_eq() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(FrameId(1));
        set.insert(FrameId(1));
        set.insert(FrameId(2));

        assert_eq!(set.len(), 2);
    }
}
