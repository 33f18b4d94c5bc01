//! Page replacement policies for the buffer pool.

use crate::frame::FrameId;
use basalt_common::{BasaltError, BufferConfig, Result};
use log::trace;
use parking_lot::Mutex;

/// Trait for page replacement algorithms.
pub trait Replacer: Send + Sync {
    /// Records that the given frame was accessed.
    fn record_access(&self, frame_id: FrameId) -> Result<()>;

    /// Marks a frame as evictable (unpinned) or not.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool) -> Result<()>;

    /// Selects a victim frame for eviction.
    ///
    /// Returns None if no frames are evictable.
    fn evict(&self) -> Option<FrameId>;

    /// Drops a frame from the replacer, clearing its access history.
    fn remove(&self, frame_id: FrameId) -> Result<()>;

    /// Returns the number of evictable frames.
    fn size(&self) -> usize;
}

/// Sentinel index terminating an intrusive queue link.
const NIL: usize = usize::MAX;

/// Which queue a frame currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Queue {
    /// Not tracked: the frame has no recorded accesses.
    None,
    /// Fewer than K accesses, ordered by first access.
    History,
    /// At least K accesses, ordered by most recent access.
    Cached,
}

/// Per-frame bookkeeping. Nodes live in a fixed arena indexed by frame
/// id; prev/next form the intrusive queue links.
#[derive(Debug, Clone, Copy)]
struct FrameNode {
    access_count: usize,
    evictable: bool,
    queue: Queue,
    prev: usize,
    next: usize,
}

impl FrameNode {
    const EMPTY: FrameNode = FrameNode {
        access_count: 0,
        evictable: false,
        queue: Queue::None,
        prev: NIL,
        next: NIL,
    };
}

/// Head and tail of one intrusive queue. The head holds the most recent
/// entry, the tail the least recent; eviction scans from the tail.
#[derive(Debug, Clone, Copy)]
struct QueueLinks {
    head: usize,
    tail: usize,
}

impl QueueLinks {
    const EMPTY: QueueLinks = QueueLinks {
        head: NIL,
        tail: NIL,
    };
}

#[derive(Debug)]
struct LruKInner {
    nodes: Vec<FrameNode>,
    history: QueueLinks,
    cached: QueueLinks,
    /// Count of frames currently marked evictable.
    curr_size: usize,
}

impl LruKInner {
    fn links(&self, queue: Queue) -> QueueLinks {
        match queue {
            Queue::History => self.history,
            Queue::Cached => self.cached,
            Queue::None => unreachable!("untracked frames have no queue links"),
        }
    }

    fn links_mut(&mut self, queue: Queue) -> &mut QueueLinks {
        match queue {
            Queue::History => &mut self.history,
            Queue::Cached => &mut self.cached,
            Queue::None => unreachable!("untracked frames have no queue links"),
        }
    }

    /// Inserts `idx` at the head of `queue`. The node must not currently
    /// be linked.
    fn push_front(&mut self, queue: Queue, idx: usize) {
        let head = self.links(queue).head;
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = head;
        self.nodes[idx].queue = queue;
        if head != NIL {
            self.nodes[head].prev = idx;
        } else {
            self.links_mut(queue).tail = idx;
        }
        self.links_mut(queue).head = idx;
    }

    /// Unlinks `idx` from whichever queue holds it. No-op for untracked
    /// frames.
    fn unlink(&mut self, idx: usize) {
        let node = self.nodes[idx];
        if node.queue == Queue::None {
            return;
        }
        if node.prev != NIL {
            self.nodes[node.prev].next = node.next;
        } else {
            self.links_mut(node.queue).head = node.next;
        }
        if node.next != NIL {
            self.nodes[node.next].prev = node.prev;
        } else {
            self.links_mut(node.queue).tail = node.prev;
        }
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
        self.nodes[idx].queue = Queue::None;
    }

    /// Walks `queue` from the least-recent end and returns the first
    /// evictable frame.
    fn find_victim(&self, queue: Queue) -> Option<usize> {
        let mut idx = self.links(queue).tail;
        while idx != NIL {
            if self.nodes[idx].evictable {
                return Some(idx);
            }
            idx = self.nodes[idx].prev;
        }
        None
    }

    /// Fully forgets a frame: unlinks it and clears all metadata.
    fn release(&mut self, idx: usize) {
        self.unlink(idx);
        self.nodes[idx] = FrameNode::EMPTY;
        self.curr_size -= 1;
    }
}

/// LRU-K replacement algorithm implementation.
///
/// Frames with fewer than K recorded accesses wait in a history queue
/// ordered by first access and are preferred as victims, oldest arrival
/// first. Frames that reach K accesses move to a second queue that is
/// refreshed on every later access and evicted LRU, so the victim there
/// is the frame whose most recent access lies furthest in the past.
#[derive(Debug)]
pub struct LruKReplacer {
    capacity: usize,
    k: usize,
    inner: Mutex<LruKInner>,
}

impl LruKReplacer {
    /// Creates a replacer tracking frame ids in `[0, capacity)` with
    /// history horizon `k`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` or `k` is zero.
    pub fn new(capacity: usize, k: usize) -> Self {
        assert!(capacity > 0, "replacer capacity must be positive");
        assert!(k > 0, "k must be at least 1");

        Self {
            capacity,
            k,
            inner: Mutex::new(LruKInner {
                nodes: vec![FrameNode::EMPTY; capacity],
                history: QueueLinks::EMPTY,
                cached: QueueLinks::EMPTY,
                curr_size: 0,
            }),
        }
    }

    /// Builds a replacer from a validated buffer configuration.
    pub fn from_config(config: &BufferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.frame_count, config.replacer_k))
    }

    /// Returns the maximum number of frames tracked.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the history horizon K.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    fn check_bounds(&self, frame_id: FrameId) -> Result<usize> {
        let idx = frame_id.0 as usize;
        if idx >= self.capacity {
            return Err(BasaltError::FrameOutOfRange {
                frame_id: frame_id.0,
                capacity: self.capacity,
            });
        }
        Ok(idx)
    }
}

impl Replacer for LruKReplacer {
    fn record_access(&self, frame_id: FrameId) -> Result<()> {
        let idx = self.check_bounds(frame_id)?;

        let mut inner = self.inner.lock();
        let count = inner.nodes[idx].access_count + 1;
        inner.nodes[idx].access_count = count;

        if count < self.k {
            // History order reflects first appearance, not latest access.
            if inner.nodes[idx].queue != Queue::History {
                inner.push_front(Queue::History, idx);
            }
        } else {
            // Crossing the K threshold leaves the history queue for good;
            // past it, each access refreshes the frame's position.
            inner.unlink(idx);
            inner.push_front(Queue::Cached, idx);
        }
        Ok(())
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) -> Result<()> {
        let idx = self.check_bounds(frame_id)?;

        let mut inner = self.inner.lock();
        if inner.nodes[idx].access_count == 0 {
            return Ok(());
        }
        match (inner.nodes[idx].evictable, evictable) {
            (false, true) => inner.curr_size += 1,
            (true, false) => inner.curr_size -= 1,
            _ => {}
        }
        inner.nodes[idx].evictable = evictable;
        Ok(())
    }

    fn evict(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock();
        if inner.curr_size == 0 {
            return None;
        }

        // Frames short of K accesses are preferred victims.
        let victim = inner
            .find_victim(Queue::History)
            .or_else(|| inner.find_victim(Queue::Cached))?;
        inner.release(victim);

        trace!("evicted frame {}", victim);
        Some(FrameId(victim as u32))
    }

    fn remove(&self, frame_id: FrameId) -> Result<()> {
        let idx = frame_id.0 as usize;

        let mut inner = self.inner.lock();
        if idx >= self.capacity || inner.nodes[idx].access_count == 0 {
            return Ok(());
        }
        if !inner.nodes[idx].evictable {
            return Err(BasaltError::FrameNotEvictable {
                frame_id: frame_id.0,
            });
        }
        inner.release(idx);
        Ok(())
    }

    fn size(&self) -> usize {
        self.inner.lock().curr_size
    }
}
