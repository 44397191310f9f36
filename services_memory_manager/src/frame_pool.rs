//! Free-frame pool
//!
//! Frames are handed out lowest id first, so a run with a fixed reference
//! string always produces the same frame assignments.

use core_types::FrameId;
use std::collections::BTreeSet;

/// The set of physical frames not owned by any page
#[derive(Debug, Clone)]
pub struct FramePool {
    capacity: u32,
    free: BTreeSet<FrameId>,
}

impl FramePool {
    /// Creates a pool of `capacity` frames, all free
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            free: (0..capacity).map(FrameId::new).collect(),
        }
    }

    /// Total number of frames
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of free frames
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Checks if `frame` is currently free
    pub fn is_free(&self, frame: FrameId) -> bool {
        self.free.contains(&frame)
    }

    /// Takes the lowest-numbered free frame
    pub fn allocate(&mut self) -> Option<FrameId> {
        self.free.pop_first()
    }

    /// Returns a frame to the pool
    ///
    /// Returns `false` if the frame does not belong to this pool or was
    /// already free.
    pub fn release(&mut self, frame: FrameId) -> bool {
        if frame.index() >= self.capacity {
            return false;
        }
        self.free.insert(frame)
    }
}
