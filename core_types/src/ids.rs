//! Unique identifiers for simulation entities

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for a simulated workload (process)
///
/// Workload ids are dense indices assigned by the bootstrap owner, so the
/// page store can keep one slot per id without hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkloadId(u32);

impl WorkloadId {
    /// Creates a workload ID from its index
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the index of this workload
    pub const fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Humans count processes from one.
        write!(f, "Workload({})", self.0 + 1)
    }
}

/// Identifier for a physical frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameId(u32);

impl FrameId {
    /// Creates a frame ID from its index in the frame pool
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the index of this frame
    pub const fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

/// Unique identifier for one simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a run ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Run({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_id_index() {
        let id = WorkloadId::new(3);
        assert_eq!(id.index(), 3);
        assert_eq!(id, WorkloadId::new(3));
        assert!(WorkloadId::new(1) < WorkloadId::new(2));
    }

    #[test]
    fn test_workload_id_display_is_one_based() {
        assert_eq!(format!("{}", WorkloadId::new(0)), "Workload(1)");
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(format!("{}", FrameId::new(7)), "Frame(7)");
    }

    #[test]
    fn test_run_id_creation() {
        let id1 = RunId::new();
        let id2 = RunId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_run_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = RunId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
        assert!(format!("{}", id).starts_with("Run("));
    }
}
