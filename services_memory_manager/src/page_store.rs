//! Page tables and the frame pool
//!
//! The page store is owned by the memory manager. Nothing outside this crate
//! can reach a page table except through the read-only report.

use crate::frame_pool::FramePool;
use crate::replacement::select_lru_victim;
use core_types::{FrameId, PageNumber, WorkloadId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One page-table entry
///
/// The entry is valid exactly when it holds a frame; the two cannot drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTableEntry {
    frame: Option<FrameId>,
    last_used: u64,
}

impl PageTableEntry {
    /// Frame holding this page, if resident
    pub fn frame(&self) -> Option<FrameId> {
        self.frame
    }

    /// Checks if the page is resident
    pub fn is_valid(&self) -> bool {
        self.frame.is_some()
    }

    /// Tick of the last access (0 if never touched)
    pub fn last_used(&self) -> u64 {
        self.last_used
    }

    /// Makes the page resident in `frame`
    pub fn map(&mut self, frame: FrameId, tick: u64) {
        self.frame = Some(frame);
        self.last_used = tick;
    }

    /// Records an access
    pub fn touch(&mut self, tick: u64) {
        self.last_used = tick;
    }

    /// Drops the mapping and returns the frame it held
    pub fn unmap(&mut self) -> Option<FrameId> {
        self.last_used = 0;
        self.frame.take()
    }
}

/// Per-workload memory state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    workload: WorkloadId,
    entries: Vec<PageTableEntry>,
    /// Page faults taken
    pub fault_count: u64,
    /// Out-of-range references made
    pub illegal_count: u64,
    /// References served from a resident page
    pub hit_count: u64,
    /// Page references seen (the terminate sentinel is not counted)
    pub request_count: u64,
    terminated: bool,
}

impl Slot {
    fn new(workload: WorkloadId, required_pages: u32) -> Self {
        Self {
            workload,
            entries: vec![PageTableEntry::default(); required_pages as usize],
            fault_count: 0,
            illegal_count: 0,
            hit_count: 0,
            request_count: 0,
            terminated: false,
        }
    }

    /// Owning workload
    pub fn workload(&self) -> WorkloadId {
        self.workload
    }

    /// Declared page count (`mi`)
    pub fn required_pages(&self) -> u32 {
        self.entries.len() as u32
    }

    /// The page table
    pub fn entries(&self) -> &[PageTableEntry] {
        &self.entries
    }

    /// Entry for `page`, if in range
    pub fn entry(&self, page: PageNumber) -> Option<&PageTableEntry> {
        self.entries.get(page as usize)
    }

    /// Checks if `page` is within the declared range
    pub fn is_legal(&self, page: PageNumber) -> bool {
        (page as usize) < self.entries.len()
    }

    /// Number of resident pages
    pub fn resident_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_valid()).count()
    }

    /// Checks if the workload has exited
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn entry_mut(&mut self, page: PageNumber) -> Option<&mut PageTableEntry> {
        self.entries.get_mut(page as usize)
    }
}

/// How a fault was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultResolution {
    /// A frame now backs the page; `evicted` is the page it was taken from
    Assigned {
        frame: FrameId,
        evicted: Option<PageNumber>,
    },
    /// No free frame and nothing of the workload's own to evict
    NoVictim,
}

/// A broken page-store invariant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditViolation {
    /// Two valid entries reference the same frame
    SharedFrame {
        frame: FrameId,
        first: (WorkloadId, PageNumber),
        second: (WorkloadId, PageNumber),
    },
    /// A frame is both mapped and in the free pool
    MappedFrameIsFree {
        frame: FrameId,
        owner: (WorkloadId, PageNumber),
    },
    /// A frame is neither mapped nor free
    LeakedFrame { frame: FrameId },
    /// A terminated workload still owns frames
    TerminatedOwnsFrames { workload: WorkloadId, frames: usize },
}

/// All slots plus the global frame pool
#[derive(Debug, Clone)]
pub struct PageStore {
    slots: BTreeMap<WorkloadId, Slot>,
    frames: FramePool,
}

impl PageStore {
    /// Creates a store backed by `frames` physical frames
    pub fn new(frames: u32) -> Self {
        Self {
            slots: BTreeMap::new(),
            frames: FramePool::new(frames),
        }
    }

    /// Adds a slot; returns `false` if the workload already has one
    pub fn register(&mut self, workload: WorkloadId, required_pages: u32) -> bool {
        if self.slots.contains_key(&workload) {
            return false;
        }
        self.slots
            .insert(workload, Slot::new(workload, required_pages));
        true
    }

    /// Slot for `workload`
    pub fn slot(&self, workload: WorkloadId) -> Option<&Slot> {
        self.slots.get(&workload)
    }

    /// Mutable slot for `workload`
    pub fn slot_mut(&mut self, workload: WorkloadId) -> Option<&mut Slot> {
        self.slots.get_mut(&workload)
    }

    /// All slots in workload order
    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    /// Number of registered workloads
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Checks if no workload is registered
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The frame pool
    pub fn frames(&self) -> &FramePool {
        &self.frames
    }

    /// Records a hit on a resident page and returns its frame
    pub fn touch(&mut self, workload: WorkloadId, page: PageNumber, tick: u64) -> Option<FrameId> {
        let entry = self.slots.get_mut(&workload)?.entry_mut(page)?;
        let frame = entry.frame()?;
        entry.touch(tick);
        Some(frame)
    }

    /// Brings `page` in for `workload`
    ///
    /// Uses a free frame when one exists, otherwise evicts the workload's own
    /// least recently used page.
    pub fn resolve_fault(
        &mut self,
        workload: WorkloadId,
        page: PageNumber,
        tick: u64,
    ) -> Option<FaultResolution> {
        let slot = self.slots.get_mut(&workload)?;
        if !slot.is_legal(page) {
            return None;
        }

        let (frame, evicted) = match self.frames.allocate() {
            Some(frame) => (frame, None),
            None => {
                let Some(victim) = select_lru_victim(&slot.entries) else {
                    return Some(FaultResolution::NoVictim);
                };
                let frame = slot.entry_mut(victim)?.unmap()?;
                (frame, Some(victim))
            }
        };

        slot.entry_mut(page)?.map(frame, tick);
        Some(FaultResolution::Assigned { frame, evicted })
    }

    /// Unmaps every page of `workload`, returns the frames to the pool, and
    /// marks the slot terminated
    ///
    /// Returns the number of frames released.
    pub fn release(&mut self, workload: WorkloadId) -> usize {
        let Some(slot) = self.slots.get_mut(&workload) else {
            return 0;
        };
        slot.terminated = true;

        let mut released = 0;
        for entry in &mut slot.entries {
            if let Some(frame) = entry.unmap() {
                self.frames.release(frame);
                released += 1;
            }
        }
        released
    }

    /// Checks the frame-ownership invariants across all slots
    pub fn audit(&self) -> Vec<AuditViolation> {
        let mut violations = Vec::new();
        let mut owners: HashMap<FrameId, (WorkloadId, PageNumber)> = HashMap::new();

        for slot in self.slots.values() {
            let resident = slot.resident_count();
            if slot.terminated && resident > 0 {
                violations.push(AuditViolation::TerminatedOwnsFrames {
                    workload: slot.workload,
                    frames: resident,
                });
            }

            for (page, entry) in slot.entries.iter().enumerate() {
                let Some(frame) = entry.frame() else {
                    continue;
                };
                let owner = (slot.workload, page as PageNumber);
                if self.frames.is_free(frame) {
                    violations.push(AuditViolation::MappedFrameIsFree { frame, owner });
                }
                if let Some(first) = owners.insert(frame, owner) {
                    violations.push(AuditViolation::SharedFrame {
                        frame,
                        first,
                        second: owner,
                    });
                }
            }
        }

        for index in 0..self.frames.capacity() {
            let frame = FrameId::new(index);
            if !self.frames.is_free(frame) && !owners.contains_key(&frame) {
                violations.push(AuditViolation::LeakedFrame { frame });
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W0: WorkloadId = WorkloadId::new(0);
    const W1: WorkloadId = WorkloadId::new(1);

    #[test]
    fn test_entry_valid_iff_frame() {
        let mut entry = PageTableEntry::default();
        assert!(!entry.is_valid());
        entry.map(FrameId::new(1), 5);
        assert!(entry.is_valid());
        assert_eq!(entry.frame(), Some(FrameId::new(1)));
        assert_eq!(entry.unmap(), Some(FrameId::new(1)));
        assert!(!entry.is_valid());
        assert_eq!(entry.unmap(), None);
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let mut store = PageStore::new(2);
        assert!(store.register(W0, 3));
        assert!(!store.register(W0, 5));
        assert_eq!(store.slot(W0).unwrap().required_pages(), 3);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_fault_uses_free_frames_first() {
        let mut store = PageStore::new(2);
        store.register(W0, 3);

        assert_eq!(
            store.resolve_fault(W0, 0, 1),
            Some(FaultResolution::Assigned {
                frame: FrameId::new(0),
                evicted: None
            })
        );
        assert_eq!(
            store.resolve_fault(W0, 1, 2),
            Some(FaultResolution::Assigned {
                frame: FrameId::new(1),
                evicted: None
            })
        );
        assert_eq!(store.frames().free_count(), 0);
        assert!(store.audit().is_empty());
    }

    #[test]
    fn test_fault_evicts_own_lru_page() {
        let mut store = PageStore::new(2);
        store.register(W0, 3);
        store.resolve_fault(W0, 0, 1);
        store.resolve_fault(W0, 1, 2);
        assert_eq!(store.touch(W0, 0, 3), Some(FrameId::new(0)));

        // Page 1 is now older than page 0.
        assert_eq!(
            store.resolve_fault(W0, 2, 4),
            Some(FaultResolution::Assigned {
                frame: FrameId::new(1),
                evicted: Some(1)
            })
        );
        assert!(!store.slot(W0).unwrap().entry(1).unwrap().is_valid());
        assert!(store.audit().is_empty());
    }

    #[test]
    fn test_fault_never_steals_from_other_workload() {
        let mut store = PageStore::new(1);
        store.register(W0, 2);
        store.register(W1, 2);
        store.resolve_fault(W0, 0, 1);

        assert_eq!(
            store.resolve_fault(W1, 0, 2),
            Some(FaultResolution::NoVictim)
        );
        assert!(store.slot(W0).unwrap().entry(0).unwrap().is_valid());
        assert_eq!(store.slot(W1).unwrap().resident_count(), 0);
    }

    #[test]
    fn test_fault_unknown_or_illegal() {
        let mut store = PageStore::new(1);
        store.register(W0, 2);
        assert_eq!(store.resolve_fault(W1, 0, 1), None);
        assert_eq!(store.resolve_fault(W0, 2, 1), None);
    }

    #[test]
    fn test_touch_non_resident() {
        let mut store = PageStore::new(1);
        store.register(W0, 2);
        assert_eq!(store.touch(W0, 1, 1), None);
        assert_eq!(store.touch(W0, 9, 1), None);
    }

    #[test]
    fn test_release_returns_frames() {
        let mut store = PageStore::new(3);
        store.register(W0, 3);
        store.register(W1, 1);
        store.resolve_fault(W0, 0, 1);
        store.resolve_fault(W0, 2, 2);
        store.resolve_fault(W1, 0, 3);

        assert_eq!(store.release(W0), 2);
        assert_eq!(store.frames().free_count(), 2);
        assert!(store.slot(W0).unwrap().is_terminated());
        assert_eq!(store.slot(W1).unwrap().resident_count(), 1);
        assert!(store.audit().is_empty());
        assert_eq!(store.release(WorkloadId::new(9)), 0);
    }

    #[test]
    fn test_audit_detects_terminated_owner() {
        let mut store = PageStore::new(1);
        store.register(W0, 1);
        store.resolve_fault(W0, 0, 1);
        store.slot_mut(W0).unwrap().terminated = true;

        assert_eq!(
            store.audit(),
            vec![AuditViolation::TerminatedOwnsFrames {
                workload: W0,
                frames: 1
            }]
        );
    }

    #[test]
    fn test_audit_detects_shared_and_leaked_frames() {
        let mut store = PageStore::new(2);
        store.register(W0, 2);
        store.register(W1, 1);
        store.resolve_fault(W0, 0, 1);
        store.resolve_fault(W0, 1, 2);
        // Corrupt: point W1 at W0's frame and leak frame 1.
        let frame = store.slot(W0).unwrap().entry(0).unwrap().frame().unwrap();
        store.slot_mut(W1).unwrap().entries[0].map(frame, 3);
        store.slot_mut(W0).unwrap().entries[1].unmap();

        let violations = store.audit();
        assert!(violations
            .iter()
            .any(|v| matches!(v, AuditViolation::SharedFrame { .. })));
        assert!(violations
            .iter()
            .any(|v| matches!(v, AuditViolation::LeakedFrame { frame } if frame.index() == 1)));
    }
}
