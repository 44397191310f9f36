//! # Memory Manager Service
//!
//! The MMU of the paging simulator: it owns every page table and the frame
//! pool, and resolves each page request into a hit, a fault, an illegal
//! reference or a termination.
//!
//! ## Philosophy
//!
//! - **Single writer**: The page store lives inside the memory manager.
//!   Workloads and the scheduler only see replies and notices.
//! - **One request at a time**: [`MemoryManager::handle_request`] takes
//!   `&mut self`; the service loop drains a single queue.
//! - **Recency, not wall-clock**: One tick per processed request orders
//!   every access and breaks LRU ties deterministically.
//!
//! ## Resolution order
//!
//! 1. Terminate sentinel: release the slot, notify `Terminated`.
//! 2. Out-of-range page: count it, reply `Illegal`, release, notify `Terminated`.
//! 3. Resident page: refresh its tick, reply `Hit(frame)`.
//! 4. Otherwise a fault: count it, reply `Fault`, bring the page in from the
//!    free pool or by evicting the workload's own LRU page, notify `Ready`.
//!    When neither is possible the workload is simply re-admitted to retry.

pub mod frame_pool;
pub mod page_store;
pub mod replacement;
pub mod report;
pub mod service;

pub use frame_pool::FramePool;
pub use page_store::{AuditViolation, FaultResolution, PageStore, PageTableEntry, Slot};
pub use report::{MemoryReport, SlotSummary};
pub use service::MemoryManagerService;

use core_types::{PageAccess, PageNumber, WorkloadId};
use ipc::{IpcError, PageReply, PageRequest, SchedulerNotice};
use services_diagnostics::{DiagnosticEvent, DiagnosticSink};
use thiserror::Error;

/// Memory manager errors
///
/// Every variant except `DuplicateWorkload` halts the memory manager.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MmuError {
    /// Request from a workload with no slot
    #[error("request from unregistered {0}")]
    UnknownWorkload(WorkloadId),

    /// Request from a workload that already terminated
    #[error("request from terminated {0}")]
    WorkloadTerminated(WorkloadId),

    /// Registration of a workload that already has a slot
    #[error("{0} is already registered")]
    DuplicateWorkload(WorkloadId),

    /// A previous protocol violation stopped the memory manager
    #[error("memory manager halted after a protocol violation")]
    Halted,

    /// Message delivery failed
    #[error("IPC failure: {0}")]
    Ipc(#[from] IpcError),
}

/// What the memory manager does in answer to one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Reply for the requesting workload (none for the sentinel)
    pub reply: Option<PageReply>,
    /// Admission-queue transition for the scheduler (none for a hit)
    pub notice: Option<SchedulerNotice>,
}

impl Resolution {
    fn hit(reply: PageReply) -> Self {
        Self {
            reply: Some(reply),
            notice: None,
        }
    }
}

/// The MMU state machine
pub struct MemoryManager {
    store: PageStore,
    tick: u64,
    halted: bool,
    sink: Box<dyn DiagnosticSink>,
}

impl MemoryManager {
    /// Creates a memory manager over `frames` physical frames
    pub fn new(frames: u32, sink: Box<dyn DiagnosticSink>) -> Self {
        Self {
            store: PageStore::new(frames),
            tick: 0,
            halted: false,
            sink,
        }
    }

    /// Creates a slot for `workload`
    pub fn register_workload(
        &mut self,
        workload: WorkloadId,
        required_pages: u32,
    ) -> Result<(), MmuError> {
        if !self.store.register(workload, required_pages) {
            return Err(MmuError::DuplicateWorkload(workload));
        }
        log::debug!("registered {} with {} page(s)", workload, required_pages);
        Ok(())
    }

    /// Read-only view of the page store
    pub fn store(&self) -> &PageStore {
        &self.store
    }

    /// Requests processed so far (the current tick)
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Checks if a protocol violation stopped this memory manager
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Resolves one request
    pub fn handle_request(&mut self, request: PageRequest) -> Result<Resolution, MmuError> {
        if self.halted {
            return Err(MmuError::Halted);
        }

        self.tick += 1;
        let sequence = self.tick;
        let workload = request.workload;
        self.sink.record(&DiagnosticEvent::Reference {
            sequence,
            workload,
            access: request.access,
        });

        let (terminated, legal) = match self.store.slot(workload) {
            None => return Err(self.halt(workload, MmuError::UnknownWorkload(workload))),
            Some(slot) => (
                slot.is_terminated(),
                request.access.page().map_or(true, |page| slot.is_legal(page)),
            ),
        };
        if terminated {
            return Err(self.halt(workload, MmuError::WorkloadTerminated(workload)));
        }

        let page = match request.access {
            PageAccess::Terminate => return Ok(self.terminate(workload)),
            PageAccess::Reference(page) => page,
        };

        if !legal {
            return Ok(self.illegal(workload, page));
        }

        if let Some(frame) = self.store.touch(workload, page, sequence) {
            if let Some(slot) = self.store.slot_mut(workload) {
                slot.request_count += 1;
                slot.hit_count += 1;
            }
            return Ok(Resolution::hit(PageReply::Hit(frame)));
        }

        Ok(self.fault(workload, page))
    }

    /// Flushes the diagnostic sink and snapshots the page store
    pub fn report(&mut self) -> MemoryReport {
        let report = MemoryReport::from_store(&self.store, self.tick, self.halted);
        for slot in &report.slots {
            self.sink.record(&slot.to_event());
        }
        self.sink.flush();
        report
    }

    fn terminate(&mut self, workload: WorkloadId) -> Resolution {
        let frames_released = self.store.release(workload);
        self.sink.record(&DiagnosticEvent::Terminated {
            sequence: self.tick,
            workload,
            frames_released,
        });
        Resolution {
            reply: None,
            notice: Some(SchedulerNotice::Terminated(workload)),
        }
    }

    fn illegal(&mut self, workload: WorkloadId, page: PageNumber) -> Resolution {
        if let Some(slot) = self.store.slot_mut(workload) {
            slot.request_count += 1;
            slot.illegal_count += 1;
        }
        self.sink.record(&DiagnosticEvent::IllegalAccess {
            sequence: self.tick,
            workload,
            page,
        });

        let Resolution { notice, .. } = self.terminate(workload);
        Resolution {
            reply: Some(PageReply::Illegal),
            notice,
        }
    }

    fn fault(&mut self, workload: WorkloadId, page: PageNumber) -> Resolution {
        let sequence = self.tick;
        if let Some(slot) = self.store.slot_mut(workload) {
            slot.request_count += 1;
            slot.fault_count += 1;
        }
        self.sink.record(&DiagnosticEvent::PageFault {
            sequence,
            workload,
            page,
        });

        match self.store.resolve_fault(workload, page, sequence) {
            Some(FaultResolution::Assigned { frame, evicted }) => {
                self.sink.record(&DiagnosticEvent::FrameAssigned {
                    sequence,
                    workload,
                    page,
                    frame,
                    evicted,
                });
            }
            Some(FaultResolution::NoVictim) | None => {
                // The workload retries the same page after re-admission.
                self.sink.record(&DiagnosticEvent::NoVictim {
                    sequence,
                    workload,
                    page,
                });
            }
        }

        Resolution {
            reply: Some(PageReply::Fault),
            notice: Some(SchedulerNotice::Ready(workload)),
        }
    }

    fn halt(&mut self, workload: WorkloadId, error: MmuError) -> MmuError {
        log::error!("memory manager halting: {}", error);
        self.sink.record(&DiagnosticEvent::ProtocolViolation {
            sequence: self.tick,
            workload,
            reason: error.to_string(),
        });
        self.halted = true;
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::FrameId;
    use proptest::prelude::*;
    use services_diagnostics::MemorySink;

    const W0: WorkloadId = WorkloadId::new(0);
    const W1: WorkloadId = WorkloadId::new(1);

    fn mmu(frames: u32) -> (MemoryManager, MemorySink) {
        let sink = MemorySink::new();
        (MemoryManager::new(frames, Box::new(sink.clone())), sink)
    }

    fn access(mmu: &mut MemoryManager, workload: WorkloadId, page: u32) -> Resolution {
        mmu.handle_request(PageRequest::reference(workload, page))
            .unwrap()
    }

    /// Drives a reference string the way a workload does: a fault is
    /// retried until it hits.
    fn run_string(mmu: &mut MemoryManager, workload: WorkloadId, pages: &[u32]) -> Vec<PageReply> {
        let mut replies = Vec::new();
        for &page in pages {
            loop {
                let reply = access(mmu, workload, page).reply.unwrap();
                replies.push(reply);
                if reply != PageReply::Fault {
                    break;
                }
            }
        }
        replies
    }

    #[test]
    fn test_fault_then_hit() {
        let (mut mmu, _) = mmu(2);
        mmu.register_workload(W0, 3).unwrap();

        let first = access(&mut mmu, W0, 1);
        assert_eq!(first.reply, Some(PageReply::Fault));
        assert_eq!(first.notice, Some(SchedulerNotice::Ready(W0)));

        let second = access(&mut mmu, W0, 1);
        assert_eq!(second.reply, Some(PageReply::Hit(FrameId::new(0))));
        assert_eq!(second.notice, None);
        assert_eq!(mmu.tick(), 2);
    }

    #[test]
    fn test_lru_trace_example() {
        // m=4, f=2, mi=3, reference string [0, 1, 2, 0]
        let (mut mmu, sink) = mmu(2);
        mmu.register_workload(W0, 3).unwrap();

        run_string(&mut mmu, W0, &[0, 1, 2, 0]);

        let slot = mmu.store().slot(W0).unwrap();
        assert_eq!(slot.fault_count, 4);
        assert_eq!(slot.illegal_count, 0);

        let assignments: Vec<(u32, Option<u32>)> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                DiagnosticEvent::FrameAssigned { page, evicted, .. } => Some((page, evicted)),
                _ => None,
            })
            .collect();
        assert_eq!(
            assignments,
            vec![(0, None), (1, None), (2, Some(0)), (0, Some(1))]
        );
    }

    #[test]
    fn test_illegal_reference_example() {
        // mi=2, m=4, reference [5]
        let (mut mmu, sink) = mmu(2);
        mmu.register_workload(W0, 2).unwrap();

        let resolution = access(&mut mmu, W0, 5);
        assert_eq!(resolution.reply, Some(PageReply::Illegal));
        assert_eq!(resolution.notice, Some(SchedulerNotice::Terminated(W0)));

        let slot = mmu.store().slot(W0).unwrap();
        assert_eq!(slot.illegal_count, 1);
        assert!(slot.is_terminated());
        assert_eq!(mmu.store().frames().free_count(), 2);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, DiagnosticEvent::IllegalAccess { page: 5, .. })));
    }

    #[test]
    fn test_illegal_releases_frames() {
        let (mut mmu, _) = mmu(2);
        mmu.register_workload(W0, 2).unwrap();
        run_string(&mut mmu, W0, &[0, 1]);
        assert_eq!(mmu.store().frames().free_count(), 0);

        access(&mut mmu, W0, 2);
        assert_eq!(mmu.store().frames().free_count(), 2);
        assert!(mmu.store().audit().is_empty());
    }

    #[test]
    fn test_terminate_sentinel() {
        let (mut mmu, sink) = mmu(3);
        mmu.register_workload(W0, 2).unwrap();
        run_string(&mut mmu, W0, &[0, 1]);

        let resolution = mmu.handle_request(PageRequest::terminate(W0)).unwrap();
        assert_eq!(resolution.reply, None);
        assert_eq!(resolution.notice, Some(SchedulerNotice::Terminated(W0)));
        assert_eq!(mmu.store().frames().free_count(), 3);
        assert!(sink.events().iter().any(|e| matches!(
            e,
            DiagnosticEvent::Terminated {
                frames_released: 2,
                ..
            }
        )));
    }

    #[test]
    fn test_no_victim_degrades_to_retry() {
        let (mut mmu, sink) = mmu(1);
        mmu.register_workload(W0, 1).unwrap();
        mmu.register_workload(W1, 1).unwrap();
        access(&mut mmu, W0, 0);

        let resolution = access(&mut mmu, W1, 0);
        assert_eq!(resolution.reply, Some(PageReply::Fault));
        assert_eq!(resolution.notice, Some(SchedulerNotice::Ready(W1)));
        assert_eq!(mmu.store().slot(W1).unwrap().resident_count(), 0);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, DiagnosticEvent::NoVictim { .. })));

        // Once W0 exits, W1's retry succeeds.
        mmu.handle_request(PageRequest::terminate(W0)).unwrap();
        access(&mut mmu, W1, 0);
        assert_eq!(
            access(&mut mmu, W1, 0).reply,
            Some(PageReply::Hit(FrameId::new(0)))
        );
    }

    #[test]
    fn test_unknown_workload_halts() {
        let (mut mmu, sink) = mmu(1);
        mmu.register_workload(W0, 1).unwrap();

        assert_eq!(
            mmu.handle_request(PageRequest::reference(W1, 0)),
            Err(MmuError::UnknownWorkload(W1))
        );
        assert!(mmu.is_halted());
        assert_eq!(
            mmu.handle_request(PageRequest::reference(W0, 0)),
            Err(MmuError::Halted)
        );
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, DiagnosticEvent::ProtocolViolation { .. })));
    }

    #[test]
    fn test_request_after_termination_rejected() {
        let (mut mmu, _) = mmu(1);
        mmu.register_workload(W0, 1).unwrap();
        access(&mut mmu, W0, 3);

        assert_eq!(
            mmu.handle_request(PageRequest::reference(W0, 0)),
            Err(MmuError::WorkloadTerminated(W0))
        );
    }

    #[test]
    fn test_duplicate_registration() {
        let (mut mmu, _) = mmu(1);
        mmu.register_workload(W0, 1).unwrap();
        assert_eq!(
            mmu.register_workload(W0, 2),
            Err(MmuError::DuplicateWorkload(W0))
        );
        assert!(!mmu.is_halted());
    }

    #[test]
    fn test_report_emits_totals() {
        let (mut mmu, sink) = mmu(2);
        mmu.register_workload(W0, 3).unwrap();
        run_string(&mut mmu, W0, &[0, 1, 2, 0]);

        let report = mmu.report();
        let slot = report.slot(W0).unwrap();
        assert_eq!(slot.faults, 4);
        assert_eq!(slot.hits, 4);
        assert_eq!(slot.requests, 8);
        assert!(!report.halted);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, DiagnosticEvent::Totals { faults: 4, .. })));
    }

    #[test]
    fn test_sequence_numbers_are_strictly_increasing() {
        let (mut mmu, sink) = mmu(2);
        mmu.register_workload(W0, 2).unwrap();
        mmu.register_workload(W1, 2).unwrap();
        run_string(&mut mmu, W0, &[0, 1]);
        run_string(&mut mmu, W1, &[1, 0]);

        let sequences: Vec<u64> = sink
            .events()
            .iter()
            .filter_map(|e| match e {
                DiagnosticEvent::Reference { sequence, .. } => Some(*sequence),
                _ => None,
            })
            .collect();
        assert_eq!(sequences, (1..=mmu.tick()).collect::<Vec<_>>());
    }

    proptest! {
        #[test]
        fn accounting_and_frame_ownership_hold(
            frames in 1u32..5,
            required in proptest::collection::vec(1u32..6, 1..4),
            trace in proptest::collection::vec((0usize..4, 0u32..8), 0..80),
        ) {
            let (mut mmu, _) = mmu(frames);
            for (i, pages) in required.iter().enumerate() {
                mmu.register_workload(WorkloadId::new(i as u32), *pages).unwrap();
            }

            let mut sent = vec![0u64; required.len()];
            for (who, page) in trace {
                let workload = WorkloadId::new((who % required.len()) as u32);
                if mmu.store().slot(workload).unwrap().is_terminated() {
                    continue;
                }
                mmu.handle_request(PageRequest::reference(workload, page)).unwrap();
                sent[workload.index() as usize] += 1;
                prop_assert!(mmu.store().audit().is_empty());
            }

            for slot in mmu.store().slots() {
                prop_assert_eq!(
                    slot.fault_count + slot.illegal_count + slot.hit_count,
                    sent[slot.workload().index() as usize]
                );
                prop_assert!(slot.illegal_count <= 1);
            }
        }
    }
}
