//! Final per-workload totals

use crate::page_store::PageStore;
use core_types::WorkloadId;
use serde::{Deserialize, Serialize};
use services_diagnostics::DiagnosticEvent;
use std::fmt;

/// Counters for one workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSummary {
    pub workload: WorkloadId,
    pub required_pages: u32,
    pub faults: u64,
    pub illegal: u64,
    pub hits: u64,
    pub requests: u64,
    pub resident_pages: usize,
    pub terminated: bool,
}

impl SlotSummary {
    /// The `Totals` diagnostic for this workload
    pub fn to_event(&self) -> DiagnosticEvent {
        DiagnosticEvent::Totals {
            workload: self.workload,
            required_pages: self.required_pages,
            faults: self.faults,
            illegal: self.illegal,
            hits: self.hits,
        }
    }
}

/// Snapshot of the page store when the memory manager stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryReport {
    pub slots: Vec<SlotSummary>,
    pub total_frames: u32,
    pub free_frames: usize,
    /// Requests taken off the queue, sentinels and rejected ones included
    pub requests_processed: u64,
    /// Whether the memory manager stopped on a protocol violation
    pub halted: bool,
}

impl MemoryReport {
    pub(crate) fn from_store(store: &PageStore, requests_processed: u64, halted: bool) -> Self {
        let slots = store
            .slots()
            .map(|slot| SlotSummary {
                workload: slot.workload(),
                required_pages: slot.required_pages(),
                faults: slot.fault_count,
                illegal: slot.illegal_count,
                hits: slot.hit_count,
                requests: slot.request_count,
                resident_pages: slot.resident_count(),
                terminated: slot.is_terminated(),
            })
            .collect();

        Self {
            slots,
            total_frames: store.frames().capacity(),
            free_frames: store.frames().free_count(),
            requests_processed,
            halted,
        }
    }

    /// Summary for one workload
    pub fn slot(&self, workload: WorkloadId) -> Option<&SlotSummary> {
        self.slots.iter().find(|s| s.workload == workload)
    }

    /// Faults across all workloads
    pub fn total_faults(&self) -> u64 {
        self.slots.iter().map(|s| s.faults).sum()
    }

    /// Illegal references across all workloads
    pub fn total_illegal(&self) -> u64 {
        self.slots.iter().map(|s| s.illegal).sum()
    }
}

impl fmt::Display for MemoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*********************************************")?;
        for slot in &self.slots {
            writeln!(f, "=> {} (pages: {}):-", slot.workload, slot.required_pages)?;
            writeln!(f, "\t-Total no. of page faults: {}", slot.faults)?;
            writeln!(
                f,
                "\t-Total no. of invalid page references: {}",
                slot.illegal
            )?;
        }
        write!(
            f,
            "Frames free: {}/{}, requests processed: {}",
            self.free_frames, self.total_frames, self.requests_processed
        )
    }
}
