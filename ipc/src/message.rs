//! Protocol messages exchanged between workloads, the memory manager and
//! the scheduler

use core_types::{FrameId, PageAccess, WorkloadId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A page request from a workload to the memory manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Requesting workload
    pub workload: WorkloadId,
    /// The access being made
    pub access: PageAccess,
}

impl PageRequest {
    /// Creates a reference to `page`
    pub fn reference(workload: WorkloadId, page: u32) -> Self {
        Self {
            workload,
            access: PageAccess::Reference(page),
        }
    }

    /// Creates the terminate sentinel for `workload`
    pub fn terminate(workload: WorkloadId) -> Self {
        Self {
            workload,
            access: PageAccess::Terminate,
        }
    }
}

/// The memory manager's answer to a page reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageReply {
    /// Page is resident in this frame
    Hit(FrameId),
    /// Page was not resident; wait for re-admission and retry
    Fault,
    /// Page is outside the workload's range; the workload is terminated
    Illegal,
}

impl fmt::Display for PageReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageReply::Hit(frame) => write!(f, "hit in {}", frame),
            PageReply::Fault => write!(f, "page fault"),
            PageReply::Illegal => write!(f, "illegal reference"),
        }
    }
}

/// Inbound traffic on the memory manager's request queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmuRequest {
    /// A workload's page access
    Access(PageRequest),
    /// Stop serving and hand back the final page store
    Shutdown,
}

/// Admission-queue transitions reported by the memory manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerNotice {
    /// The workload's fault was handled; re-admit it
    Ready(WorkloadId),
    /// The workload has released all frames and exited
    Terminated(WorkloadId),
}

impl SchedulerNotice {
    /// The workload this notice is about
    pub fn workload(&self) -> WorkloadId {
        match self {
            SchedulerNotice::Ready(id) | SchedulerNotice::Terminated(id) => *id,
        }
    }
}

/// Inbound traffic on the scheduler's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A workload started and wants its first admission
    Arrived(WorkloadId),
    /// A transition reported by the memory manager
    Notice(SchedulerNotice),
    /// Stop scheduling (interrupt or failure teardown)
    Shutdown,
}

impl From<SchedulerNotice> for SchedulerEvent {
    fn from(notice: SchedulerNotice) -> Self {
        SchedulerEvent::Notice(notice)
    }
}

/// Permission for a workload to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Admitted workload
    pub workload: WorkloadId,
    /// Position of this grant in the scheduler's global admission order
    pub sequence: u64,
}

/// One-shot signal that every workload has terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Number of workloads that terminated
    pub terminated: usize,
    /// Number of grants the scheduler issued
    pub grants: u64,
}
