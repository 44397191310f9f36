//! # Workload Service
//!
//! A simulated process walking its reference string.
//!
//! ## Philosophy
//!
//! - **Run only when granted**: A workload issues requests only while it
//!   holds the scheduler's grant. A fault gives the grant back.
//! - **Retry, don't skip**: After a fault the same page is requested again
//!   on the next grant. The cursor only moves on a hit.
//! - **Exit is explicit**: A finished workload sends the terminate sentinel;
//!   an illegal reference ends it without one.
//!
//! ## Lifecycle
//!
//! ```text
//! AwaitingAdmission --grant--> Running --fault--> AwaitingAdmission
//!                                 |
//!                                 +--sentinel / illegal--> Terminated
//! ```

use core_types::{PageNumber, ReferenceString, WorkloadId};
use ipc::{Grant, IpcError, MmuRequest, PageReply, PageRequest, Receiver, SchedulerEvent, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Workload errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkloadError {
    /// A peer went away
    #[error("IPC failure: {0}")]
    Ipc(#[from] IpcError),

    /// A grant addressed to somebody else arrived on this workload's channel
    #[error("{workload} received a grant for {granted}")]
    UnexpectedGrant {
        workload: WorkloadId,
        granted: WorkloadId,
    },
}

/// Workload state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadState {
    /// Queued (or about to be) and waiting for a grant
    AwaitingAdmission,
    /// Holds the grant and is issuing requests
    Running,
    /// Finished or killed
    Terminated,
}

impl fmt::Display for WorkloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadState::AwaitingAdmission => write!(f, "AwaitingAdmission"),
            WorkloadState::Running => write!(f, "Running"),
            WorkloadState::Terminated => write!(f, "Terminated"),
        }
    }
}

/// How a workload ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadOutcome {
    /// Every reference was served and the sentinel was sent
    Completed,
    /// The memory manager rejected this page
    IllegalReference(PageNumber),
}

/// What a workload observed over its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSummary {
    pub workload: WorkloadId,
    pub outcome: WorkloadOutcome,
    /// References served with a hit
    pub completed_references: usize,
    pub faults: u64,
    pub grants: u64,
}

/// A simulated process
pub struct Workload {
    id: WorkloadId,
    refs: ReferenceString,
    cursor: usize,
    state: WorkloadState,
    faults: u64,
    grants: u64,
    mmu: Sender<MmuRequest>,
    scheduler: Sender<SchedulerEvent>,
    replies: Receiver<PageReply>,
    grant_rx: Receiver<Grant>,
}

impl Workload {
    /// Creates a workload
    ///
    /// `replies` and `grants` must be the receiving ends of the channels the
    /// memory manager and scheduler hold for `id`.
    pub fn new(
        id: WorkloadId,
        refs: ReferenceString,
        mmu: Sender<MmuRequest>,
        scheduler: Sender<SchedulerEvent>,
        replies: Receiver<PageReply>,
        grants: Receiver<Grant>,
    ) -> Self {
        Self {
            id,
            refs,
            cursor: 0,
            state: WorkloadState::AwaitingAdmission,
            faults: 0,
            grants: 0,
            mmu,
            scheduler,
            replies,
            grant_rx: grants,
        }
    }

    /// Returns the workload ID
    pub fn id(&self) -> WorkloadId {
        self.id
    }

    /// Current state
    pub fn state(&self) -> WorkloadState {
        self.state
    }

    /// Index of the next reference to issue
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The reference string
    pub fn references(&self) -> &ReferenceString {
        &self.refs
    }

    /// Runs until the workload terminates
    pub fn run(mut self) -> Result<WorkloadSummary, WorkloadError> {
        log::info!(
            "{} started with {} page(s), reference string {}",
            self.id,
            self.refs.required_pages(),
            self.refs
        );

        self.scheduler.send(SchedulerEvent::Arrived(self.id))?;
        self.await_grant()?;

        loop {
            let Some(&page) = self.refs.pages().get(self.cursor) else {
                let sentinel = PageRequest::terminate(self.id);
                self.mmu.send(MmuRequest::Access(sentinel))?;
                log::info!("{} completed its reference string", self.id);
                return Ok(self.finish(WorkloadOutcome::Completed));
            };

            let request = PageRequest::reference(self.id, page);
            self.mmu.send(MmuRequest::Access(request))?;

            match self.replies.recv()? {
                PageReply::Hit(frame) => {
                    log::trace!("{} page {} hit in {}", self.id, page, frame);
                    self.cursor += 1;
                }
                PageReply::Fault => {
                    self.faults += 1;
                    log::debug!("{} faulted on page {}", self.id, page);
                    self.state = WorkloadState::AwaitingAdmission;
                    self.await_grant()?;
                }
                PageReply::Illegal => {
                    log::warn!("{} made an illegal reference to page {}", self.id, page);
                    return Ok(self.finish(WorkloadOutcome::IllegalReference(page)));
                }
            }
        }
    }

    fn await_grant(&mut self) -> Result<(), WorkloadError> {
        let grant = self.grant_rx.recv()?;
        if grant.workload != self.id {
            return Err(WorkloadError::UnexpectedGrant {
                workload: self.id,
                granted: grant.workload,
            });
        }
        self.grants += 1;
        self.state = WorkloadState::Running;
        Ok(())
    }

    fn finish(&mut self, outcome: WorkloadOutcome) -> WorkloadSummary {
        self.state = WorkloadState::Terminated;
        WorkloadSummary {
            workload: self.id,
            outcome,
            completed_references: self.cursor,
            faults: self.faults,
            grants: self.grants,
        }
    }
}
