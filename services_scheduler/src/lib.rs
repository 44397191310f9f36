//! # Scheduler Service
//!
//! FCFS admission control for the simulated CPU.
//!
//! ## Philosophy
//!
//! - **One CPU**: At most one workload holds a grant. The scheduler does not
//!   grant again until the memory manager reports what happened to it.
//! - **FCFS**: Workloads are admitted in the order they became ready, at
//!   start or after a fault was handled.
//! - **Explicit completion**: The scheduler owns the completion counter and
//!   raises a one-shot signal when it reaches zero.
//!
//! ## Example
//!
//! ```
//! use core_types::WorkloadId;
//! use ipc::{unbounded, SchedulerNotice};
//! use services_scheduler::Scheduler;
//!
//! let w = WorkloadId::new(0);
//! let (grant_tx, grant_rx) = unbounded();
//! let mut scheduler = Scheduler::new();
//! scheduler.register_workload(w, grant_tx);
//!
//! scheduler.enqueue_ready(w).unwrap();
//! assert_eq!(scheduler.admit_next().unwrap(), Some(w));
//! assert_eq!(grant_rx.recv().unwrap().workload, w);
//!
//! scheduler.on_notice(SchedulerNotice::Terminated(w)).unwrap();
//! assert!(scheduler.is_complete());
//! ```

pub mod queue;

pub use queue::{AdmissionQueue, CompletionCounter};

use core_types::WorkloadId;
use ipc::{Completion, Grant, IpcError, Receiver, SchedulerEvent, SchedulerNotice, Sender};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Scheduler errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// Event about a workload with no grant channel
    #[error("unknown {0}")]
    UnknownWorkload(WorkloadId),

    /// Workload queued while it already has a pending entry
    #[error("{0} already waiting for admission")]
    DuplicateAdmission(WorkloadId),

    /// Workload reported terminated twice
    #[error("{0} terminated twice")]
    DuplicateTermination(WorkloadId),

    /// Memory manager notice about a workload that does not hold the CPU
    #[error("notice {notice:?} while {running:?} holds the grant")]
    UnexpectedNotice {
        running: Option<WorkloadId>,
        notice: SchedulerNotice,
    },

    /// Message delivery failed
    #[error("IPC failure: {0}")]
    Ipc(#[from] IpcError),
}

/// Scheduler status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerStatus {
    /// Waiting for workloads to become ready
    Idle,
    /// A workload holds the grant
    Dispatched(WorkloadId),
    /// Every workload has terminated
    Completed,
}

impl fmt::Display for SchedulerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerStatus::Idle => write!(f, "Idle"),
            SchedulerStatus::Dispatched(w) => write!(f, "Dispatched({})", w),
            SchedulerStatus::Completed => write!(f, "Completed"),
        }
    }
}

/// Why [`Scheduler::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerExit {
    /// Every workload terminated and the completion signal was sent
    Completed(Completion),
    /// The bootstrap owner asked it to stop
    Shutdown,
}

/// FCFS scheduler
pub struct Scheduler {
    queue: AdmissionQueue,
    counter: CompletionCounter,
    grants: HashMap<WorkloadId, Sender<Grant>>,
    running: Option<WorkloadId>,
    grants_issued: u64,
}

impl Scheduler {
    /// Creates a scheduler with no workloads
    pub fn new() -> Self {
        Self {
            queue: AdmissionQueue::new(),
            counter: CompletionCounter::new(Vec::new()),
            grants: HashMap::new(),
            running: None,
            grants_issued: 0,
        }
    }

    /// Adds a workload and its grant channel
    pub fn register_workload(&mut self, workload: WorkloadId, grants: Sender<Grant>) {
        self.grants.insert(workload, grants);
        self.counter = CompletionCounter::new(self.grants.keys().copied());
    }

    /// Current status
    pub fn status(&self) -> SchedulerStatus {
        if self.counter.is_complete() {
            SchedulerStatus::Completed
        } else if let Some(workload) = self.running {
            SchedulerStatus::Dispatched(workload)
        } else {
            SchedulerStatus::Idle
        }
    }

    /// Checks if every workload has terminated
    pub fn is_complete(&self) -> bool {
        self.counter.is_complete()
    }

    /// Workloads not yet terminated
    pub fn remaining(&self) -> usize {
        self.counter.remaining()
    }

    /// Number of workloads waiting for a grant
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Total grants issued
    pub fn grants_issued(&self) -> u64 {
        self.grants_issued
    }

    /// A workload became able to run
    pub fn enqueue_ready(&mut self, workload: WorkloadId) -> Result<(), SchedulerError> {
        if !self.grants.contains_key(&workload) {
            return Err(SchedulerError::UnknownWorkload(workload));
        }
        self.queue.enqueue(workload)
    }

    /// Grants the head of the queue, if the CPU is free
    ///
    /// Returns the admitted workload.
    pub fn admit_next(&mut self) -> Result<Option<WorkloadId>, SchedulerError> {
        if self.running.is_some() {
            return Ok(None);
        }
        let Some(workload) = self.queue.pop() else {
            return Ok(None);
        };
        let channel = self
            .grants
            .get(&workload)
            .ok_or(SchedulerError::UnknownWorkload(workload))?;

        self.grants_issued += 1;
        channel.send(Grant {
            workload,
            sequence: self.grants_issued,
        })?;
        self.running = Some(workload);
        log::info!("Scheduling {}", workload);
        Ok(Some(workload))
    }

    /// Applies a memory manager notice about the running workload
    pub fn on_notice(&mut self, notice: SchedulerNotice) -> Result<(), SchedulerError> {
        if self.running != Some(notice.workload()) {
            return Err(SchedulerError::UnexpectedNotice {
                running: self.running,
                notice,
            });
        }
        self.running = None;

        match notice {
            SchedulerNotice::Ready(workload) => {
                self.enqueue_ready(workload)?;
                log::info!("{} added to the end of the ready queue", workload);
            }
            SchedulerNotice::Terminated(workload) => {
                let remaining = self.counter.terminate(workload)?;
                log::info!("{} terminated, {} remaining", workload, remaining);
            }
        }
        Ok(())
    }

    /// Schedules until every workload has terminated or `Shutdown` arrives
    ///
    /// The completion signal is sent at most once, after which the scheduler
    /// stops.
    pub fn run(
        &mut self,
        events: &Receiver<SchedulerEvent>,
        completion: &Sender<Completion>,
    ) -> Result<SchedulerExit, SchedulerError> {
        loop {
            if self.counter.is_complete() {
                let signal = Completion {
                    terminated: self.counter.terminated(),
                    grants: self.grants_issued,
                };
                completion.send(signal)?;
                log::info!("Scheduler exiting: all workloads completed");
                return Ok(SchedulerExit::Completed(signal));
            }

            self.admit_next()?;

            match events.recv()? {
                SchedulerEvent::Arrived(workload) => {
                    log::debug!("{} arrived", workload);
                    self.enqueue_ready(workload)?;
                }
                SchedulerEvent::Notice(notice) => self.on_notice(notice)?,
                SchedulerEvent::Shutdown => {
                    log::info!(
                        "scheduler stopped with {} workload(s) remaining",
                        self.counter.remaining()
                    );
                    return Ok(SchedulerExit::Shutdown);
                }
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
