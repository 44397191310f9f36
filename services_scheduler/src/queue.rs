//! Admission queue and completion counter

use crate::SchedulerError;
use core_types::WorkloadId;
use std::collections::{BTreeSet, HashSet, VecDeque};

/// FCFS queue of workloads waiting for a grant
///
/// A workload can have at most one pending entry.
#[derive(Debug, Clone, Default)]
pub struct AdmissionQueue {
    queue: VecDeque<WorkloadId>,
    pending: HashSet<WorkloadId>,
}

impl AdmissionQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `workload` at the tail
    pub fn enqueue(&mut self, workload: WorkloadId) -> Result<(), SchedulerError> {
        if !self.pending.insert(workload) {
            return Err(SchedulerError::DuplicateAdmission(workload));
        }
        self.queue.push_back(workload);
        Ok(())
    }

    /// Removes the head
    pub fn pop(&mut self) -> Option<WorkloadId> {
        let workload = self.queue.pop_front()?;
        self.pending.remove(&workload);
        Some(workload)
    }

    /// Checks if `workload` is waiting
    pub fn contains(&self, workload: WorkloadId) -> bool {
        self.pending.contains(&workload)
    }

    /// Number of waiting workloads
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Checks if nobody is waiting
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Waiting workloads, head first
    pub fn iter(&self) -> impl Iterator<Item = &WorkloadId> {
        self.queue.iter()
    }
}

/// Number of workloads that have not terminated yet
#[derive(Debug, Clone)]
pub struct CompletionCounter {
    expected: BTreeSet<WorkloadId>,
    terminated: BTreeSet<WorkloadId>,
}

impl CompletionCounter {
    /// Creates a counter over `workloads`
    pub fn new(workloads: impl IntoIterator<Item = WorkloadId>) -> Self {
        Self {
            expected: workloads.into_iter().collect(),
            terminated: BTreeSet::new(),
        }
    }

    /// Workloads still alive
    pub fn remaining(&self) -> usize {
        self.expected.len() - self.terminated.len()
    }

    /// Workloads that have terminated
    pub fn terminated(&self) -> usize {
        self.terminated.len()
    }

    /// Checks if every workload has terminated
    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    /// Counts one termination
    ///
    /// Each workload may terminate exactly once.
    pub fn terminate(&mut self, workload: WorkloadId) -> Result<usize, SchedulerError> {
        if !self.expected.contains(&workload) {
            return Err(SchedulerError::UnknownWorkload(workload));
        }
        if !self.terminated.insert(workload) {
            return Err(SchedulerError::DuplicateTermination(workload));
        }
        Ok(self.remaining())
    }
}
