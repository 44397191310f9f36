//! The memory manager's message loop
//!
//! One inbound queue, drained one request at a time. Replies go out on the
//! requesting workload's own channel; admission transitions go to the
//! scheduler. The reply is always sent before the scheduler notice, so a
//! re-admitted workload has already seen its `Fault`.

use crate::{MemoryManager, MemoryReport, MmuError};
use core_types::WorkloadId;
use ipc::{MmuRequest, PageReply, PageRequest, Receiver, SchedulerEvent, Sender};
use std::collections::HashMap;

/// A [`MemoryManager`] wired to its channels
pub struct MemoryManagerService {
    mmu: MemoryManager,
    requests: Receiver<MmuRequest>,
    scheduler: Sender<SchedulerEvent>,
    replies: HashMap<WorkloadId, Sender<PageReply>>,
}

impl MemoryManagerService {
    /// Creates the service
    pub fn new(
        mmu: MemoryManager,
        requests: Receiver<MmuRequest>,
        scheduler: Sender<SchedulerEvent>,
    ) -> Self {
        Self {
            mmu,
            requests,
            scheduler,
            replies: HashMap::new(),
        }
    }

    /// Creates a slot for `workload` and records its reply channel
    pub fn register_workload(
        &mut self,
        workload: WorkloadId,
        required_pages: u32,
        reply: Sender<PageReply>,
    ) -> Result<(), MmuError> {
        self.mmu.register_workload(workload, required_pages)?;
        self.replies.insert(workload, reply);
        Ok(())
    }

    /// Serves requests until `Shutdown` arrives
    ///
    /// Returns an error on a protocol violation or a delivery failure; the
    /// service does not answer anything after that.
    pub fn run(&mut self) -> Result<(), MmuError> {
        log::info!(
            "memory manager serving {} workload(s) with {} frame(s)",
            self.mmu.store().len(),
            self.mmu.store().frames().capacity()
        );

        loop {
            match self.requests.recv()? {
                MmuRequest::Access(request) => self.serve(request)?,
                MmuRequest::Shutdown => {
                    log::info!(
                        "memory manager shutting down after {} request(s)",
                        self.mmu.tick()
                    );
                    return Ok(());
                }
            }
        }
    }

    /// Final totals; also emits them on the diagnostic stream
    pub fn report(&mut self) -> MemoryReport {
        self.mmu.report()
    }

    /// The wrapped state machine
    pub fn memory_manager(&self) -> &MemoryManager {
        &self.mmu
    }

    fn serve(&mut self, request: PageRequest) -> Result<(), MmuError> {
        let resolution = self.mmu.handle_request(request)?;

        if let Some(reply) = resolution.reply {
            let channel = self
                .replies
                .get(&request.workload)
                .ok_or(MmuError::UnknownWorkload(request.workload))?;
            channel.send(reply)?;
        }

        if let Some(notice) = resolution.notice {
            self.scheduler.send(notice.into())?;
        }

        Ok(())
    }
}
