//! # Simulation Runtime
//!
//! Bootstraps a run: generates reference strings, wires the channels, starts
//! the memory manager, the scheduler and every workload on their own threads,
//! waits for the run to end, and tears everything down exactly once.
//!
//! A run ends on the first of:
//! - the scheduler's completion signal
//! - an interrupt delivered through an [`InterruptHandle`]
//! - a fatal failure reported by any service thread

use crate::config::{ConfigError, SimConfig};
use crate::reference::ReferenceGenerator;
use core_types::{ReferenceString, RunId, WorkloadId};
use crossbeam_channel::select;
use ipc::{
    bounded, unbounded, Completion, IpcError, MmuRequest, Receiver, SchedulerEvent, Sender,
};
use serde::{Deserialize, Serialize};
use services_diagnostics::{FanoutSink, JsonLinesSink, LogSink, MemorySink};
use services_memory_manager::{MemoryManager, MemoryManagerService, MemoryReport, MmuError};
use services_scheduler::{Scheduler, SchedulerError};
use services_workload::{Workload, WorkloadError, WorkloadSummary};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// Runtime error types
///
/// These stop a run from starting or from being torn down cleanly. Failures
/// of a running service are reported in [`RunOutcome::Failed`] instead.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot open trace file {path}: {source}")]
    Trace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Setup error: {0}")]
    Setup(#[from] MmuError),

    #[error("Failed to spawn {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("{0} thread panicked")]
    Panicked(String),
}

/// A fatal error raised on a service thread
#[derive(Debug, Error)]
pub enum ServiceFailure {
    #[error("memory manager: {0}")]
    MemoryManager(MmuError),

    #[error("scheduler: {0}")]
    Scheduler(SchedulerError),

    #[error("{0}: {1}")]
    Workload(WorkloadId, WorkloadError),
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// Every workload terminated
    Completed(Completion),
    /// The run was interrupted before completion
    Interrupted,
    /// A service failed
    Failed(String),
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed(c) => write!(
                f,
                "completed: {} workload(s) terminated after {} grant(s)",
                c.terminated, c.grants
            ),
            RunOutcome::Interrupted => write!(f, "interrupted"),
            RunOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub run_id: RunId,
    pub outcome: RunOutcome,
    /// Reference strings, indexed by workload
    pub references: Vec<ReferenceString>,
    pub memory: MemoryReport,
    /// Workloads that ran to termination
    pub workloads: Vec<WorkloadSummary>,
}

impl SimulationReport {
    /// Checks if every workload terminated
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed(_))
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.run_id, self.outcome)?;
        write!(f, "{}", self.memory)
    }
}

/// Requests an orderly stop of a running simulation
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: Sender<()>,
}

impl InterruptHandle {
    /// Asks the runtime to stop; later calls are no-ops
    pub fn interrupt(&self) {
        if self.tx.send(()).is_err() {
            log::debug!("interrupt after the run already ended");
        }
    }
}

/// Simulation runtime
pub struct SimRuntime {
    config: SimConfig,
    run_id: RunId,
    diagnostics: MemorySink,
    interrupt_tx: Sender<()>,
    interrupt_rx: Receiver<()>,
}

impl SimRuntime {
    /// Creates a runtime for a validated configuration
    pub fn new(config: SimConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let (interrupt_tx, interrupt_rx) = unbounded();
        Ok(Self {
            config,
            run_id: RunId::new(),
            diagnostics: MemorySink::new(),
            interrupt_tx,
            interrupt_rx,
        })
    }

    /// Returns the run ID
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns the configuration
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Handle for stopping the run from another thread or a signal handler
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            tx: self.interrupt_tx.clone(),
        }
    }

    /// Shared recorder of the diagnostic stream
    pub fn diagnostics(&self) -> MemorySink {
        self.diagnostics.clone()
    }

    /// Runs the simulation with freshly generated reference strings
    pub fn run(self) -> Result<SimulationReport, RuntimeError> {
        let references =
            ReferenceGenerator::new(&self.config).generate_all(self.config.workloads);
        self.run_with(references)
    }

    /// Runs the simulation with the given reference strings, one workload
    /// per string
    pub fn run_with(
        self,
        references: Vec<ReferenceString>,
    ) -> Result<SimulationReport, RuntimeError> {
        log::info!(
            "{} starting: {} workload(s), {} virtual page(s), {} frame(s)",
            self.run_id,
            references.len(),
            self.config.address_space,
            self.config.frames
        );

        let mut sink = FanoutSink::new()
            .with_sink(LogSink::default())
            .with_sink(self.diagnostics.clone());
        if let Some(path) = &self.config.trace_path {
            let trace = JsonLinesSink::create(path).map_err(|source| RuntimeError::Trace {
                path: path.clone(),
                source,
            })?;
            sink = sink.with_sink(trace);
        }

        let (mmu_tx, mmu_rx) = unbounded::<MmuRequest>();
        let (sched_tx, sched_rx) = unbounded::<SchedulerEvent>();
        let (completion_tx, completion_rx) = bounded::<Completion>(1);
        let (failure_tx, failure_rx) = unbounded::<ServiceFailure>();
        // Never written to; closing it releases workloads still waiting to start.
        let (start_gate, start_rx) = unbounded::<()>();

        let mmu = MemoryManager::new(self.config.frames, Box::new(sink));
        let mut service = MemoryManagerService::new(mmu, mmu_rx, sched_tx.clone());
        let mut scheduler = Scheduler::new();
        let mut workloads = Vec::with_capacity(references.len());

        for (index, refs) in references.iter().enumerate() {
            let id = WorkloadId::new(index as u32);
            let (reply_tx, reply_rx) = unbounded();
            let (grant_tx, grant_rx) = unbounded();
            service.register_workload(id, refs.required_pages(), reply_tx)?;
            scheduler.register_workload(id, grant_tx);
            workloads.push(Workload::new(
                id,
                refs.clone(),
                mmu_tx.clone(),
                sched_tx.clone(),
                reply_rx,
                grant_rx,
            ));
        }

        let mmu_handle = {
            let failures = failure_tx.clone();
            spawn("pagesim-mmu", move || {
                if let Err(e) = service.run() {
                    report_failure(&failures, ServiceFailure::MemoryManager(e));
                }
                service.report()
            })?
        };

        let scheduler_handle = {
            let failures = failure_tx.clone();
            spawn("pagesim-scheduler", move || {
                if let Err(e) = scheduler.run(&sched_rx, &completion_tx) {
                    report_failure(&failures, ServiceFailure::Scheduler(e));
                }
            })?
        };

        let mut workload_handles = Vec::with_capacity(workloads.len());
        for (index, workload) in workloads.into_iter().enumerate() {
            let failures = failure_tx.clone();
            let gate = start_rx.clone();
            let delay = self.config.stagger * index as u32;
            let id = workload.id();
            let handle = spawn(&format!("pagesim-{}", id), move || {
                if !wait_to_start(&gate, delay) {
                    log::debug!("{} never started", id);
                    return None;
                }
                match workload.run() {
                    Ok(summary) => Some(summary),
                    Err(e) => {
                        report_failure(&failures, ServiceFailure::Workload(id, e));
                        None
                    }
                }
            })?;
            workload_handles.push(handle);
        }

        let outcome = self.wait(&completion_rx, &failure_rx);
        match &outcome {
            RunOutcome::Completed(_) => log::info!("{} completed", self.run_id),
            RunOutcome::Interrupted => log::warn!("{} interrupted", self.run_id),
            RunOutcome::Failed(reason) => log::error!("{} failed: {}", self.run_id, reason),
        }

        // Teardown. Either service may already have stopped on its own.
        if mmu_tx.send(MmuRequest::Shutdown).is_err() {
            log::debug!("memory manager already stopped");
        }
        if sched_tx.send(SchedulerEvent::Shutdown).is_err() {
            log::debug!("scheduler already stopped");
        }
        drop(mmu_tx);
        drop(sched_tx);
        drop(start_gate);

        let memory = join("memory manager", mmu_handle)?;
        join("scheduler", scheduler_handle)?;

        // Workloads still waiting exit once their peers are gone.
        let mut summaries = Vec::new();
        for handle in workload_handles {
            if let Some(summary) = join("workload", handle)? {
                summaries.push(summary);
            }
        }

        Ok(SimulationReport {
            run_id: self.run_id,
            outcome,
            references,
            memory,
            workloads: summaries,
        })
    }

    fn wait(
        &self,
        completion: &Receiver<Completion>,
        failures: &Receiver<ServiceFailure>,
    ) -> RunOutcome {
        select! {
            recv(completion.as_select_source()) -> signal => match signal {
                Ok(signal) => RunOutcome::Completed(signal),
                // The scheduler gave up; its reason is already queued.
                Err(_) => match failures.try_recv() {
                    Ok(Some(failure)) => RunOutcome::Failed(failure.to_string()),
                    _ => RunOutcome::Failed("scheduler stopped without completing".to_string()),
                },
            },
            recv(self.interrupt_rx.as_select_source()) -> _ => RunOutcome::Interrupted,
            recv(failures.as_select_source()) -> failure => match failure {
                Ok(failure) => RunOutcome::Failed(failure.to_string()),
                Err(_) => RunOutcome::Failed("every service exited".to_string()),
            },
        }
    }
}

fn spawn<T, F>(name: &str, f: F) -> Result<JoinHandle<T>, RuntimeError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|source| RuntimeError::Spawn {
            name: name.to_string(),
            source,
        })
}

fn join<T>(name: &str, handle: JoinHandle<T>) -> Result<T, RuntimeError> {
    handle
        .join()
        .map_err(|_| RuntimeError::Panicked(name.to_string()))
}

/// Sleeps for `delay` unless the gate closes first
fn wait_to_start(gate: &Receiver<()>, delay: Duration) -> bool {
    delay.is_zero() || matches!(gate.recv_timeout(delay), Err(IpcError::Timeout(_)))
}

fn report_failure(failures: &Sender<ServiceFailure>, failure: ServiceFailure) {
    log::debug!("service failure: {}", failure);
    if failures.send(failure).is_err() {
        log::debug!("failure reported after the run ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use services_diagnostics::DiagnosticEvent;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_runtime_creation() {
        let runtime = SimRuntime::new(SimConfig::new(2, 4, 2)).unwrap();
        assert_eq!(runtime.config().workloads, 2);
        assert!(runtime.diagnostics().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = SimRuntime::new(SimConfig::new(1, 4, 0));
        assert!(matches!(
            result,
            Err(RuntimeError::Config(ConfigError::NoFrames))
        ));
    }

    #[test]
    fn test_run_with_fixed_strings() {
        let runtime = SimRuntime::new(SimConfig::new(2, 4, 2)).unwrap();
        let diagnostics = runtime.diagnostics();
        let run_id = runtime.run_id();

        let report = runtime
            .run_with(vec![
                ReferenceString::new(3, vec![0, 1, 2, 0]),
                ReferenceString::new(2, vec![5]),
            ])
            .unwrap();

        assert_eq!(report.run_id, run_id);
        assert!(report.is_completed());
        assert_eq!(report.workloads.len(), 2);
        assert!(!report.memory.halted);
        assert_eq!(report.memory.free_frames, 2);
        assert_eq!(report.memory.total_illegal(), 1);
        assert!(report.memory.slots.iter().all(|s| s.terminated));

        let totals = diagnostics
            .events()
            .into_iter()
            .filter(|e| matches!(e, DiagnosticEvent::Totals { .. }))
            .count();
        assert_eq!(totals, 2);
    }

    #[test]
    fn test_interrupt_before_any_workload_runs() {
        // The second workload is held back far longer than the test runs,
        // so the run cannot complete before the interrupt is seen.
        let config = SimConfig::new(2, 4, 2).with_stagger(Duration::from_secs(600));
        let runtime = SimRuntime::new(config).unwrap();
        runtime.interrupt_handle().interrupt();

        let report = runtime
            .run_with(vec![ReferenceString::new(1, vec![0]); 2])
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::Interrupted);
        assert!(!report.is_completed());
        assert!(!report.memory.halted);
        assert!(!report.memory.slot(WorkloadId::new(1)).unwrap().terminated);
    }

    #[test]
    fn test_trace_path_receives_every_event() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let config = SimConfig::new(1, 3, 1).with_trace_path(&path);
        let runtime = SimRuntime::new(config).unwrap();
        let diagnostics = runtime.diagnostics();

        let report = runtime
            .run_with(vec![ReferenceString::new(3, vec![0, 1, 0])])
            .unwrap();
        assert!(report.is_completed());

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), diagnostics.len());
        assert!(text.lines().last().unwrap().contains("\"event\":\"totals\""));
    }

}
