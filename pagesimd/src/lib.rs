//! # Paging Simulator Host
//!
//! This crate provides the bootstrap owner for a paging simulation.
//!
//! ## Philosophy
//!
//! - **Validate before starting**: A bad configuration never spawns a thread
//! - **Generate up front**: Every reference string exists before any workload runs
//! - **Deterministic when seeded**: A seed reproduces the same reference strings
//! - **Tear down once**: Completion, interrupt and failure share one shutdown path
//!
//! ## Responsibilities
//!
//! The host:
//! - Generates one reference string per workload
//! - Wires the memory manager, scheduler and workloads together
//! - Waits for completion, an interrupt or a service failure
//! - Returns the final per-workload totals
//!
//! ## Non-Responsibilities
//!
//! The host does NOT:
//! - Touch page tables or frames (the memory manager owns them)
//! - Decide who runs (the scheduler does)

pub mod config;
pub mod reference;
pub mod runtime;

pub use config::{
    ConfigError, SimConfig, DEFAULT_ILLEGAL_PROBABILITY, MAX_ADDRESS_SPACE, MAX_WORKLOADS,
};
pub use reference::ReferenceGenerator;
pub use runtime::{
    InterruptHandle, RunOutcome, RuntimeError, ServiceFailure, SimRuntime, SimulationReport,
};
