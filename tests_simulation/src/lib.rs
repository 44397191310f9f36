//! Simulation Test Utilities
//!
//! This crate provides shared utilities for end-to-end simulation tests.
//!
//! ## Test Philosophy
//!
//! - **Observe from the outside**: Tests check the final report and the
//!   diagnostic stream, never service internals
//! - **Replay the trace**: Frame ownership is rebuilt from the diagnostic
//!   stream and checked after every event
//! - **Seeded**: Generated runs use fixed seeds so failures reproduce

use core_types::{FrameId, PageNumber, ReferenceString, WorkloadId};
use pagesimd::{SimConfig, SimRuntime, SimulationReport};
use services_diagnostics::DiagnosticEvent;
use std::collections::BTreeMap;

/// Seeded configuration with no stagger
pub fn test_config(workloads: u32, address_space: u32, frames: u32, seed: u64) -> SimConfig {
    SimConfig::new(workloads, address_space, frames).with_seed(seed)
}

/// Runs a configuration and returns the report with the diagnostic stream
pub fn run(config: SimConfig) -> (SimulationReport, Vec<DiagnosticEvent>) {
    let runtime = SimRuntime::new(config).expect("valid config");
    let diagnostics = runtime.diagnostics();
    let report = runtime.run().expect("run finishes");
    (report, diagnostics.events())
}

/// Runs fixed reference strings over `frames` frames
pub fn run_strings(
    frames: u32,
    references: Vec<ReferenceString>,
) -> (SimulationReport, Vec<DiagnosticEvent>) {
    let address_space = references
        .iter()
        .map(|r| r.required_pages())
        .max()
        .unwrap_or(1);
    let config = SimConfig::new(references.len() as u32, address_space, frames);
    let runtime = SimRuntime::new(config).expect("valid config");
    let diagnostics = runtime.diagnostics();
    let report = runtime.run_with(references).expect("run finishes");
    (report, diagnostics.events())
}

/// Checks `faults + illegal + hits == requests` for every workload
pub fn check_accounting(report: &SimulationReport) -> Result<(), String> {
    for slot in &report.memory.slots {
        let served = slot.faults + slot.illegal + slot.hits;
        if served != slot.requests {
            return Err(format!(
                "{}: {} faults + {} illegal + {} hits != {} requests",
                slot.workload, slot.faults, slot.illegal, slot.hits, slot.requests
            ));
        }
    }
    Ok(())
}

/// Replays frame assignments and releases from the diagnostic stream
///
/// Fails if a frame is handed out while owned by someone else, if an eviction
/// names a page that did not own the frame, or if a release count disagrees
/// with the replayed ownership.
pub fn check_frame_ownership(events: &[DiagnosticEvent]) -> Result<(), String> {
    let mut owners: BTreeMap<FrameId, (WorkloadId, PageNumber)> = BTreeMap::new();

    for event in events {
        match event {
            DiagnosticEvent::FrameAssigned {
                sequence,
                workload,
                page,
                frame,
                evicted,
            } => {
                let current = owners.get(frame).copied();
                let expected = evicted.map(|victim| (*workload, victim));
                if current != expected {
                    return Err(format!(
                        "#{}: {} assigned to {} page {} but owned by {:?}",
                        sequence, frame, workload, page, current
                    ));
                }
                owners.insert(*frame, (*workload, *page));
            }
            DiagnosticEvent::Terminated {
                sequence,
                workload,
                frames_released,
            } => {
                let before = owners.len();
                owners.retain(|_, (owner, _)| owner != workload);
                let released = before - owners.len();
                if released != *frames_released {
                    return Err(format!(
                        "#{}: {} released {} frame(s), replay says {}",
                        sequence, workload, frames_released, released
                    ));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Sequence numbers of processed references, in stream order
pub fn reference_sequences(events: &[DiagnosticEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            DiagnosticEvent::Reference { sequence, .. } => Some(*sequence),
            _ => None,
        })
        .collect()
}
