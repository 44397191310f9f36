//! # Diagnostics Service
//!
//! This crate implements the simulator's diagnostic stream.
//!
//! ## Philosophy
//!
//! Diagnostics are explicit and structured, not text-based or printf-style.
//! The memory manager emits one [`DiagnosticEvent`] per observable step, in
//! strict global order, and hands it to a [`DiagnosticSink`]. Formatting to
//! text happens only at the edge (the [`LogSink`] or the trace file).

pub mod sink;

pub use sink::{DiagnosticSink, FanoutSink, JsonLinesSink, LogSink, MemorySink};

use core_types::{FrameId, PageAccess, PageNumber, WorkloadId};
use log::Level;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A structured diagnostic event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// A request was taken off the memory manager's queue
    Reference {
        sequence: u64,
        workload: WorkloadId,
        access: PageAccess,
    },
    /// A legal reference missed
    PageFault {
        sequence: u64,
        workload: WorkloadId,
        page: PageNumber,
    },
    /// A faulting page was given a frame, possibly by evicting another page
    FrameAssigned {
        sequence: u64,
        workload: WorkloadId,
        page: PageNumber,
        frame: FrameId,
        evicted: Option<PageNumber>,
    },
    /// No free frame and nothing of the workload's own to evict
    NoVictim {
        sequence: u64,
        workload: WorkloadId,
        page: PageNumber,
    },
    /// A reference outside the workload's declared range
    IllegalAccess {
        sequence: u64,
        workload: WorkloadId,
        page: PageNumber,
    },
    /// A workload's slot was released
    Terminated {
        sequence: u64,
        workload: WorkloadId,
        frames_released: usize,
    },
    /// A request the memory manager cannot serve; it halts after this
    ProtocolViolation {
        sequence: u64,
        workload: WorkloadId,
        reason: String,
    },
    /// Final per-workload totals
    Totals {
        workload: WorkloadId,
        required_pages: u32,
        faults: u64,
        illegal: u64,
        hits: u64,
    },
}

impl DiagnosticEvent {
    /// Severity used when forwarding to the `log` facade
    pub fn level(&self) -> Level {
        match self {
            DiagnosticEvent::Reference { .. } | DiagnosticEvent::FrameAssigned { .. } => {
                Level::Debug
            }
            DiagnosticEvent::PageFault { .. }
            | DiagnosticEvent::Terminated { .. }
            | DiagnosticEvent::Totals { .. } => Level::Info,
            DiagnosticEvent::NoVictim { .. } | DiagnosticEvent::IllegalAccess { .. } => {
                Level::Warn
            }
            DiagnosticEvent::ProtocolViolation { .. } => Level::Error,
        }
    }

    /// Global sequence number, if the event came from a processed request
    pub fn sequence(&self) -> Option<u64> {
        match self {
            DiagnosticEvent::Reference { sequence, .. }
            | DiagnosticEvent::PageFault { sequence, .. }
            | DiagnosticEvent::FrameAssigned { sequence, .. }
            | DiagnosticEvent::NoVictim { sequence, .. }
            | DiagnosticEvent::IllegalAccess { sequence, .. }
            | DiagnosticEvent::Terminated { sequence, .. }
            | DiagnosticEvent::ProtocolViolation { sequence, .. } => Some(*sequence),
            DiagnosticEvent::Totals { .. } => None,
        }
    }

    /// The workload the event is about
    pub fn workload(&self) -> WorkloadId {
        match self {
            DiagnosticEvent::Reference { workload, .. }
            | DiagnosticEvent::PageFault { workload, .. }
            | DiagnosticEvent::FrameAssigned { workload, .. }
            | DiagnosticEvent::NoVictim { workload, .. }
            | DiagnosticEvent::IllegalAccess { workload, .. }
            | DiagnosticEvent::Terminated { workload, .. }
            | DiagnosticEvent::ProtocolViolation { workload, .. }
            | DiagnosticEvent::Totals { workload, .. } => *workload,
        }
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticEvent::Reference {
                sequence,
                workload,
                access,
            } => write!(
                f,
                "Global ordering - (Timestamp {}, {}, {})",
                sequence, workload, access
            ),
            DiagnosticEvent::PageFault { workload, page, .. } => {
                write!(f, "Page fault sequence - ({}, Page {})", workload, page)
            }
            DiagnosticEvent::FrameAssigned {
                workload,
                page,
                frame,
                evicted,
                ..
            } => match evicted {
                Some(victim) => write!(
                    f,
                    "{} assigned to ({}, Page {}) after evicting Page {}",
                    frame, workload, page, victim
                ),
                None => write!(f, "{} assigned to ({}, Page {})", frame, workload, page),
            },
            DiagnosticEvent::NoVictim { workload, page, .. } => write!(
                f,
                "No page available for LRU replacement - ({}, Page {})",
                workload, page
            ),
            DiagnosticEvent::IllegalAccess { workload, page, .. } => {
                write!(f, "Invalid Page Reference - ({}, Page {})", workload, page)
            }
            DiagnosticEvent::Terminated {
                workload,
                frames_released,
                ..
            } => write!(
                f,
                "{} terminated, {} frame(s) released",
                workload, frames_released
            ),
            DiagnosticEvent::ProtocolViolation {
                workload, reason, ..
            } => write!(f, "Protocol violation from {}: {}", workload, reason),
            DiagnosticEvent::Totals {
                workload,
                faults,
                illegal,
                ..
            } => write!(
                f,
                "=> {}: page faults {}, invalid page references {}",
                workload, faults, illegal
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault() -> DiagnosticEvent {
        DiagnosticEvent::PageFault {
            sequence: 3,
            workload: WorkloadId::new(0),
            page: 2,
        }
    }

    #[test]
    fn test_levels() {
        assert_eq!(fault().level(), Level::Info);
        let illegal = DiagnosticEvent::IllegalAccess {
            sequence: 1,
            workload: WorkloadId::new(0),
            page: 9,
        };
        assert_eq!(illegal.level(), Level::Warn);
        let violation = DiagnosticEvent::ProtocolViolation {
            sequence: 1,
            workload: WorkloadId::new(5),
            reason: "unknown".to_string(),
        };
        assert_eq!(violation.level(), Level::Error);
    }

    #[test]
    fn test_sequence_and_workload() {
        assert_eq!(fault().sequence(), Some(3));
        assert_eq!(fault().workload(), WorkloadId::new(0));
        let totals = DiagnosticEvent::Totals {
            workload: WorkloadId::new(1),
            required_pages: 3,
            faults: 4,
            illegal: 0,
            hits: 4,
        };
        assert_eq!(totals.sequence(), None);
    }

    #[test]
    fn test_display_matches_trace_format() {
        let reference = DiagnosticEvent::Reference {
            sequence: 12,
            workload: WorkloadId::new(1),
            access: PageAccess::Reference(4),
        };
        assert_eq!(
            format!("{}", reference),
            "Global ordering - (Timestamp 12, Workload(2), page 4)"
        );
        assert_eq!(
            format!("{}", fault()),
            "Page fault sequence - (Workload(1), Page 2)"
        );
    }

    #[test]
    fn test_json_is_tagged() {
        let json = serde_json::to_value(fault()).unwrap();
        assert_eq!(json["event"], "page_fault");
        assert_eq!(json["page"], 2);
        let back: DiagnosticEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, fault());
    }
}
