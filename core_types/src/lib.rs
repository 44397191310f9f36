//! # Core Types
//!
//! This crate defines the fundamental types used throughout the paging
//! simulator.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: Workloads, frames and runs have distinct id
//!   types and cannot be confused.
//! - **Type safety first**: The terminate sentinel is an enum variant, not a
//!   magic page number.
//!
//! ## Key Types
//!
//! - [`WorkloadId`]: Identifier for a simulated process
//! - [`FrameId`]: Identifier for a physical frame
//! - [`RunId`]: Identifier for one simulation run
//! - [`PageAccess`]: A page reference or the terminate sentinel
//! - [`ReferenceString`]: A workload's immutable sequence of page references

pub mod ids;
pub mod memory;

pub use ids::{FrameId, RunId, WorkloadId};
pub use memory::{PageAccess, PageNumber, ReferenceString};
