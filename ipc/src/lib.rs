//! # Inter-Process Communication (IPC)
//!
//! This crate defines the paging simulator's message-passing primitives.
//!
//! ## Philosophy
//!
//! - **Messages, not shared memory**: Workloads never touch the page store;
//!   they learn its state only through replies.
//! - **Typed, not stringly-typed**: Each protocol edge carries its own
//!   message type.
//! - **Addressed by handle**: Each workload has its own reply and grant
//!   channel instead of a type-as-address mailbox.
//!
//! ## Protocol
//!
//! ```text
//! Workload --PageRequest--> MemoryManager --PageReply--> Workload
//!                                 |
//!                           SchedulerNotice
//!                                 v
//! Workload --Arrived-->       Scheduler --Grant--> Workload
//!                                 |
//!                             Completion
//!                                 v
//!                           bootstrap owner
//! ```

pub mod channel;
pub mod message;

pub use channel::{bounded, unbounded, ChannelId, IpcError, Receiver, Sender};
pub use message::{
    Completion, Grant, MmuRequest, PageReply, PageRequest, SchedulerEvent, SchedulerNotice,
};
