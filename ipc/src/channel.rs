//! Channel abstraction for message passing
//!
//! Every protocol edge is a typed, addressed channel. A workload owns the
//! receiving end of its own reply channel and its own grant channel, so a
//! message can never be delivered to the wrong workload.

use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a communication channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(Uuid);

impl ChannelId {
    /// Creates a new random channel ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({})", self.0)
    }
}

/// Delivery failures
///
/// Delivery is assumed reliable, so a disconnected peer always means the
/// other side has exited. Callers treat this as fatal.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum IpcError {
    /// The receiving end is gone
    #[error("send on {0} failed: receiver disconnected")]
    SendDisconnected(ChannelId),

    /// Every sending end is gone
    #[error("receive on {0} failed: all senders disconnected")]
    RecvDisconnected(ChannelId),

    /// Receive deadline elapsed
    #[error("receive on {0} timed out")]
    Timeout(ChannelId),
}

/// Sending end of a typed channel
#[derive(Debug)]
pub struct Sender<T> {
    id: ChannelId,
    inner: crossbeam_channel::Sender<T>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: self.inner.clone(),
        }
    }
}

impl<T> Sender<T> {
    /// Returns the channel ID
    pub fn channel_id(&self) -> ChannelId {
        self.id
    }

    /// Sends a message without blocking (channels are unbounded unless
    /// created with [`bounded`])
    pub fn send(&self, message: T) -> Result<(), IpcError> {
        self.inner
            .send(message)
            .map_err(|_| IpcError::SendDisconnected(self.id))
    }
}

/// Receiving end of a typed channel
///
/// Clones compete for messages; each message is delivered once.
#[derive(Debug)]
pub struct Receiver<T> {
    id: ChannelId,
    inner: crossbeam_channel::Receiver<T>,
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: self.inner.clone(),
        }
    }
}

impl<T> Receiver<T> {
    /// Returns the channel ID
    pub fn channel_id(&self) -> ChannelId {
        self.id
    }

    /// Blocks until a message arrives
    pub fn recv(&self) -> Result<T, IpcError> {
        self.inner
            .recv()
            .map_err(|_| IpcError::RecvDisconnected(self.id))
    }

    /// Blocks until a message arrives or the timeout elapses
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, IpcError> {
        self.inner.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => IpcError::Timeout(self.id),
            RecvTimeoutError::Disconnected => IpcError::RecvDisconnected(self.id),
        })
    }

    /// Returns a pending message, if any
    pub fn try_recv(&self) -> Result<Option<T>, IpcError> {
        match self.inner.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(IpcError::RecvDisconnected(self.id)),
        }
    }

    /// Underlying receiver, for use with `crossbeam_channel::select!`
    pub fn as_select_source(&self) -> &crossbeam_channel::Receiver<T> {
        &self.inner
    }
}

/// Creates an unbounded channel
pub fn unbounded<T>() -> (Sender<T>, Receiver<T>) {
    let id = ChannelId::new();
    let (tx, rx) = crossbeam_channel::unbounded();
    (Sender { id, inner: tx }, Receiver { id, inner: rx })
}

/// Creates a channel holding at most `capacity` messages
pub fn bounded<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let id = ChannelId::new();
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (Sender { id, inner: tx }, Receiver { id, inner: rx })
}
