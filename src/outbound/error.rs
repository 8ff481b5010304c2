//! Error types for the outbound adapter and its write gate.
//!
//! Every variant names the blocking [`Operation`] that observed it so the
//! caller can tell whether a `write`, `flush` or `close` tripped over the
//! failure. Errors leave the adapter as [`io::Error`] values wrapping an
//! [`OutboundError`], recoverable through [`io::Error::get_ref`].

use std::io;

use thiserror::Error;

use super::Operation;

/// Record of the first asynchronous submission failure on a channel.
///
/// [`io::Error`] is not `Clone`, so the gate keeps the kind and message and
/// rebuilds an error for every call that reports the failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ChannelFailure {
    kind: io::ErrorKind,
    message: String,
}

impl ChannelFailure {
    /// Capture the kind and message of `error`.
    #[must_use]
    pub fn from_io(error: &io::Error) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// Kind of the original error.
    #[must_use]
    pub const fn kind(&self) -> io::ErrorKind { self.kind }

    /// Message of the original error.
    #[must_use]
    pub fn message(&self) -> &str { &self.message }
}

/// Errors surfaced by [`OutboundStream`](super::OutboundStream).
#[derive(Debug, Error)]
pub enum OutboundError {
    /// The stream has already been closed.
    #[error("{operation} on closed outbound stream")]
    Closed { operation: Operation },
    /// A previously submitted frame failed on the channel.
    #[error("{operation} failed: channel write error: {failure}")]
    ChannelFailed {
        operation: Operation,
        #[source]
        failure: ChannelFailure,
    },
    /// The channel reported itself closed before submission.
    #[error("{operation} failed: channel is closed")]
    ChannelClosed { operation: Operation },
    /// The gate's driver task is no longer running.
    #[error("{operation} failed: write gate has shut down")]
    GateShutDown { operation: Operation },
    /// The buffer factory refused to wrap the accumulated bytes.
    #[error("{operation} failed: buffer factory error: {source}")]
    BufferFactory {
        operation: Operation,
        #[source]
        source: io::Error,
    },
}

impl OutboundError {
    /// Operation during which the error was observed.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Closed { operation }
            | Self::ChannelFailed { operation, .. }
            | Self::ChannelClosed { operation }
            | Self::GateShutDown { operation }
            | Self::BufferFactory { operation, .. } => *operation,
        }
    }

    /// Whether the error reports use of an already closed stream.
    #[must_use]
    pub const fn is_closed(&self) -> bool { matches!(self, Self::Closed { .. }) }

    fn kind(&self) -> io::ErrorKind {
        match self {
            Self::Closed { .. } => io::ErrorKind::Other,
            Self::ChannelFailed { failure, .. } => failure.kind(),
            Self::ChannelClosed { .. } | Self::GateShutDown { .. } => io::ErrorKind::BrokenPipe,
            Self::BufferFactory { source, .. } => source.kind(),
        }
    }
}

impl From<OutboundError> for io::Error {
    fn from(error: OutboundError) -> Self { io::Error::new(error.kind(), error) }
}
