//! Crate-level error type for the inbound driver.
//!
//! Blocking I/O seams report [`std::io::Error`]; outbound failures are
//! described by [`OutboundError`](crate::outbound::OutboundError) inside
//! those errors. [`BridgeError`] covers the asynchronous side, where a
//! fragment stream is pumped through the assembler.

use std::io;

use thiserror::Error;

use crate::assembler::AssemblyError;

/// Failure ending an [`InboundDriver`](crate::driver::InboundDriver) run.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The fragment stream reported a transport error.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// A fragment violated the message grammar.
    #[error("protocol error: {0}")]
    Assembly(#[from] AssemblyError),
    /// The receiver of assembled requests was dropped.
    #[error("request dispatch queue closed")]
    DispatchClosed,
}

impl BridgeError {
    /// Whether the error was caused by the peer rather than by local
    /// processing.
    #[must_use]
    pub const fn is_remote(&self) -> bool { matches!(self, Self::Io(_) | Self::Assembly(_)) }
}

/// Result alias for driver operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
