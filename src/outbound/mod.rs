//! Outbound half of the bridge: blocking writes to asynchronous frames.
//!
//! A processing layer writes response bytes through an [`OutboundStream`],
//! which implements [`std::io::Write`]. Bytes accumulate until the configured
//! [`FlushThreshold`] is reached, are wrapped by a
//! [`BufferFactory`](crate::buffer::BufferFactory) into content frames, and
//! are handed to a [`ChannelWriteGate`]. The gate owns a single driver task
//! on the tokio runtime that submits frames to the [`OutboundChannel`] one at
//! a time and records the first failure so the next blocking call can report
//! it.
//!
//! ```text
//! worker thread                     runtime
//! ─────────────                     ───────
//! OutboundStream::write ──queue──▶ gate driver ──submit──▶ OutboundChannel
//!        ▲                               │
//!        └──── recorded failure ◀────────┘
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod gate;
pub mod stream;

use std::fmt;

pub use channel::{MpscChannel, OutboundChannel};
pub use config::{DEFAULT_QUEUE_CAPACITY, FlushThreshold, OutboundConfig};
pub use error::{ChannelFailure, OutboundError};
pub use gate::ChannelWriteGate;
pub use stream::OutboundStream;

use crate::buffer::FrameBuffer;

/// Message submitted to the outbound channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A chunk of body bytes.
    Content(FrameBuffer),
    /// Marks the end of the outbound stream. Exactly one is emitted per
    /// stream and nothing follows it.
    Last,
}

impl OutboundFrame {
    /// Whether this is the end-of-stream sentinel.
    #[must_use]
    pub const fn is_last(&self) -> bool { matches!(self, Self::Last) }

    /// Payload carried by a content frame.
    #[must_use]
    pub const fn payload(&self) -> Option<&FrameBuffer> {
        match self {
            Self::Content(buf) => Some(buf),
            Self::Last => None,
        }
    }

    /// Number of payload bytes carried by the frame.
    #[must_use]
    pub fn len(&self) -> usize { self.payload().map_or(0, FrameBuffer::len) }

    /// Whether the frame carries no payload bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Blocking operation that observed an outbound failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Write,
    Flush,
    Close,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Write => "write",
            Self::Flush => "flush",
            Self::Close => "close",
        })
    }
}
