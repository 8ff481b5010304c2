//! Blocking [`Write`] adapter over a [`ChannelWriteGate`].

use std::{
    io::{self, Write},
    sync::Arc,
};

use bytes::BytesMut;
use log::{debug, warn};
use tokio::runtime::Handle;

use super::{
    ChannelWriteGate,
    Operation,
    OutboundChannel,
    OutboundConfig,
    OutboundError,
    OutboundFrame,
};
use crate::buffer::{BufferFactory, ZeroCopy};

/// Progress of the stream towards its single end-of-stream frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CloseState {
    Open,
    /// The last frame is queued but its outcome has not been reported
    /// successfully yet.
    LastSubmitted,
    Closed,
}

/// Blocking output stream that submits its bytes as asynchronous frames.
///
/// `write`, `flush` and `close` run on the caller's thread and return once
/// frames are queued with the gate. Asynchronous submission failures are
/// reported by the next call. `close` additionally waits for every queued
/// frame to be processed so a failure of the tail frames is not lost.
///
/// All methods block and must therefore run outside the tokio runtime, for
/// example inside [`tokio::task::spawn_blocking`].
///
/// # Examples
///
/// ```
/// use std::{io::Write, sync::Arc};
///
/// use duplex_bridge::outbound::{MpscChannel, OutboundConfig, OutboundFrame, OutboundStream};
///
/// let runtime = tokio::runtime::Runtime::new().expect("runtime");
/// let (channel, mut rx) = MpscChannel::new(8);
/// let mut out = OutboundStream::new(Arc::new(channel), runtime.handle(), OutboundConfig::default());
///
/// out.write_all(b"hello").expect("write");
/// out.close().expect("close");
///
/// let first = rx.blocking_recv().expect("content frame");
/// assert_eq!(first.payload().map(|b| &b[..]), Some(&b"hello"[..]));
/// assert_eq!(rx.blocking_recv(), Some(OutboundFrame::Last));
/// ```
pub struct OutboundStream {
    gate: ChannelWriteGate,
    config: OutboundConfig,
    factory: Arc<dyn BufferFactory>,
    buffer: BytesMut,
    state: CloseState,
}

impl OutboundStream {
    /// Open a stream over `channel` using the zero-copy buffer factory.
    #[must_use]
    pub fn new(channel: Arc<dyn OutboundChannel>, runtime: &Handle, config: OutboundConfig) -> Self {
        Self::with_factory(channel, runtime, config, Arc::new(ZeroCopy))
    }

    /// Open a stream over `channel` wrapping flushed bytes with `factory`.
    #[must_use]
    pub fn with_factory(
        channel: Arc<dyn OutboundChannel>,
        runtime: &Handle,
        config: OutboundConfig,
        factory: Arc<dyn BufferFactory>,
    ) -> Self {
        let gate = ChannelWriteGate::spawn(channel, runtime, config.queue_capacity());
        Self {
            gate,
            config,
            factory,
            buffer: BytesMut::new(),
            state: CloseState::Open,
        }
    }

    /// Configuration the stream was opened with.
    #[must_use]
    pub const fn config(&self) -> &OutboundConfig { &self.config }

    /// Gate through which frames are submitted.
    #[must_use]
    pub const fn gate(&self) -> &ChannelWriteGate { &self.gate }

    /// Bytes written but not yet submitted.
    #[must_use]
    pub fn buffered(&self) -> usize { self.buffer.len() }

    /// Whether `close` has completed successfully.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.state == CloseState::Closed }

    fn ensure_open(&self, operation: Operation) -> Result<(), OutboundError> {
        match self.state {
            CloseState::Open => Ok(()),
            CloseState::LastSubmitted | CloseState::Closed => {
                Err(OutboundError::Closed { operation })
            }
        }
    }

    /// Submit the first `len` buffered bytes as a content frame.
    ///
    /// The bytes leave the buffer only once the factory has wrapped them; a
    /// rejected range is put back in front of the remaining bytes.
    fn emit_front(&mut self, len: usize, operation: Operation) -> Result<(), OutboundError> {
        let chunk = self.buffer.split_to(len);
        match self.factory.create(chunk) {
            Ok(frame) => self.gate.submit(OutboundFrame::Content(frame), operation),
            Err(error) => {
                let (mut chunk, source) = error.into_parts();
                chunk.unsplit(std::mem::take(&mut self.buffer));
                self.buffer = chunk;
                Err(OutboundError::BufferFactory { operation, source })
            }
        }
    }

    /// Submit everything currently buffered as a single frame.
    fn emit_buffered(&mut self, operation: Operation) -> Result<(), OutboundError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        if !self.gate.is_open() {
            return Err(OutboundError::ChannelClosed { operation });
        }
        self.emit_front(self.buffer.len(), operation)
    }

    /// Apply the implicit flush policy after a write, counting the bytes
    /// that left the buffer in `emitted`.
    fn drain_threshold(&mut self, emitted: &mut usize) -> Result<(), OutboundError> {
        let threshold = self.config.flush_threshold();
        if threshold.is_never() {
            return Ok(());
        }
        let size = match threshold.get() {
            0 => self.buffer.len(),
            size => size,
        };
        while size > 0 && self.buffer.len() >= size {
            if !self.gate.is_open() {
                return Err(OutboundError::ChannelClosed {
                    operation: Operation::Write,
                });
            }
            self.emit_front(size, Operation::Write)?;
            *emitted += size;
        }
        Ok(())
    }

    /// Buffer `buf` and apply the flush policy.
    ///
    /// When the policy fails part way, bytes of `buf` not yet carried by a
    /// submitted frame are removed from the buffer again. The call reports
    /// `Ok` with the count of `buf` bytes that were submitted, or the error
    /// when none were, so a retry never resends a byte.
    fn write_bytes(&mut self, buf: &[u8]) -> Result<usize, OutboundError> {
        self.ensure_open(Operation::Write)?;
        self.gate.check(Operation::Write)?;
        let before = self.buffer.len();
        self.buffer.extend_from_slice(buf);
        let mut emitted = 0;
        match self.drain_threshold(&mut emitted) {
            Ok(()) => Ok(buf.len()),
            Err(error) => {
                self.buffer.truncate(before.saturating_sub(emitted));
                let accepted = emitted.saturating_sub(before);
                if accepted == 0 {
                    return Err(error);
                }
                debug!("short write of {accepted} of {} bytes: {error}", buf.len());
                Ok(accepted)
            }
        }
    }

    fn flush_bytes(&mut self) -> Result<(), OutboundError> {
        self.ensure_open(Operation::Flush)?;
        self.gate.check(Operation::Flush)?;
        self.emit_buffered(Operation::Flush)
    }

    fn close_stream(&mut self) -> Result<(), OutboundError> {
        match self.state {
            CloseState::Closed => return Ok(()),
            CloseState::LastSubmitted => {}
            CloseState::Open => {
                self.gate.check(Operation::Close)?;
                self.emit_buffered(Operation::Close)?;
                self.gate.submit(OutboundFrame::Last, Operation::Close)?;
                self.state = CloseState::LastSubmitted;
                if self.config.close_channel() {
                    self.gate.close_channel(Operation::Close)?;
                }
            }
        }
        self.gate.barrier(Operation::Close)?;
        self.gate.check(Operation::Close)?;
        self.state = CloseState::Closed;
        debug!("outbound stream closed");
        Ok(())
    }

    /// Flush remaining bytes, submit the end-of-stream frame and wait for
    /// the channel to process everything queued.
    ///
    /// Calling `close` again after it succeeded does nothing. If the end
    /// frame was queued but a failure was reported, later calls report the
    /// failure again without queuing another end frame.
    ///
    /// # Errors
    ///
    /// Returns an error if a channel failure was recorded, the channel is
    /// closed, the buffer factory fails or the gate has shut down.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn close(&mut self) -> io::Result<()> { Ok(self.close_stream()?) }
}

impl Write for OutboundStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { Ok(self.write_bytes(buf)?) }

    fn flush(&mut self) -> io::Result<()> { Ok(self.flush_bytes()?) }
}

impl Drop for OutboundStream {
    fn drop(&mut self) {
        if self.state == CloseState::Open {
            warn!(
                "outbound stream dropped without close: discarding {} buffered bytes",
                self.buffer.len()
            );
        }
    }
}

impl std::fmt::Debug for OutboundStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundStream")
            .field("gate", &self.gate)
            .field("config", &self.config)
            .field("buffered", &self.buffer.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
