//! Contract for the asynchronous channel behind the write gate.

use std::{
    io,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::OutboundFrame;

/// Asynchronous sink accepting outbound frames.
///
/// The [`ChannelWriteGate`](super::ChannelWriteGate) is the only caller and
/// never overlaps two `submit` calls. Implementations therefore need not
/// serialise submissions themselves.
#[async_trait]
pub trait OutboundChannel: Send + Sync + 'static {
    /// Resolve once the channel is ready to accept another frame.
    ///
    /// This is the writability hook. The default resolves immediately;
    /// writability-aware channels can park submissions here until the
    /// underlying transport drains.
    ///
    /// # Errors
    ///
    /// Returning an error fails the pending frame as if `submit` had failed.
    async fn writable(&self) -> io::Result<()> { Ok(()) }

    /// Write `frame` to the channel, resolving once the channel has taken
    /// responsibility for it.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel rejects or fails to write the frame.
    async fn submit(&self, frame: OutboundFrame) -> io::Result<()>;

    /// Whether the channel still accepts frames.
    fn is_open(&self) -> bool;

    /// Close the channel. The default does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel fails to close cleanly.
    async fn close(&self) -> io::Result<()> { Ok(()) }
}

/// [`OutboundChannel`] backed by a bounded tokio `mpsc` sender.
///
/// `submit` waits for queue capacity, so a slow receiver throttles the
/// gate driver rather than growing memory. `close` drops the sender, which
/// ends the receiver's stream once queued frames are drained.
///
/// # Examples
///
/// ```
/// use duplex_bridge::outbound::{MpscChannel, OutboundChannel};
///
/// let (channel, _rx) = MpscChannel::new(4);
/// assert!(channel.is_open());
/// ```
#[derive(Debug)]
pub struct MpscChannel {
    tx: Mutex<Option<mpsc::Sender<OutboundFrame>>>,
}

impl MpscChannel {
    /// Create a channel and the receiver observing submitted frames.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, mirroring [`mpsc::channel`].
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::from_sender(tx), rx)
    }

    /// Wrap an existing sender.
    #[must_use]
    pub fn from_sender(tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<OutboundFrame>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl OutboundChannel for MpscChannel {
    async fn submit(&self, frame: OutboundFrame) -> io::Result<()> {
        let Some(tx) = self.sender() else {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "outbound channel closed",
            ));
        };
        tx.send(frame)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "outbound receiver dropped"))
    }

    fn is_open(&self) -> bool { self.sender().is_some_and(|tx| !tx.is_closed()) }

    async fn close(&self) -> io::Result<()> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}
