//! Serialised, failure-tracking access to an [`OutboundChannel`].
//!
//! The gate splits into two halves. The blocking half lives inside the
//! [`OutboundStream`](super::OutboundStream) on the worker thread and pushes
//! commands into a bounded queue. The asynchronous half is a driver task on
//! the tokio runtime which pops commands in order, waits for the channel's
//! writability hook and submits each frame. Only the driver touches the
//! channel's write path, so submissions never overlap.
//!
//! The first submission failure is stored in a shared cell. The worker
//! consults it before each blocking call; frames queued behind a failure
//! are dropped instead of being written out of sequence.

use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use log::debug;
use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
};

use super::{ChannelFailure, Operation, OutboundChannel, OutboundError, OutboundFrame};
use crate::metrics;

enum GateCommand {
    Frame(OutboundFrame),
    CloseChannel,
    Barrier(oneshot::Sender<()>),
}

/// State shared between the blocking half and the driver task.
#[derive(Debug, Default)]
struct GateShared {
    failure: Mutex<Option<ChannelFailure>>,
    submitted: AtomicU64,
    acknowledged: AtomicU64,
}

impl GateShared {
    fn failure(&self) -> Option<ChannelFailure> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Keep the first failure; later ones are consequences of it.
    fn record(&self, error: &std::io::Error) {
        let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(ChannelFailure::from_io(error));
        }
    }

    async fn deliver(&self, channel: &dyn OutboundChannel, frame: OutboundFrame) {
        let len = frame.len();
        let is_last = frame.is_last();
        if self.failure().is_some() {
            debug!("dropping outbound frame queued after channel failure: len={len}, last={is_last}");
        } else {
            let result = match channel.writable().await {
                Ok(()) => channel.submit(frame).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    metrics::inc_frames_submitted();
                    tracing::trace!(len, is_last, "outbound frame submitted");
                }
                Err(error) => {
                    tracing::warn!(%error, len, is_last, "outbound frame submission failed");
                    metrics::inc_errors(metrics::ErrorKind::Channel);
                    self.record(&error);
                }
            }
        }
        self.acknowledged.fetch_add(1, Ordering::AcqRel);
    }
}

/// Driver loop run on the tokio runtime.
async fn drive(
    channel: Arc<dyn OutboundChannel>,
    mut commands: mpsc::Receiver<GateCommand>,
    shared: Arc<GateShared>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            GateCommand::Frame(frame) => shared.deliver(channel.as_ref(), frame).await,
            GateCommand::CloseChannel => {
                if let Err(error) = channel.close().await {
                    tracing::warn!(%error, "closing outbound channel failed");
                    metrics::inc_errors(metrics::ErrorKind::Channel);
                    shared.record(&error);
                }
            }
            GateCommand::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("write gate driver stopped");
}

/// Single point of interaction with an asynchronous [`OutboundChannel`].
///
/// The blocking methods must be called from outside the tokio runtime (a
/// `spawn_blocking` task or a plain thread); they panic when invoked from
/// within an asynchronous execution context, like
/// [`mpsc::Sender::blocking_send`].
pub struct ChannelWriteGate {
    commands: mpsc::Sender<GateCommand>,
    shared: Arc<GateShared>,
    channel: Arc<dyn OutboundChannel>,
}

impl ChannelWriteGate {
    /// Spawn the driver task for `channel` on `runtime`.
    ///
    /// At most `capacity` commands wait in the queue; further submissions
    /// block the calling thread until the driver catches up.
    #[must_use]
    pub fn spawn(
        channel: Arc<dyn OutboundChannel>,
        runtime: &Handle,
        capacity: NonZeroUsize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.get());
        let shared = Arc::new(GateShared::default());
        runtime.spawn(drive(Arc::clone(&channel), rx, Arc::clone(&shared)));
        Self {
            commands: tx,
            shared,
            channel,
        }
    }

    /// First recorded submission failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<ChannelFailure> { self.shared.failure() }

    /// Fail with [`OutboundError::ChannelFailed`] if a failure was recorded.
    ///
    /// # Errors
    ///
    /// Returns the recorded failure, tagged with `operation`.
    pub fn check(&self, operation: Operation) -> Result<(), OutboundError> {
        match self.failure() {
            Some(failure) => Err(OutboundError::ChannelFailed { operation, failure }),
            None => Ok(()),
        }
    }

    /// Queue `frame` for submission, blocking while the queue is full.
    ///
    /// Returns once the frame is queued, not once the channel has accepted
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError::GateShutDown`] if the driver task is gone.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn submit(&self, frame: OutboundFrame, operation: Operation) -> Result<(), OutboundError> {
        self.shared.submitted.fetch_add(1, Ordering::AcqRel);
        if self
            .commands
            .blocking_send(GateCommand::Frame(frame))
            .is_err()
        {
            self.shared.submitted.fetch_sub(1, Ordering::AcqRel);
            return Err(OutboundError::GateShutDown { operation });
        }
        Ok(())
    }

    /// Queue a request to close the channel once earlier frames are written.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError::GateShutDown`] if the driver task is gone.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn close_channel(&self, operation: Operation) -> Result<(), OutboundError> {
        self.commands
            .blocking_send(GateCommand::CloseChannel)
            .map_err(|_| OutboundError::GateShutDown { operation })
    }

    /// Block until every command queued so far has been processed.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError::GateShutDown`] if the driver task is gone.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn barrier(&self, operation: Operation) -> Result<(), OutboundError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.commands
            .blocking_send(GateCommand::Barrier(done_tx))
            .map_err(|_| OutboundError::GateShutDown { operation })?;
        done_rx
            .blocking_recv()
            .map_err(|_| OutboundError::GateShutDown { operation })
    }

    /// Whether the underlying channel still accepts frames.
    #[must_use]
    pub fn is_open(&self) -> bool { self.channel.is_open() }

    /// Frames queued but not yet processed by the driver.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        let submitted = self.shared.submitted.load(Ordering::Acquire);
        let acknowledged = self.shared.acknowledged.load(Ordering::Acquire);
        submitted.saturating_sub(acknowledged)
    }
}

impl std::fmt::Debug for ChannelWriteGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelWriteGate")
            .field("failure", &self.failure())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}
