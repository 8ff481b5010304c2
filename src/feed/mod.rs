//! Handoff queue between fragment arrival and a blocking body reader.
//!
//! [`body_feed`] returns a producer half ([`BodyFeed`]) owned by the
//! assembler on the runtime, and a consumer half ([`BodyReader`]) handed to
//! the processing layer inside a
//! [`LogicalRequest`](crate::request::LogicalRequest).
//!
//! The producer never waits. Every push succeeds immediately and the queue
//! tracks how many bytes are waiting for the reader. Once that count crosses
//! the configured high watermark, [`BodyFeed::push`] reports
//! [`FeedStatus::Saturated`]; the read side should then stop pulling
//! fragments from the channel until [`DrainSignal::wait`] resolves, which
//! happens when the reader has consumed the backlog down to the low
//! watermark. Bytes are never dropped to enforce the bound.
//!
//! End-of-stream is delivered exactly once: [`BodyFeed::finish`] and
//! [`BodyFeed::abort`] consume the producer. A producer dropped without
//! either (for example because the connection went away) is reported to the
//! reader as an [`io::ErrorKind::UnexpectedEof`] error rather than a clean
//! end.

use std::{
    io::{self, BufRead, Read},
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use bytes::{Buf, Bytes};
use log::debug;
use tokio::sync::{Notify, mpsc};

/// Default number of buffered bytes above which the feed reports
/// saturation.
pub const DEFAULT_HIGH_WATERMARK: NonZeroUsize = NonZeroUsize::new(64 * 1024).unwrap();

/// Watermarks bounding how much body data may wait for the reader.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use duplex_bridge::feed::FeedConfig;
///
/// let high = NonZeroUsize::new(1024).expect("non-zero");
/// let config = FeedConfig::default().with_watermarks(high, 4096);
/// // The low watermark never exceeds the high one.
/// assert_eq!(config.low_watermark(), 1024);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeedConfig {
    high_watermark: NonZeroUsize,
    low_watermark: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            high_watermark: DEFAULT_HIGH_WATERMARK,
            low_watermark: DEFAULT_HIGH_WATERMARK.get() / 2,
        }
    }
}

impl FeedConfig {
    /// Set both watermarks. `low` is clamped to `high`.
    #[must_use]
    pub fn with_watermarks(mut self, high: NonZeroUsize, low: usize) -> Self {
        self.high_watermark = high;
        self.low_watermark = low.min(high.get());
        self
    }

    /// Buffered byte count above which pushes report saturation.
    #[must_use]
    pub const fn high_watermark(&self) -> NonZeroUsize { self.high_watermark }

    /// Buffered byte count at or below which a saturated feed is drained.
    #[must_use]
    pub const fn low_watermark(&self) -> usize { self.low_watermark }
}

/// Outcome of pushing a chunk into the feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedStatus {
    /// The chunk was queued and the backlog is within bounds.
    Buffered,
    /// The chunk was queued but the backlog exceeds the high watermark.
    Saturated,
    /// The reader has gone away; the chunk was discarded.
    ReaderDropped,
}

enum FeedEvent {
    Data(Bytes),
    End,
    Abort(io::Error),
}

#[derive(Debug)]
struct FeedShared {
    buffered: AtomicUsize,
    reader_dropped: AtomicBool,
    drained: Notify,
    config: FeedConfig,
}

impl FeedShared {
    fn new(config: FeedConfig) -> Self {
        Self {
            buffered: AtomicUsize::new(0),
            reader_dropped: AtomicBool::new(false),
            drained: Notify::new(),
            config,
        }
    }

    fn buffered(&self) -> usize { self.buffered.load(Ordering::Acquire) }

    fn reader_dropped(&self) -> bool { self.reader_dropped.load(Ordering::Acquire) }

    fn is_drained(&self) -> bool {
        self.reader_dropped() || self.buffered() <= self.config.low_watermark
    }

    fn status(&self) -> FeedStatus {
        if self.reader_dropped() {
            FeedStatus::ReaderDropped
        } else if self.buffered() > self.config.high_watermark.get() {
            FeedStatus::Saturated
        } else {
            FeedStatus::Buffered
        }
    }

    /// Account for `n` bytes handed to the reader, waking drain waiters when
    /// the backlog crosses the low watermark.
    fn release(&self, n: usize) {
        if n == 0 {
            return;
        }
        let before = self.buffered.fetch_sub(n, Ordering::AcqRel);
        let after = before.saturating_sub(n);
        let low = self.config.low_watermark;
        if before > low && after <= low {
            self.drained.notify_waiters();
        }
    }
}

/// Create a connected producer/consumer pair.
///
/// # Examples
///
/// ```
/// use std::io::Read;
///
/// use bytes::Bytes;
/// use duplex_bridge::feed::{FeedConfig, body_feed};
///
/// let (feed, mut reader) = body_feed(FeedConfig::default());
/// feed.push(Bytes::from_static(b"hello"));
/// feed.finish();
///
/// let mut body = String::new();
/// reader.read_to_string(&mut body).expect("read body");
/// assert_eq!(body, "hello");
/// ```
#[must_use]
pub fn body_feed(config: FeedConfig) -> (BodyFeed, BodyReader) {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(FeedShared::new(config));
    let feed = BodyFeed {
        tx,
        shared: Arc::clone(&shared),
        ended: false,
    };
    let reader = BodyReader {
        rx,
        chunk: Bytes::new(),
        shared,
        state: ReaderState::Open,
    };
    (feed, reader)
}

/// Producer half of the body queue. Never blocks.
#[derive(Debug)]
pub struct BodyFeed {
    tx: mpsc::UnboundedSender<FeedEvent>,
    shared: Arc<FeedShared>,
    ended: bool,
}

impl BodyFeed {
    /// Queue `chunk` for the reader.
    ///
    /// Empty chunks are ignored. The returned status tells the caller
    /// whether to keep reading from the channel.
    pub fn push(&self, chunk: Bytes) -> FeedStatus {
        if chunk.is_empty() {
            return self.shared.status();
        }
        let len = chunk.len();
        self.shared.buffered.fetch_add(len, Ordering::AcqRel);
        if self.tx.send(FeedEvent::Data(chunk)).is_err() {
            self.shared.buffered.fetch_sub(len, Ordering::AcqRel);
            return FeedStatus::ReaderDropped;
        }
        self.shared.status()
    }

    /// Signal a clean end of the body after all queued bytes.
    pub fn finish(mut self) {
        self.ended = true;
        let _ = self.tx.send(FeedEvent::End);
    }

    /// End the body with `error`; the reader receives it after draining
    /// the bytes queued before it.
    pub fn abort(mut self, error: io::Error) {
        self.ended = true;
        let _ = self.tx.send(FeedEvent::Abort(error));
    }

    /// Bytes queued but not yet consumed by the reader.
    #[must_use]
    pub fn buffered(&self) -> usize { self.shared.buffered() }

    /// Whether the reader has been dropped.
    #[must_use]
    pub fn is_reader_dropped(&self) -> bool { self.shared.reader_dropped() }

    /// Handle resolving once the backlog has drained.
    #[must_use]
    pub fn drain_signal(&self) -> DrainSignal {
        DrainSignal {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for BodyFeed {
    fn drop(&mut self) {
        if !self.ended {
            debug!("body feed dropped before end of stream");
        }
    }
}

/// Awaitable notification that a saturated feed has drained.
#[derive(Clone, Debug)]
pub struct DrainSignal {
    shared: Arc<FeedShared>,
}

impl DrainSignal {
    /// Whether the backlog is at or below the low watermark, or the reader
    /// is gone.
    #[must_use]
    pub fn is_drained(&self) -> bool { self.shared.is_drained() }

    /// Wait until [`is_drained`](Self::is_drained) holds.
    pub async fn wait(&self) {
        loop {
            let notified = self.shared.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.shared.is_drained() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug)]
enum ReaderState {
    Open,
    Ended,
    Failed { kind: io::ErrorKind, message: String },
}

/// Consumer half of the body queue: a blocking [`Read`] over the body.
///
/// Reads block the calling thread until bytes arrive, the body ends or the
/// feed fails. Once the body has ended every read returns `Ok(0)`; once it
/// has failed every read returns an error of the same kind.
///
/// Reads must not run inside the tokio runtime; use
/// [`tokio::task::spawn_blocking`] or a dedicated thread.
#[derive(Debug)]
pub struct BodyReader {
    rx: mpsc::UnboundedReceiver<FeedEvent>,
    chunk: Bytes,
    shared: Arc<FeedShared>,
    state: ReaderState,
}

impl BodyReader {
    /// Whether the end of the body has been reached and every byte read.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.chunk.is_empty() && matches!(self.state, ReaderState::Ended)
    }

    fn fail(&mut self, error: &io::Error) {
        self.state = ReaderState::Failed {
            kind: error.kind(),
            message: error.to_string(),
        };
    }

    /// Make sure `self.chunk` holds unread bytes. Returns `false` at the end
    /// of the body.
    fn ensure_chunk(&mut self) -> io::Result<bool> {
        loop {
            if !self.chunk.is_empty() {
                return Ok(true);
            }
            match &self.state {
                ReaderState::Open => {}
                ReaderState::Ended => return Ok(false),
                ReaderState::Failed { kind, message } => {
                    return Err(io::Error::new(*kind, message.clone()));
                }
            }
            match self.rx.blocking_recv() {
                Some(FeedEvent::Data(chunk)) => self.chunk = chunk,
                Some(FeedEvent::End) => self.state = ReaderState::Ended,
                Some(FeedEvent::Abort(error)) => {
                    self.fail(&error);
                    return Err(error);
                }
                None => {
                    let error = io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "body feed closed before end of stream",
                    );
                    self.fail(&error);
                    return Err(error);
                }
            }
        }
    }
}

impl BufRead for BodyReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.ensure_chunk()? {
            Ok(&self.chunk)
        } else {
            Ok(&[])
        }
    }

    fn consume(&mut self, amt: usize) {
        let amt = amt.min(self.chunk.len());
        self.chunk.advance(amt);
        self.shared.release(amt);
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl Drop for BodyReader {
    fn drop(&mut self) {
        self.shared.reader_dropped.store(true, Ordering::Release);
        self.shared.drained.notify_waiters();
    }
}

#[cfg(test)]
mod tests;
