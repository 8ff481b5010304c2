//! Configuration for [`OutboundStream`](super::OutboundStream).

use std::{fmt, num::NonZeroUsize};

/// Default number of frames the write gate queues before `write` blocks.
pub const DEFAULT_QUEUE_CAPACITY: NonZeroUsize = NonZeroUsize::new(16).unwrap();

/// Number of buffered bytes that triggers an implicit flush.
///
/// * [`FlushThreshold::NEVER`] disables implicit flushing; bytes leave only
///   on an explicit `flush()` or `close()`.
/// * A threshold of zero flushes the whole buffer on every write.
/// * Any other value `T` emits frames of exactly `T` bytes whenever at least
///   `T` bytes are buffered, keeping the remainder for later.
///
/// # Examples
///
/// ```
/// use duplex_bridge::outbound::FlushThreshold;
///
/// assert_eq!(FlushThreshold::from_signed(-5), FlushThreshold::new(0));
/// assert!(FlushThreshold::default().is_never());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlushThreshold(usize);

impl FlushThreshold {
    /// Sentinel disabling implicit flushing.
    pub const NEVER: Self = Self(usize::MAX);

    /// Threshold of `bytes`.
    #[must_use]
    pub const fn new(bytes: usize) -> Self { Self(bytes) }

    /// Build a threshold from a signed value, normalising negatives to zero.
    #[must_use]
    pub fn from_signed(bytes: i64) -> Self {
        Self(usize::try_from(bytes.max(0)).unwrap_or(usize::MAX))
    }

    /// Configured byte count.
    #[must_use]
    pub const fn get(self) -> usize { self.0 }

    /// Whether implicit flushing is disabled.
    #[must_use]
    pub const fn is_never(self) -> bool { self.0 == usize::MAX }
}

impl Default for FlushThreshold {
    fn default() -> Self { Self::NEVER }
}

impl fmt::Debug for FlushThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            f.write_str("FlushThreshold(NEVER)")
        } else {
            write!(f, "FlushThreshold({})", self.0)
        }
    }
}

impl From<usize> for FlushThreshold {
    fn from(bytes: usize) -> Self { Self(bytes) }
}

/// Settings for an [`OutboundStream`](super::OutboundStream).
///
/// # Examples
///
/// ```
/// use duplex_bridge::outbound::{FlushThreshold, OutboundConfig};
///
/// let config = OutboundConfig::default()
///     .with_flush_threshold(FlushThreshold::new(8192))
///     .with_close_channel(true);
/// assert_eq!(config.flush_threshold().get(), 8192);
/// assert!(config.close_channel());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct OutboundConfig {
    flush_threshold: FlushThreshold,
    close_channel: bool,
    queue_capacity: NonZeroUsize,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            flush_threshold: FlushThreshold::NEVER,
            close_channel: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl OutboundConfig {
    /// Set the implicit flush threshold.
    #[must_use]
    pub fn with_flush_threshold(mut self, threshold: impl Into<FlushThreshold>) -> Self {
        self.flush_threshold = threshold.into();
        self
    }

    /// Request that the channel itself is closed after the last frame.
    #[must_use]
    pub fn with_close_channel(mut self, close_channel: bool) -> Self {
        self.close_channel = close_channel;
        self
    }

    /// Set how many frames may wait in the gate before `write` blocks.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Configured flush threshold.
    #[must_use]
    pub const fn flush_threshold(&self) -> FlushThreshold { self.flush_threshold }

    /// Whether `close` also closes the channel.
    #[must_use]
    pub const fn close_channel(&self) -> bool { self.close_channel }

    /// Capacity of the gate's command queue.
    #[must_use]
    pub const fn queue_capacity(&self) -> NonZeroUsize { self.queue_capacity }
}
