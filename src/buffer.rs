//! Frame buffers and the factory hook used to produce them.
//!
//! Outbound bytes accumulate in a [`BytesMut`] owned by the
//! [`OutboundStream`](crate::outbound::OutboundStream). On each flush the
//! accumulated range is handed to a [`BufferFactory`], which turns it into
//! an immutable, reference-counted [`FrameBuffer`]. Ownership of the
//! resulting buffer passes to the channel once the frame is submitted. A
//! factory that fails hands the range back inside a [`BufferError`], so the
//! stream keeps those bytes buffered.

use std::{fmt, io};

use bytes::{Bytes, BytesMut};

/// Immutable, reference-counted payload submitted to the channel.
pub type FrameBuffer = Bytes;

/// Failure to wrap a byte range, carrying the unwrapped range back.
///
/// The returned chunk must hold the bytes the factory was given, unchanged.
pub struct BufferError {
    chunk: BytesMut,
    source: io::Error,
}

impl BufferError {
    /// Pair the rejected `chunk` with the reason it could not be wrapped.
    #[must_use]
    pub fn new(chunk: BytesMut, source: io::Error) -> Self { Self { chunk, source } }

    /// Reason the factory failed.
    #[must_use]
    pub fn error(&self) -> &io::Error { &self.source }

    /// Split into the rejected chunk and the underlying error.
    #[must_use]
    pub fn into_parts(self) -> (BytesMut, io::Error) { (self.chunk, self.source) }
}

impl fmt::Debug for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferError")
            .field("chunk_len", &self.chunk.len())
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to wrap {} bytes: {}", self.chunk.len(), self.source)
    }
}

impl std::error::Error for BufferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> { Some(&self.source) }
}

/// Hook converting an accumulated byte range into a [`FrameBuffer`].
///
/// Implementations must not retain `chunk` after returning successfully; the
/// adapter never touches the range again once it has been wrapped.
///
/// Closures with the matching signature implement the trait, so custom
/// allocation strategies can be plugged in without a named type:
///
/// ```
/// use bytes::{Bytes, BytesMut};
/// use duplex_bridge::buffer::{BufferError, BufferFactory};
///
/// let upper = |chunk: BytesMut| -> Result<Bytes, BufferError> {
///     Ok(Bytes::from(chunk.to_ascii_uppercase()))
/// };
/// let frame = upper.create(BytesMut::from(&b"abc"[..])).expect("factory succeeds");
/// assert_eq!(frame.as_ref(), b"ABC");
/// ```
pub trait BufferFactory: Send + Sync + 'static {
    /// Wrap `chunk` into a frame buffer.
    ///
    /// # Errors
    ///
    /// Returns a [`BufferError`] holding `chunk` when the buffer cannot be
    /// produced. The error is surfaced synchronously from the call that
    /// triggered the flush.
    fn create(&self, chunk: BytesMut) -> Result<FrameBuffer, BufferError>;
}

/// Default factory: freezes the accumulated range without copying.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroCopy;

impl BufferFactory for ZeroCopy {
    fn create(&self, chunk: BytesMut) -> Result<FrameBuffer, BufferError> { Ok(chunk.freeze()) }
}

/// Factory that copies each range into a freshly allocated, exactly sized
/// buffer.
///
/// Useful when frames outlive the accumulation buffer for a long time and
/// the spare capacity of the original allocation should be released.
#[derive(Clone, Copy, Debug, Default)]
pub struct CopyingFactory;

impl BufferFactory for CopyingFactory {
    fn create(&self, chunk: BytesMut) -> Result<FrameBuffer, BufferError> {
        Ok(Bytes::copy_from_slice(&chunk))
    }
}

impl<F> BufferFactory for F
where
    F: Fn(BytesMut) -> Result<FrameBuffer, BufferError> + Send + Sync + 'static,
{
    fn create(&self, chunk: BytesMut) -> Result<FrameBuffer, BufferError> { self(chunk) }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use rstest::rstest;

    use super::{BufferError, BufferFactory, CopyingFactory, ZeroCopy};

    #[rstest]
    fn zero_copy_preserves_contents() {
        let frame = ZeroCopy
            .create(BytesMut::from(&b"payload"[..]))
            .expect("zero-copy wrap cannot fail");
        assert_eq!(frame.as_ref(), b"payload");
    }

    #[rstest]
    fn copying_factory_drops_spare_capacity() {
        let mut chunk = BytesMut::with_capacity(1024);
        chunk.extend_from_slice(b"abc");
        let frame = CopyingFactory.create(chunk).expect("copy cannot fail");
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.as_ref(), b"abc");
    }

    #[rstest]
    fn closure_errors_hand_the_chunk_back() {
        let failing = |chunk: BytesMut| -> Result<bytes::Bytes, BufferError> {
            Err(BufferError::new(chunk, std::io::Error::other("pool exhausted")))
        };
        let err = failing
            .create(BytesMut::from(&b"xyz"[..]))
            .expect_err("closure should fail");
        assert_eq!(err.error().to_string(), "pool exhausted");
        let (chunk, source) = err.into_parts();
        assert_eq!(&chunk[..], b"xyz");
        assert_eq!(source.kind(), std::io::ErrorKind::Other);
    }
}
