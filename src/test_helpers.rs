#![cfg(any(test, feature = "test-helpers"))]
//! Test-only helpers for shared test utilities.

use std::{
    io,
    sync::{
        Mutex,
        PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::{Method, header::CONTENT_LENGTH};
use tokio::sync::watch;

use crate::{
    classify::{HttpFragment, RequestHead, StreamFrame},
    outbound::{OutboundChannel, OutboundFrame},
};

/// [`OutboundChannel`] that records every submitted frame.
///
/// Failures can be injected from a given submission onwards, writability can
/// be held back to park the gate driver, and the open flag can be flipped to
/// simulate a channel closed by the peer.
#[derive(Debug)]
pub struct RecordingChannel {
    frames: Mutex<Vec<OutboundFrame>>,
    submissions: AtomicUsize,
    fail_from: Mutex<Option<(usize, io::ErrorKind)>>,
    open: AtomicBool,
    writable: watch::Sender<bool>,
    closes: AtomicUsize,
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            submissions: AtomicUsize::new(0),
            fail_from: Mutex::new(None),
            open: AtomicBool::new(true),
            writable: watch::Sender::new(true),
            closes: AtomicUsize::new(0),
        }
    }
}

impl RecordingChannel {
    /// Create an open, writable channel.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Fail the `nth` submission (1-based) and every one after it with
    /// `kind`.
    pub fn fail_from(&self, nth: usize, kind: io::ErrorKind) {
        *self.fail_from.lock().unwrap_or_else(PoisonError::into_inner) = Some((nth, kind));
    }

    /// Set the value reported by [`OutboundChannel::is_open`].
    pub fn set_open(&self, open: bool) { self.open.store(open, Ordering::Release); }

    /// Hold (`false`) or release (`true`) the writability hook.
    pub fn set_writable(&self, writable: bool) { self.writable.send_replace(writable); }

    /// Frames accepted so far, in submission order.
    #[must_use]
    pub fn frames(&self) -> Vec<OutboundFrame> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Payload sizes of the accepted content frames.
    #[must_use]
    pub fn content_sizes(&self) -> Vec<usize> {
        self.frames()
            .iter()
            .filter_map(OutboundFrame::payload)
            .map(Bytes::len)
            .collect()
    }

    /// Concatenated payload of every accepted content frame.
    #[must_use]
    pub fn content(&self) -> Bytes {
        let mut out = BytesMut::new();
        for frame in self.frames() {
            if let Some(payload) = frame.payload() {
                out.extend_from_slice(payload);
            }
        }
        out.freeze()
    }

    /// Number of accepted end-of-stream frames.
    #[must_use]
    pub fn last_count(&self) -> usize {
        self.frames().iter().filter(|f| f.is_last()).count()
    }

    /// Number of `submit` calls, including failed ones.
    #[must_use]
    pub fn submissions(&self) -> usize { self.submissions.load(Ordering::Acquire) }

    /// Number of `close` calls.
    #[must_use]
    pub fn closes(&self) -> usize { self.closes.load(Ordering::Acquire) }
}

#[async_trait]
impl OutboundChannel for RecordingChannel {
    async fn writable(&self) -> io::Result<()> {
        let mut rx = self.writable.subscribe();
        rx.wait_for(|writable| *writable)
            .await
            .map(|_| ())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "writability source dropped"))
    }

    async fn submit(&self, frame: OutboundFrame) -> io::Result<()> {
        let nth = self.submissions.fetch_add(1, Ordering::AcqRel) + 1;
        let fail = *self.fail_from.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((from, kind)) = fail
            && nth >= from
        {
            return Err(io::Error::new(kind, format!("injected failure at submission {nth}")));
        }
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame);
        Ok(())
    }

    fn is_open(&self) -> bool { self.open.load(Ordering::Acquire) }

    async fn close(&self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::AcqRel);
        self.open.store(false, Ordering::Release);
        Ok(())
    }
}

/// Header block for `method` and `uri`, optionally declaring a length.
#[must_use]
pub fn request_head(method: Method, uri: &str, content_length: Option<u64>) -> RequestHead {
    let mut head = RequestHead::new(method, uri);
    if let Some(length) = content_length {
        head.headers.insert(CONTENT_LENGTH, length.into());
    }
    head
}

/// HTTP/1 header fragment.
#[must_use]
pub fn http_head(method: Method, uri: &str, content_length: Option<u64>) -> HttpFragment {
    HttpFragment::Head(request_head(method, uri, content_length))
}

/// HTTP/1 content fragment.
#[must_use]
pub fn http_content(bytes: &'static [u8]) -> HttpFragment {
    HttpFragment::Content(Bytes::from_static(bytes))
}

/// HTTP/1 last-content fragment.
#[must_use]
pub fn http_last(bytes: &'static [u8]) -> HttpFragment {
    HttpFragment::LastContent(Bytes::from_static(bytes))
}

/// Stream data frame.
#[must_use]
pub fn stream_data(bytes: &'static [u8], end_stream: bool) -> StreamFrame {
    StreamFrame::Data {
        payload: Bytes::from_static(bytes),
        end_stream,
    }
}
