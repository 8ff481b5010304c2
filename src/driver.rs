//! Asynchronous pump feeding a fragment stream through the assembler.
//!
//! [`InboundDriver`] is the read side of a connection. It pulls decoded
//! fragments from a [`Stream`], hands them to an
//! [`InboundMessageAssembler`] and forwards every assembled
//! [`LogicalRequest`] to a bounded request queue drained by the processing
//! layer. When a request body backs up beyond its high watermark the driver
//! stops reading fragments until the body reader catches up, so a slow
//! consumer throttles the connection instead of growing memory.

use std::io;

use futures::{Stream, StreamExt};
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    assembler::InboundMessageAssembler,
    classify::BoundaryClassifier,
    error::{BridgeError, Result},
    request::LogicalRequest,
};

/// Counters reported when a driver run ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriveSummary {
    /// Fragments read from the stream.
    pub fragments: u64,
    /// Requests forwarded to the request queue.
    pub requests: u64,
}

/// Read-side driver for one connection.
#[derive(Debug)]
pub struct InboundDriver<C> {
    assembler: InboundMessageAssembler<C>,
    requests: mpsc::Sender<LogicalRequest>,
}

impl<C: BoundaryClassifier> InboundDriver<C> {
    /// Forward requests produced by `assembler` into `requests`.
    #[must_use]
    pub const fn new(
        assembler: InboundMessageAssembler<C>,
        requests: mpsc::Sender<LogicalRequest>,
    ) -> Self {
        Self {
            assembler,
            requests,
        }
    }

    /// Assembler state, for inspection after a run.
    #[must_use]
    pub const fn assembler(&self) -> &InboundMessageAssembler<C> { &self.assembler }

    /// Recover the assembler.
    #[must_use]
    pub fn into_assembler(self) -> InboundMessageAssembler<C> { self.assembler }

    /// Pump `fragments` until the stream ends, fails or `shutdown` fires.
    ///
    /// A body still open when the stream ends is aborted with
    /// [`io::ErrorKind::UnexpectedEof`]; one open at shutdown is aborted with
    /// [`io::ErrorKind::ConnectionAborted`]. Either way the blocked reader
    /// wakes with an error instead of a truncated body.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] when the stream yields an error,
    /// [`BridgeError::Assembly`] on a protocol violation and
    /// [`BridgeError::DispatchClosed`] when the request receiver is gone.
    pub async fn run<S>(
        &mut self,
        mut fragments: S,
        shutdown: CancellationToken,
    ) -> Result<DriveSummary>
    where
        S: Stream<Item = io::Result<C::Fragment>> + Unpin,
    {
        let mut summary = DriveSummary::default();
        loop {
            let next = tokio::select! {
                biased;

                () = shutdown.cancelled() => None,
                next = fragments.next() => Some(next),
            };
            let fragment = match next {
                None => return Ok(self.shut_down(summary)),
                Some(None) => {
                    if self.assembler.is_body_open() {
                        warn!("fragment stream ended inside a message body");
                        self.assembler.abort(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "connection closed before the request body ended",
                        ));
                    }
                    debug!(
                        "fragment stream ended: fragments={}, requests={}",
                        summary.fragments, summary.requests
                    );
                    return Ok(summary);
                }
                Some(Some(Err(error))) => {
                    self.assembler
                        .abort(io::Error::new(error.kind(), error.to_string()));
                    return Err(BridgeError::Io(error));
                }
                Some(Some(Ok(fragment))) => fragment,
            };
            summary.fragments += 1;

            let (request, pause) = self.assembler.accept(fragment)?.into_parts();
            if let Some(request) = request {
                let sent = tokio::select! {
                    biased;

                    () = shutdown.cancelled() => None,
                    sent = self.requests.send(request) => Some(sent.is_ok()),
                };
                match sent {
                    None => return Ok(self.shut_down(summary)),
                    Some(false) => {
                        self.assembler.abort(io::Error::new(
                            io::ErrorKind::ConnectionAborted,
                            "request dispatch queue closed",
                        ));
                        return Err(BridgeError::DispatchClosed);
                    }
                    Some(true) => summary.requests += 1,
                }
            }
            if let Some(signal) = pause {
                debug!("request body saturated; pausing fragment reads");
                let drained = tokio::select! {
                    biased;

                    () = shutdown.cancelled() => false,
                    () = signal.wait() => true,
                };
                if !drained {
                    return Ok(self.shut_down(summary));
                }
            }
        }
    }

    fn shut_down(&mut self, summary: DriveSummary) -> DriveSummary {
        debug!("inbound driver shutting down");
        if self.assembler.is_body_open() {
            self.assembler.abort(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "connection shut down before the request body ended",
            ));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{self, Read},
        num::NonZeroUsize,
        time::Duration,
    };

    use http::Method;
    use rstest::rstest;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::{DriveSummary, InboundDriver};
    use crate::{
        assembler::{AssemblerConfig, AssemblerPhase, AssemblyError, InboundMessageAssembler},
        classify::Http1Classifier,
        error::BridgeError,
        feed::FeedConfig,
        test_helpers::{http_content, http_head, http_last},
    };

    fn driver(
        config: AssemblerConfig,
        capacity: usize,
    ) -> (
        InboundDriver<Http1Classifier>,
        mpsc::Receiver<crate::request::LogicalRequest>,
    ) {
        let (tx, rx) = mpsc::channel(capacity);
        let assembler = InboundMessageAssembler::new(Http1Classifier, config);
        (InboundDriver::new(assembler, tx), rx)
    }

    #[rstest]
    #[tokio::test]
    async fn forwards_pipelined_requests() {
        let (mut driver, mut rx) = driver(AssemblerConfig::default(), 4);
        let fragments = futures::stream::iter(vec![
            Ok(http_head(Method::POST, "/a", None)),
            Ok(http_last(b"one")),
            Ok(http_head(Method::GET, "/b", Some(0))),
        ]);

        let summary = driver
            .run(fragments, CancellationToken::new())
            .await
            .expect("driver run");
        assert_eq!(
            summary,
            DriveSummary {
                fragments: 3,
                requests: 2
            }
        );

        let first = rx.recv().await.expect("first request");
        let second = rx.recv().await.expect("second request");
        assert_eq!(first.request_uri(), Some("/a"));
        assert_eq!(second.method(), Some(&Method::GET));
        assert_eq!(driver.assembler().completed(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn truncated_stream_fails_the_open_body() {
        let (mut driver, mut rx) = driver(AssemblerConfig::default(), 1);
        let fragments = futures::stream::iter(vec![
            Ok(http_head(Method::PUT, "/upload", Some(10))),
            Ok(http_content(b"part")),
        ]);
        driver
            .run(fragments, CancellationToken::new())
            .await
            .expect("stream end is not a driver error");

        let request = rx.recv().await.expect("request forwarded");
        let err = tokio::task::spawn_blocking(move || {
            let mut body = request.into_body();
            let mut buf = Vec::new();
            body.read_to_end(&mut buf).expect_err("truncated body")
        })
        .await
        .expect("reader task");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(driver.assembler().phase(), AssemblerPhase::Failed);
    }

    #[rstest]
    #[tokio::test]
    async fn stream_error_is_reported() {
        let (mut driver, _rx) = driver(AssemblerConfig::default(), 1);
        let fragments = futures::stream::iter(vec![
            Ok(http_head(Method::POST, "/", None)),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let err = driver
            .run(fragments, CancellationToken::new())
            .await
            .expect_err("stream error surfaces");
        assert!(matches!(err, BridgeError::Io(e) if e.kind() == io::ErrorKind::ConnectionReset));
    }

    #[rstest]
    #[tokio::test]
    async fn protocol_error_stops_the_run() {
        let (mut driver, _rx) = driver(AssemblerConfig::default(), 1);
        let fragments = futures::stream::iter(vec![Ok(http_content(b"orphan"))]);
        let err = driver
            .run(fragments, CancellationToken::new())
            .await
            .expect_err("content before headers");
        assert!(matches!(
            err,
            BridgeError::Assembly(AssemblyError::MissingHeaders)
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn dropped_receiver_is_dispatch_closed() {
        let (mut driver, rx) = driver(AssemblerConfig::default(), 1);
        drop(rx);
        let fragments = futures::stream::iter(vec![Ok(http_head(Method::GET, "/", Some(0)))]);
        let err = driver
            .run(fragments, CancellationToken::new())
            .await
            .expect_err("nobody receives requests");
        assert!(matches!(err, BridgeError::DispatchClosed));
    }

    #[rstest]
    #[tokio::test]
    async fn shutdown_while_paused_aborts_the_body() {
        let high = NonZeroUsize::new(4).expect("non-zero watermark");
        let config =
            AssemblerConfig::default().with_feed_config(FeedConfig::default().with_watermarks(high, 0));
        let (mut driver, mut rx) = driver(config, 1);
        let fragments = futures::stream::iter(vec![
            Ok(http_head(Method::POST, "/", None)),
            Ok(http_content(b"more than four bytes")),
            Ok(http_last(b"never read")),
        ]);
        let shutdown = CancellationToken::new();
        let run = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                let summary = driver.run(fragments, shutdown).await;
                (driver, summary)
            }
        });

        let request = rx.recv().await.expect("request forwarded");
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();
        let (driver, summary) = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("driver stops")
            .expect("driver task");
        let summary = summary.expect("shutdown is not an error");
        assert_eq!(summary.fragments, 2);
        assert_eq!(driver.assembler().phase(), AssemblerPhase::Failed);

        let err = tokio::task::spawn_blocking(move || {
            let mut body = request.into_body();
            let mut buf = Vec::new();
            body.read_to_end(&mut buf).expect_err("aborted body")
        })
        .await
        .expect("reader task");
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }
}
