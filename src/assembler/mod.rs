//! Reconstruction of logical requests from classified inbound fragments.
//!
//! One [`InboundMessageAssembler`] serves one connection and is reused for
//! every message pipelined on it. Each message must follow the grammar
//! `headers content* last`, where the last fragment may be the header
//! fragment itself. The assembler hands the [`LogicalRequest`] to the caller
//! as soon as its headers arrive and then streams every content fragment
//! into the request's [`BodyFeed`](crate::feed::BodyFeed), so the processing
//! layer can start reading before the message is complete.
//!
//! ```text
//! AwaitingHeaders ──headers──▶ BodyOpen ──content*──▶ BodyOpen ──last──▶ Complete
//!        │                                                                │
//!        └────────────── headers + last ──────────────────────────────▶ Complete
//! Complete ──headers──▶ (next message)
//! ```
//!
//! Grammar violations abort an open body with an
//! [`io::ErrorKind::InvalidData`] error and move the assembler to
//! [`AssemblerPhase::Failed`], from which it never recovers.

mod error;

use std::io;

pub use error::AssemblyError;
use log::{debug, warn};

use crate::{
    classify::BoundaryClassifier,
    feed::{BodyFeed, DrainSignal, FeedConfig, FeedStatus, body_feed},
    metrics,
    request::{BaseUri, LogicalRequest, RequestParts},
};

/// Settings applied to every request an assembler creates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssemblerConfig {
    base_uri: BaseUri,
    feed: FeedConfig,
}

impl AssemblerConfig {
    /// Resolve request targets against `base_uri`.
    #[must_use]
    pub fn with_base_uri(mut self, base_uri: BaseUri) -> Self {
        self.base_uri = base_uri;
        self
    }

    /// Use `feed` for every request body queue.
    #[must_use]
    pub fn with_feed_config(mut self, feed: FeedConfig) -> Self {
        self.feed = feed;
        self
    }

    /// Base URI request targets are resolved against.
    #[must_use]
    pub const fn base_uri(&self) -> &BaseUri { &self.base_uri }

    /// Watermarks of each request body queue.
    #[must_use]
    pub const fn feed_config(&self) -> FeedConfig { self.feed }
}

/// Position of the assembler within the fragment grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblerPhase {
    /// No message in progress; the next fragment must carry headers.
    AwaitingHeaders,
    /// Headers seen; content fragments stream into the open body.
    BodyOpen,
    /// The last fragment of a message was seen and the assembler waits for
    /// the headers of the next one.
    ///
    /// Headers start a new message exactly as in
    /// [`AwaitingHeaders`](Self::AwaitingHeaders). Any other fragment belongs
    /// to the finished message and fails with
    /// [`AssemblyError::AfterComplete`] rather than
    /// [`AssemblyError::MissingHeaders`].
    Complete,
    /// A protocol error or cancellation ended the connection.
    Failed,
}

enum State {
    AwaitingHeaders,
    BodyOpen(BodyFeed),
    Complete,
    Failed,
}

impl State {
    const fn phase(&self) -> AssemblerPhase {
        match self {
            Self::AwaitingHeaders => AssemblerPhase::AwaitingHeaders,
            Self::BodyOpen(_) => AssemblerPhase::BodyOpen,
            Self::Complete => AssemblerPhase::Complete,
            Self::Failed => AssemblerPhase::Failed,
        }
    }
}

/// Result of feeding one fragment to the assembler.
#[derive(Debug, Default)]
pub struct AssemblyOutcome {
    request: Option<LogicalRequest>,
    pause: Option<DrainSignal>,
    complete: bool,
}

impl AssemblyOutcome {
    /// Request created by a header fragment.
    #[must_use]
    pub const fn request(&self) -> Option<&LogicalRequest> { self.request.as_ref() }

    /// Take the request created by a header fragment.
    pub fn take_request(&mut self) -> Option<LogicalRequest> { self.request.take() }

    /// Signal to await before pulling more fragments, present when the body
    /// queue exceeded its high watermark.
    #[must_use]
    pub const fn pause(&self) -> Option<&DrainSignal> { self.pause.as_ref() }

    /// Whether this fragment completed its message.
    #[must_use]
    pub const fn is_complete(&self) -> bool { self.complete }

    /// Split into the created request and the back-pressure signal.
    #[must_use]
    pub fn into_parts(self) -> (Option<LogicalRequest>, Option<DrainSignal>) {
        (self.request, self.pause)
    }
}

/// Stateful reassembler turning fragments into [`LogicalRequest`]s.
///
/// `accept` never blocks. It runs on the event thread while the processing
/// layer reads request bodies on worker threads.
///
/// # Examples
///
/// ```
/// use std::io::Read;
///
/// use bytes::Bytes;
/// use duplex_bridge::{
///     assembler::{AssemblerConfig, InboundMessageAssembler},
///     classify::{Http1Classifier, HttpFragment, RequestHead},
/// };
/// use http::Method;
///
/// let mut assembler = InboundMessageAssembler::new(Http1Classifier, AssemblerConfig::default());
/// let mut outcome = assembler
///     .accept(HttpFragment::Head(RequestHead::new(Method::POST, "/echo")))
///     .expect("headers accepted");
/// let mut request = outcome.take_request().expect("request created on headers");
///
/// assembler
///     .accept(HttpFragment::Content(Bytes::from_static(b"hel")))
///     .expect("content accepted");
/// assembler
///     .accept(HttpFragment::LastContent(Bytes::from_static(b"lo")))
///     .expect("last content accepted");
///
/// let mut body = String::new();
/// request.body_mut().read_to_string(&mut body).expect("read body");
/// assert_eq!(body, "hello");
/// assert_eq!(assembler.completed(), 1);
/// ```
pub struct InboundMessageAssembler<C> {
    classifier: C,
    config: AssemblerConfig,
    state: State,
    completed: u64,
}

impl<C: BoundaryClassifier> InboundMessageAssembler<C> {
    /// Create an assembler awaiting the headers of its first message.
    #[must_use]
    pub fn new(classifier: C, config: AssemblerConfig) -> Self {
        Self {
            classifier,
            config,
            state: State::AwaitingHeaders,
            completed: 0,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> AssemblerPhase { self.state.phase() }

    /// Whether a request body is still receiving fragments.
    #[must_use]
    pub const fn is_body_open(&self) -> bool { matches!(self.state, State::BodyOpen(_)) }

    /// Number of messages completed so far.
    #[must_use]
    pub const fn completed(&self) -> u64 { self.completed }

    /// Classifier used to interpret fragments.
    #[must_use]
    pub const fn classifier(&self) -> &C { &self.classifier }

    /// Configuration applied to new requests.
    #[must_use]
    pub const fn config(&self) -> &AssemblerConfig { &self.config }

    /// Feed one fragment into the assembler.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] when the fragment violates the message
    /// grammar, its target cannot be resolved, a single-fragment message
    /// carries a different length than declared, or the assembler already
    /// failed. Every error except [`AssemblyError::ConnectionFailed`] aborts
    /// the open body and fails the assembler.
    pub fn accept(&mut self, fragment: C::Fragment) -> Result<AssemblyOutcome, AssemblyError> {
        metrics::inc_fragments();
        let is_headers = self.classifier.is_headers(&fragment);
        match std::mem::replace(&mut self.state, State::Failed) {
            State::Failed => Err(AssemblyError::ConnectionFailed),
            State::AwaitingHeaders | State::Complete if is_headers => self.open(fragment),
            State::AwaitingHeaders => Err(self.fail(None, AssemblyError::MissingHeaders)),
            State::Complete => Err(self.fail(None, AssemblyError::AfterComplete)),
            State::BodyOpen(feed) if is_headers => {
                Err(self.fail(Some(feed), AssemblyError::UnexpectedHeaders))
            }
            State::BodyOpen(feed) => Ok(self.append(feed, fragment)),
        }
    }

    /// Abort the message in progress because the channel went away.
    ///
    /// A reader blocked on the open body wakes with `cause`. The assembler
    /// accepts no further fragments.
    pub fn abort(&mut self, cause: io::Error) {
        if let State::BodyOpen(feed) = std::mem::replace(&mut self.state, State::Failed) {
            debug!("aborting open request body: cause={cause}");
            metrics::inc_errors(metrics::ErrorKind::Aborted);
            feed.abort(cause);
        }
    }

    /// Start a new message from a header fragment.
    fn open(&mut self, fragment: C::Fragment) -> Result<AssemblyOutcome, AssemblyError> {
        let classifier = &self.classifier;
        let is_last = classifier.is_last(&fragment);
        let method = classifier.method(&fragment);
        let headers = classifier.headers(&fragment);
        let declared = classifier.declared_content_length(&fragment);
        let target = classifier.target_uri(&fragment);
        let content = classifier.into_content(fragment).unwrap_or_default();

        let request_uri = match target.map(|t| self.config.base_uri.resolve(&t)).transpose() {
            Ok(uri) => uri,
            Err(e) => return Err(self.fail(None, e.into())),
        };
        if is_last
            && let Some(declared) = declared
            && declared != content.len() as u64
        {
            let carried = content.len() as u64;
            return Err(self.fail(
                None,
                AssemblyError::ContentLengthMismatch { declared, carried },
            ));
        }

        let (feed, reader) = body_feed(self.config.feed);
        let parts = RequestParts::new(method, request_uri, headers)
            .with_base_uri(self.config.base_uri.clone());
        let request = LogicalRequest::new(parts, reader);
        metrics::inc_requests();
        debug!(
            "request headers assembled: method={:?}, uri={:?}, last={is_last}",
            request.method(),
            request.request_uri()
        );

        let status = feed.push(content);
        let pause = (status == FeedStatus::Saturated).then(|| feed.drain_signal());
        if is_last {
            feed.finish();
            self.finish_message();
        } else {
            self.state = State::BodyOpen(feed);
        }
        Ok(AssemblyOutcome {
            request: Some(request),
            pause,
            complete: is_last,
        })
    }

    /// Stream a content fragment into the open body.
    fn append(&mut self, feed: BodyFeed, fragment: C::Fragment) -> AssemblyOutcome {
        let is_last = self.classifier.is_last(&fragment);
        let mut pause = None;
        if let Some(chunk) = self.classifier.into_content(fragment) {
            match feed.push(chunk) {
                FeedStatus::Buffered => {}
                FeedStatus::Saturated => pause = Some(feed.drain_signal()),
                FeedStatus::ReaderDropped => {
                    debug!("request body reader dropped; discarding content");
                }
            }
        }
        if is_last {
            feed.finish();
            self.finish_message();
        } else {
            self.state = State::BodyOpen(feed);
        }
        AssemblyOutcome {
            request: None,
            pause,
            complete: is_last,
        }
    }

    fn finish_message(&mut self) {
        self.state = State::Complete;
        self.completed += 1;
    }

    /// Record a protocol error, aborting `feed` if a body was open.
    fn fail(&mut self, feed: Option<BodyFeed>, error: AssemblyError) -> AssemblyError {
        warn!("inbound protocol error: {error}");
        metrics::inc_errors(metrics::ErrorKind::Protocol);
        if let Some(feed) = feed {
            feed.abort(io::Error::new(io::ErrorKind::InvalidData, error.to_string()));
        }
        self.state = State::Failed;
        error
    }
}

impl<C> std::fmt::Debug for InboundMessageAssembler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundMessageAssembler")
            .field("phase", &self.state.phase())
            .field("completed", &self.completed)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
