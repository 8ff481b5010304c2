#![doc(html_root_url = "https://docs.rs/duplex-bridge/latest")]
//! Public API for the `duplex-bridge` library.
//!
//! This crate bridges an asynchronous, event-driven network channel running
//! on a tokio runtime and a synchronous request processing layer that reads
//! and writes through blocking [`std::io::Read`] and [`std::io::Write`].
//!
//! - The outbound half turns blocking writes into ordered, asynchronous
//!   frame submissions: see [`OutboundStream`] and [`ChannelWriteGate`].
//! - The inbound half reconstructs [`LogicalRequest`]s from classified wire
//!   fragments and exposes each body as a blocking reader fed while
//!   fragments are still arriving: see [`InboundMessageAssembler`] and
//!   [`InboundDriver`].

pub mod assembler;
pub mod buffer;
pub mod classify;
pub mod driver;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod outbound;
pub mod request;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use assembler::{
    AssemblerConfig,
    AssemblerPhase,
    AssemblyError,
    AssemblyOutcome,
    InboundMessageAssembler,
};
pub use buffer::{BufferError, BufferFactory, CopyingFactory, FrameBuffer, ZeroCopy};
pub use classify::{
    BoundaryClassifier,
    Http1Classifier,
    HttpFragment,
    RequestHead,
    StreamFrame,
    StreamFrameClassifier,
};
pub use driver::{DriveSummary, InboundDriver};
pub use error::BridgeError;
pub use feed::{BodyFeed, BodyReader, DrainSignal, FeedConfig, FeedStatus, body_feed};
pub use metrics::{ERRORS_TOTAL, FRAGMENTS_RECEIVED, FRAMES_SUBMITTED, REQUESTS_ASSEMBLED};
pub use outbound::{
    ChannelWriteGate,
    FlushThreshold,
    MpscChannel,
    OutboundChannel,
    OutboundConfig,
    OutboundError,
    OutboundFrame,
    OutboundStream,
};
pub use request::{BaseUri, LogicalRequest, RequestParts, RequestProperties};
