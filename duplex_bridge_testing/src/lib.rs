//! Utilities for exercising `duplex-bridge` in tests.
//!
//! The crate bundles a shared log capture fixture, a multi-threaded runtime
//! fixture, a [`RecordingChannel`] for the outbound side and helpers feeding
//! fragment streams through an assembler.
//!
//! ```rust
//! use duplex_bridge::{assembler::AssemblerConfig, classify::Http1Classifier};
//! use duplex_bridge_testing::{drive_fragments, fragment_stream, http_head};
//! use http::Method;
//!
//! # async fn demo() {
//! let fragments = fragment_stream(vec![http_head(Method::GET, "/", Some(0))]);
//! let (requests, summary) =
//!     drive_fragments(Http1Classifier, AssemblerConfig::default(), fragments)
//!         .await
//!         .expect("driver run");
//! assert_eq!(requests.len(), 1);
//! assert_eq!(summary.fragments, 1);
//! # }
//! ```

pub mod helpers;
pub mod logging;

pub use duplex_bridge::test_helpers::{
    RecordingChannel,
    http_content,
    http_head,
    http_last,
    request_head,
    stream_data,
};
pub use helpers::{drive_fragments, fragment_stream, read_body, recording_stream, runtime};
pub use logging::{LoggerHandle, logger};
