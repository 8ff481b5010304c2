//! Metric helpers for `duplex-bridge`.
//!
//! This module defines metric names and simple helper functions wrapping
//! the [`metrics`](https://docs.rs/metrics) crate. Without the `metrics`
//! feature every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking frames submitted to outbound channels.
pub const FRAMES_SUBMITTED: &str = "duplex_bridge_frames_submitted_total";
/// Name of the counter tracking inbound fragments accepted by assemblers.
pub const FRAGMENTS_RECEIVED: &str = "duplex_bridge_fragments_received_total";
/// Name of the counter tracking logical requests handed to the processing
/// layer.
pub const REQUESTS_ASSEMBLED: &str = "duplex_bridge_requests_assembled_total";
/// Name of the counter tracking error occurrences.
pub const ERRORS_TOTAL: &str = "duplex_bridge_errors_total";

/// Category of a recorded error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// An asynchronous channel submission failed.
    Channel,
    /// Fragments arrived out of order.
    Protocol,
    /// A body stream was cut short by the connection.
    Aborted,
}

impl ErrorKind {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Channel => "channel",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Aborted => "aborted",
        }
    }
}

/// Record a frame accepted by an outbound channel.
pub fn inc_frames_submitted() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_SUBMITTED).increment(1);
}

/// Record an inbound fragment accepted by an assembler.
pub fn inc_fragments() {
    #[cfg(feature = "metrics")]
    counter!(FRAGMENTS_RECEIVED).increment(1);
}

/// Record a logical request emitted by an assembler.
pub fn inc_requests() {
    #[cfg(feature = "metrics")]
    counter!(REQUESTS_ASSEMBLED).increment(1);
}

/// Record an error occurrence of the given kind.
pub fn inc_errors(kind: ErrorKind) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}
