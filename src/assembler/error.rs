//! Protocol errors raised while assembling inbound messages.

use std::io;

use thiserror::Error;

use crate::request::UriError;

/// Violation of the `headers content* last` fragment grammar, or a failure
/// reported for a connection that already failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    /// A content fragment arrived before any header fragment.
    #[error("content fragment received before headers")]
    MissingHeaders,
    /// A header fragment arrived while a body was still open.
    #[error("headers received while a message body is still open")]
    UnexpectedHeaders,
    /// A content fragment arrived after the message completed.
    #[error("content fragment received after the message completed")]
    AfterComplete,
    /// A single-fragment message carried a different number of bytes than
    /// its headers declared.
    #[error("declared content length {declared} does not match {carried} carried bytes")]
    ContentLengthMismatch { declared: u64, carried: u64 },
    /// The request target could not be resolved.
    #[error("invalid request target: {0}")]
    InvalidTarget(#[from] UriError),
    /// The assembler failed earlier and accepts no further fragments.
    #[error("connection already failed")]
    ConnectionFailed,
}

impl From<AssemblyError> for io::Error {
    fn from(error: AssemblyError) -> Self { io::Error::new(io::ErrorKind::InvalidData, error) }
}
