//! Wire-format hooks classifying inbound fragments.
//!
//! The [`InboundMessageAssembler`](crate::assembler::InboundMessageAssembler)
//! knows nothing about a particular wire format. It asks a
//! [`BoundaryClassifier`] whether a fragment carries headers, whether it is
//! the last fragment of its message, and what method, target and body bytes
//! it holds. Each wire format supplies its own fragment type and classifier:
//!
//! - [`Http1Classifier`] over [`HttpFragment`], where a message ends with a
//!   last-content fragment or a header block declaring `Content-Length: 0`.
//! - [`StreamFrameClassifier`] over [`StreamFrame`], where every frame
//!   carries an explicit end-of-stream flag.
//!
//! Classifiers are pure: they never mutate the fragment or keep state.

mod http1;
mod stream_frame;

use bytes::Bytes;
pub use http1::{Http1Classifier, HttpFragment};
use http::{HeaderMap, Method, header::CONTENT_LENGTH};
pub use stream_frame::{StreamFrame, StreamFrameClassifier};

/// Decoded request metadata carried by a headers fragment.
///
/// Produced by the external wire decoder. Method and target are optional so
/// that decoders can forward incomplete header blocks; the assembler
/// propagates their absence instead of failing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestHead {
    /// Request method.
    pub method: Option<Method>,
    /// Request target exactly as received.
    pub uri: Option<String>,
    /// Header fields.
    pub headers: HeaderMap,
}

impl RequestHead {
    /// Build a head from a method and target with no header fields.
    #[must_use]
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method: Some(method),
            uri: Some(uri.into()),
            headers: HeaderMap::new(),
        }
    }

    /// Value of the `Content-Length` field.
    ///
    /// Returns `None` when the field is missing or does not parse as an
    /// unsigned integer; an unknown length is never treated as zero.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    }
}

/// Capability set the assembler uses to interpret fragments of one wire
/// format.
pub trait BoundaryClassifier: Send + Sync + 'static {
    /// Fragment type produced by the wire decoder.
    type Fragment: Send + 'static;

    /// Whether the fragment carries message metadata (method, target and
    /// headers).
    fn is_headers(&self, fragment: &Self::Fragment) -> bool;

    /// Whether the fragment is the final one of its logical message.
    fn is_last(&self, fragment: &Self::Fragment) -> bool;

    /// Method of a headers fragment.
    fn method(&self, fragment: &Self::Fragment) -> Option<Method>;

    /// Request target of a headers fragment, unresolved.
    fn target_uri(&self, fragment: &Self::Fragment) -> Option<String>;

    /// Header fields of a headers fragment. Other fragments yield an empty
    /// map.
    fn headers(&self, fragment: &Self::Fragment) -> HeaderMap;

    /// Body length declared by a headers fragment, when known.
    fn declared_content_length(&self, fragment: &Self::Fragment) -> Option<u64>;

    /// Consume the fragment and return the body bytes it carries, if any.
    fn into_content(&self, fragment: Self::Fragment) -> Option<Bytes>;
}
