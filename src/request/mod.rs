//! Logical requests handed to the processing layer.
//!
//! A [`LogicalRequest`] is created by the
//! [`InboundMessageAssembler`](crate::assembler::InboundMessageAssembler) as
//! soon as the header fragment of a message arrives. Metadata is available
//! immediately through [`RequestParts`]; the body follows through the
//! blocking [`BodyReader`] while later fragments are still arriving.
//!
//! ```
//! use std::io::Read;
//!
//! use bytes::Bytes;
//! use duplex_bridge::{
//!     feed::{FeedConfig, body_feed},
//!     request::{LogicalRequest, RequestParts},
//! };
//! use http::{HeaderMap, Method};
//!
//! let (feed, reader) = body_feed(FeedConfig::default());
//! let parts = RequestParts::new(Some(Method::POST), Some("/upload".into()), HeaderMap::new());
//! let mut request = LogicalRequest::new(parts, reader);
//!
//! feed.push(Bytes::from_static(b"payload"));
//! feed.finish();
//!
//! let mut body = Vec::new();
//! request.body_mut().read_to_end(&mut body).expect("read body");
//! assert_eq!(request.method(), Some(&Method::POST));
//! assert_eq!(body, b"payload");
//! ```

mod properties;
mod uri;

use http::{HeaderMap, Method};
pub use properties::RequestProperties;
pub use uri::{BaseUri, UriError};

use crate::feed::BodyReader;

/// Request metadata, available before the body.
#[derive(Clone, Debug, Default)]
pub struct RequestParts {
    method: Option<Method>,
    base_uri: BaseUri,
    request_uri: Option<String>,
    headers: HeaderMap,
    properties: RequestProperties,
}

impl RequestParts {
    /// Create parts with the default base URI and no properties.
    ///
    /// `request_uri` is stored as given; callers resolve it beforehand.
    #[must_use]
    pub fn new(method: Option<Method>, request_uri: Option<String>, headers: HeaderMap) -> Self {
        Self {
            method,
            request_uri,
            headers,
            ..Self::default()
        }
    }

    /// Record the base URI the request target was resolved against.
    #[must_use]
    pub fn with_base_uri(mut self, base_uri: BaseUri) -> Self {
        self.base_uri = base_uri;
        self
    }

    /// Request method, absent if the decoder did not provide one.
    #[must_use]
    pub const fn method(&self) -> Option<&Method> { self.method.as_ref() }

    /// Base URI in effect for this request.
    #[must_use]
    pub const fn base_uri(&self) -> &BaseUri { &self.base_uri }

    /// Request URI after resolution against the base URI.
    #[must_use]
    pub fn request_uri(&self) -> Option<&str> { self.request_uri.as_deref() }

    /// Header fields.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap { &self.headers }

    /// Mutable header fields.
    pub const fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }

    /// Request properties.
    #[must_use]
    pub const fn properties(&self) -> &RequestProperties { &self.properties }

    /// Mutable request properties.
    pub const fn properties_mut(&mut self) -> &mut RequestProperties { &mut self.properties }
}

/// One reconstructed inbound request: metadata plus a blocking body.
#[derive(Debug)]
pub struct LogicalRequest {
    parts: RequestParts,
    body: BodyReader,
}

impl LogicalRequest {
    /// Pair request metadata with its body reader.
    #[must_use]
    pub const fn new(parts: RequestParts, body: BodyReader) -> Self { Self { parts, body } }

    /// Request metadata.
    #[must_use]
    pub const fn parts(&self) -> &RequestParts { &self.parts }

    /// Mutable request metadata.
    pub const fn parts_mut(&mut self) -> &mut RequestParts { &mut self.parts }

    /// Request method.
    #[must_use]
    pub const fn method(&self) -> Option<&Method> { self.parts.method() }

    /// Resolved request URI.
    #[must_use]
    pub fn request_uri(&self) -> Option<&str> { self.parts.request_uri() }

    /// Header fields.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap { self.parts.headers() }

    /// Request properties.
    #[must_use]
    pub const fn properties(&self) -> &RequestProperties { self.parts.properties() }

    /// Mutable request properties.
    pub const fn properties_mut(&mut self) -> &mut RequestProperties {
        self.parts.properties_mut()
    }

    /// Body reader. Reads block until bytes arrive or the body ends.
    pub const fn body_mut(&mut self) -> &mut BodyReader { &mut self.body }

    /// Discard the metadata and keep the body.
    #[must_use]
    pub fn into_body(self) -> BodyReader { self.body }

    /// Split into metadata and body.
    #[must_use]
    pub fn into_parts(self) -> (RequestParts, BodyReader) { (self.parts, self.body) }
}

#[cfg(test)]
mod tests {
    use std::{io::Read, sync::Arc};

    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, Method, header::CONTENT_TYPE};
    use rstest::rstest;

    use super::{BaseUri, LogicalRequest, RequestParts};
    use crate::feed::{FeedConfig, body_feed};

    #[rstest]
    fn parts_expose_metadata() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let base: BaseUri = "http://example.com/".parse().expect("valid base");
        let parts = RequestParts::new(Some(Method::PUT), Some("http://example.com/x".into()), headers)
            .with_base_uri(base.clone());

        assert_eq!(parts.method(), Some(&Method::PUT));
        assert_eq!(parts.request_uri(), Some("http://example.com/x"));
        assert_eq!(parts.base_uri(), &base);
        assert_eq!(
            parts.headers().get(CONTENT_TYPE),
            Some(&HeaderValue::from_static("text/plain"))
        );
        assert!(parts.properties().is_empty());
    }

    #[rstest]
    fn missing_method_and_target_stay_absent() {
        let parts = RequestParts::new(None, None, HeaderMap::new());
        assert!(parts.method().is_none());
        assert!(parts.request_uri().is_none());
        assert_eq!(parts.base_uri().as_str(), "/");
    }

    #[rstest]
    fn properties_travel_with_the_request() {
        let (feed, reader) = body_feed(FeedConfig::default());
        feed.finish();
        let mut request = LogicalRequest::new(RequestParts::default(), reader);

        request.properties_mut().insert("attempt", 3u32);
        request.properties_mut().insert("user", String::from("ada"));
        assert_eq!(request.properties().get::<u32>("attempt"), Some(Arc::new(3)));
        assert!(request.properties().contains("user"));
        assert!(request.properties_mut().remove("user"));
        assert!(!request.properties_mut().remove("user"));

        let mut names: Vec<_> = request.properties().names().collect();
        names.sort_unstable();
        assert_eq!(names, ["attempt"]);
        assert_eq!(request.properties().len(), 1);
    }

    #[rstest]
    fn into_parts_keeps_the_body_readable() {
        let (feed, reader) = body_feed(FeedConfig::default());
        let request = LogicalRequest::new(
            RequestParts::new(Some(Method::POST), Some("/".into()), HeaderMap::new()),
            reader,
        );
        feed.push(Bytes::from_static(b"abc"));
        feed.finish();

        let (parts, mut body) = request.into_parts();
        let mut buf = String::new();
        body.read_to_string(&mut buf).expect("read body");
        assert_eq!(parts.method(), Some(&Method::POST));
        assert_eq!(buf, "abc");
    }
}
