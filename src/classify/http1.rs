//! HTTP/1.x fragment model and classifier.

use bytes::Bytes;
use http::{HeaderMap, Method};

use super::{BoundaryClassifier, RequestHead};

/// Unit produced by an HTTP/1.x decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HttpFragment {
    /// Request line and header block.
    Head(RequestHead),
    /// A chunk of body bytes.
    Content(Bytes),
    /// The final chunk of body bytes, possibly empty.
    LastContent(Bytes),
    /// A complete message: header block and whole body in one fragment.
    Full { head: RequestHead, body: Bytes },
}

impl HttpFragment {
    fn head(&self) -> Option<&RequestHead> {
        match self {
            Self::Head(head) | Self::Full { head, .. } => Some(head),
            Self::Content(_) | Self::LastContent(_) => None,
        }
    }
}

/// Classifier for [`HttpFragment`] streams.
///
/// A fragment is last when it is a [`HttpFragment::LastContent`] or
/// [`HttpFragment::Full`], or when it is a [`HttpFragment::Head`] whose
/// `Content-Length` is exactly zero. A header block with a missing or
/// unparsable length expects a body.
///
/// # Examples
///
/// ```
/// use duplex_bridge::classify::{BoundaryClassifier, Http1Classifier, HttpFragment, RequestHead};
/// use http::{Method, header::CONTENT_LENGTH};
///
/// let mut head = RequestHead::new(Method::GET, "/health");
/// head.headers.insert(CONTENT_LENGTH, "0".parse().expect("valid header"));
///
/// assert!(Http1Classifier.is_last(&HttpFragment::Head(head)));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Http1Classifier;

impl BoundaryClassifier for Http1Classifier {
    type Fragment = HttpFragment;

    fn is_headers(&self, fragment: &HttpFragment) -> bool { fragment.head().is_some() }

    fn is_last(&self, fragment: &HttpFragment) -> bool {
        match fragment {
            HttpFragment::LastContent(_) | HttpFragment::Full { .. } => true,
            HttpFragment::Head(head) => head.content_length() == Some(0),
            HttpFragment::Content(_) => false,
        }
    }

    fn method(&self, fragment: &HttpFragment) -> Option<Method> {
        fragment.head()?.method.clone()
    }

    fn target_uri(&self, fragment: &HttpFragment) -> Option<String> {
        fragment.head()?.uri.clone()
    }

    fn headers(&self, fragment: &HttpFragment) -> HeaderMap {
        fragment
            .head()
            .map(|head| head.headers.clone())
            .unwrap_or_default()
    }

    fn declared_content_length(&self, fragment: &HttpFragment) -> Option<u64> {
        fragment.head()?.content_length()
    }

    fn into_content(&self, fragment: HttpFragment) -> Option<Bytes> {
        match fragment {
            HttpFragment::Head(_) => None,
            HttpFragment::Content(body)
            | HttpFragment::LastContent(body)
            | HttpFragment::Full { body, .. } => Some(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::{Method, header::CONTENT_LENGTH};
    use rstest::rstest;

    use super::{BoundaryClassifier, Http1Classifier, HttpFragment, RequestHead};

    fn head_with_length(length: Option<&str>) -> RequestHead {
        let mut head = RequestHead::new(Method::POST, "/upload");
        if let Some(value) = length {
            head.headers
                .insert(CONTENT_LENGTH, value.parse().expect("valid header value"));
        }
        head
    }

    #[rstest]
    #[case(Some("0"), true)]
    #[case(Some("12"), false)]
    #[case(Some("zero"), false)]
    #[case(None, false)]
    fn head_is_last_only_for_zero_length(#[case] length: Option<&str>, #[case] expected: bool) {
        let fragment = HttpFragment::Head(head_with_length(length));
        assert_eq!(Http1Classifier.is_last(&fragment), expected);
        assert!(Http1Classifier.is_headers(&fragment));
    }

    #[rstest]
    #[case(HttpFragment::Content(Bytes::from_static(b"a")), false, false)]
    #[case(HttpFragment::LastContent(Bytes::new()), false, true)]
    #[case(
        HttpFragment::Full { head: head_with_length(Some("1")), body: Bytes::from_static(b"a") },
        true,
        true
    )]
    fn classifies_fragment_kinds(
        #[case] fragment: HttpFragment,
        #[case] headers: bool,
        #[case] last: bool,
    ) {
        assert_eq!(Http1Classifier.is_headers(&fragment), headers);
        assert_eq!(Http1Classifier.is_last(&fragment), last);
    }

    #[rstest]
    fn metadata_absence_propagates() {
        let fragment = HttpFragment::Head(RequestHead::default());
        assert_eq!(Http1Classifier.method(&fragment), None);
        assert_eq!(Http1Classifier.target_uri(&fragment), None);

        let content = HttpFragment::Content(Bytes::from_static(b"x"));
        assert_eq!(Http1Classifier.method(&content), None);
        assert!(Http1Classifier.headers(&content).is_empty());
    }

    #[rstest]
    fn full_fragment_yields_body() {
        let fragment = HttpFragment::Full {
            head: head_with_length(Some("3")),
            body: Bytes::from_static(b"abc"),
        };
        assert_eq!(Http1Classifier.declared_content_length(&fragment), Some(3));
        assert_eq!(
            Http1Classifier.into_content(fragment),
            Some(Bytes::from_static(b"abc"))
        );
    }
}
