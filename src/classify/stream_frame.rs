//! Fragment model for multiplexed, flag-terminated streams (HTTP/2 style).

use bytes::Bytes;
use http::{HeaderMap, Method};

use super::{BoundaryClassifier, RequestHead};

/// Frame of a single request stream whose end is signalled by a flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamFrame {
    /// Header block opening the stream.
    Headers { head: RequestHead, end_stream: bool },
    /// Body bytes.
    Data { payload: Bytes, end_stream: bool },
}

/// Classifier for [`StreamFrame`] sequences.
///
/// The end of a message is exactly the frame carrying `end_stream`; no
/// length inference takes place.
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamFrameClassifier;

impl BoundaryClassifier for StreamFrameClassifier {
    type Fragment = StreamFrame;

    fn is_headers(&self, fragment: &StreamFrame) -> bool {
        matches!(fragment, StreamFrame::Headers { .. })
    }

    fn is_last(&self, fragment: &StreamFrame) -> bool {
        match fragment {
            StreamFrame::Headers { end_stream, .. } | StreamFrame::Data { end_stream, .. } => {
                *end_stream
            }
        }
    }

    fn method(&self, fragment: &StreamFrame) -> Option<Method> {
        match fragment {
            StreamFrame::Headers { head, .. } => head.method.clone(),
            StreamFrame::Data { .. } => None,
        }
    }

    fn target_uri(&self, fragment: &StreamFrame) -> Option<String> {
        match fragment {
            StreamFrame::Headers { head, .. } => head.uri.clone(),
            StreamFrame::Data { .. } => None,
        }
    }

    fn headers(&self, fragment: &StreamFrame) -> HeaderMap {
        match fragment {
            StreamFrame::Headers { head, .. } => head.headers.clone(),
            StreamFrame::Data { .. } => HeaderMap::new(),
        }
    }

    fn declared_content_length(&self, fragment: &StreamFrame) -> Option<u64> {
        match fragment {
            StreamFrame::Headers { head, .. } => head.content_length(),
            StreamFrame::Data { .. } => None,
        }
    }

    fn into_content(&self, fragment: StreamFrame) -> Option<Bytes> {
        match fragment {
            StreamFrame::Headers { .. } => None,
            StreamFrame::Data { payload, .. } => Some(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::{Method, header::CONTENT_LENGTH};
    use rstest::rstest;

    use super::{BoundaryClassifier, RequestHead, StreamFrame, StreamFrameClassifier};

    #[rstest]
    fn zero_length_header_block_is_not_last_without_flag() {
        let mut head = RequestHead::new(Method::GET, "/");
        head.headers
            .insert(CONTENT_LENGTH, "0".parse().expect("valid header value"));
        let frame = StreamFrame::Headers {
            head,
            end_stream: false,
        };
        assert!(StreamFrameClassifier.is_headers(&frame));
        assert!(!StreamFrameClassifier.is_last(&frame));
        assert_eq!(StreamFrameClassifier.declared_content_length(&frame), Some(0));
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn data_frame_follows_flag(#[case] end_stream: bool) {
        let frame = StreamFrame::Data {
            payload: Bytes::from_static(b"chunk"),
            end_stream,
        };
        assert!(!StreamFrameClassifier.is_headers(&frame));
        assert_eq!(StreamFrameClassifier.is_last(&frame), end_stream);
        assert_eq!(
            StreamFrameClassifier.into_content(frame),
            Some(Bytes::from_static(b"chunk"))
        );
    }
}
