//! Unit tests for the body feed queue.

use std::{
    io::{self, BufRead, Read},
    num::NonZeroUsize,
    thread,
    time::Duration,
};

use bytes::Bytes;
use rstest::{fixture, rstest};

use super::{FeedConfig, FeedStatus, body_feed};

#[fixture]
fn small_config() -> FeedConfig {
    let high = NonZeroUsize::new(8).expect("non-zero watermark");
    FeedConfig::default().with_watermarks(high, 4)
}

#[rstest]
fn delivers_chunks_in_order_then_ends() {
    let (feed, mut reader) = body_feed(FeedConfig::default());
    feed.push(Bytes::from_static(b"hello "));
    feed.push(Bytes::from_static(b"world"));
    feed.finish();

    let mut body = Vec::new();
    reader.read_to_end(&mut body).expect("body should end cleanly");
    assert_eq!(body, b"hello world");
    assert!(reader.is_finished());

    let mut buf = [0u8; 4];
    assert_eq!(reader.read(&mut buf).expect("read after end"), 0);
}

#[rstest]
fn empty_chunks_are_ignored() {
    let (feed, mut reader) = body_feed(FeedConfig::default());
    assert_eq!(feed.push(Bytes::new()), FeedStatus::Buffered);
    assert_eq!(feed.buffered(), 0);
    feed.finish();
    let mut body = Vec::new();
    reader.read_to_end(&mut body).expect("empty body");
    assert!(body.is_empty());
}

#[rstest]
fn dropped_producer_is_an_error_not_an_end() {
    let (feed, mut reader) = body_feed(FeedConfig::default());
    feed.push(Bytes::from_static(b"partial"));
    drop(feed);

    let mut buf = [0u8; 7];
    reader.read_exact(&mut buf).expect("queued bytes still readable");
    assert_eq!(&buf, b"partial");

    let err = reader.read(&mut buf).expect_err("truncated body must fail");
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    let again = reader.read(&mut buf).expect_err("failure is sticky");
    assert_eq!(again.kind(), io::ErrorKind::UnexpectedEof);
}

#[rstest]
fn abort_follows_queued_bytes() {
    let (feed, mut reader) = body_feed(FeedConfig::default());
    feed.push(Bytes::from_static(b"ok"));
    feed.abort(io::Error::new(io::ErrorKind::InvalidData, "bad fragment order"));

    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf).expect("bytes before abort");
    let err = reader.read(&mut buf).expect_err("abort surfaces");
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    assert_eq!(err.to_string(), "bad fragment order");
}

#[rstest]
fn saturation_reported_above_high_watermark(small_config: FeedConfig) {
    let (feed, mut reader) = body_feed(small_config);
    assert_eq!(feed.push(Bytes::from_static(b"12345678")), FeedStatus::Buffered);
    assert_eq!(feed.push(Bytes::from_static(b"9")), FeedStatus::Saturated);
    assert_eq!(feed.buffered(), 9);

    let signal = feed.drain_signal();
    assert!(!signal.is_drained());

    let mut buf = [0u8; 5];
    reader.read_exact(&mut buf).expect("consume five bytes");
    assert_eq!(feed.buffered(), 4);
    assert!(signal.is_drained());
}

#[rstest]
fn buf_read_consumes_incrementally() {
    let (feed, mut reader) = body_feed(FeedConfig::default());
    feed.push(Bytes::from_static(b"line one\nline two\n"));
    feed.finish();

    let lines: Vec<String> = reader
        .by_ref()
        .lines()
        .collect::<io::Result<_>>()
        .expect("lines");
    assert_eq!(lines, vec!["line one", "line two"]);
}

#[rstest]
fn push_after_reader_drop_reports_it(small_config: FeedConfig) {
    let (feed, reader) = body_feed(small_config);
    let signal = feed.drain_signal();
    feed.push(Bytes::from_static(b"0123456789"));
    drop(reader);
    assert!(feed.is_reader_dropped());
    assert!(signal.is_drained());
    assert_eq!(
        feed.push(Bytes::from_static(b"more")),
        FeedStatus::ReaderDropped
    );
}

#[rstest]
fn blocked_reader_wakes_when_bytes_arrive() {
    let (feed, mut reader) = body_feed(FeedConfig::default());
    let handle = thread::spawn(move || {
        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).expect("read wakes with data");
        buf[..n].to_vec()
    });

    thread::sleep(Duration::from_millis(50));
    assert_eq!(feed.push(Bytes::from_static(b"late")), FeedStatus::Buffered);

    let received = handle.join().expect("reader thread panicked");
    assert_eq!(received, b"late");
}

#[rstest]
#[tokio::test]
async fn drain_signal_resolves_after_consumption(small_config: FeedConfig) {
    let (feed, mut reader) = body_feed(small_config);
    assert_eq!(
        feed.push(Bytes::from_static(b"0123456789")),
        FeedStatus::Saturated
    );
    let signal = feed.drain_signal();

    let consumer = tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 10];
        reader.read_exact(&mut buf).expect("consume backlog");
        reader
    });

    tokio::time::timeout(Duration::from_secs(5), signal.wait())
        .await
        .expect("drain signal should fire");
    let _reader = consumer.await.expect("consumer task panicked");
    assert_eq!(feed.buffered(), 0);
}
