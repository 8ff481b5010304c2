//! Helpers for driving the bridge from tests.

use std::{
    io::{self, Read},
    sync::Arc,
};

use duplex_bridge::{
    assembler::{AssemblerConfig, InboundMessageAssembler},
    classify::BoundaryClassifier,
    driver::{DriveSummary, InboundDriver},
    error::BridgeError,
    outbound::{OutboundChannel, OutboundConfig, OutboundStream},
    request::LogicalRequest,
    test_helpers::RecordingChannel,
};
use futures::{Stream, stream};
use rstest::fixture;
use tokio::{runtime::Runtime, sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// Multi-threaded runtime for tests that block on the worker side.
///
/// # Panics
///
/// Panics if the runtime cannot be built.
#[fixture]
pub fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build runtime")
}

/// Stream yielding each fragment as `Ok`.
pub fn fragment_stream<F>(fragments: Vec<F>) -> impl Stream<Item = io::Result<F>> + Unpin {
    stream::iter(fragments.into_iter().map(Ok))
}

/// Open an [`OutboundStream`] over a fresh [`RecordingChannel`].
#[must_use]
pub fn recording_stream(
    runtime: &Runtime,
    config: OutboundConfig,
) -> (Arc<RecordingChannel>, OutboundStream) {
    let channel = Arc::new(RecordingChannel::new());
    let dyn_channel: Arc<dyn OutboundChannel> = channel.clone();
    let stream = OutboundStream::new(dyn_channel, runtime.handle(), config);
    (channel, stream)
}

/// Read `request`'s body to the end on the blocking pool.
pub fn read_body(request: LogicalRequest) -> JoinHandle<io::Result<Vec<u8>>> {
    tokio::task::spawn_blocking(move || {
        let mut body = request.into_body();
        let mut buf = Vec::new();
        body.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

/// Run `fragments` through a fresh assembler until the stream ends.
///
/// Returns every forwarded request, in order, with the driver's summary.
/// Requests are collected after the run, so at most 64 may be produced.
///
/// # Errors
///
/// Returns the [`BridgeError`] that stopped the driver.
pub async fn drive_fragments<C, S>(
    classifier: C,
    config: AssemblerConfig,
    fragments: S,
) -> Result<(Vec<LogicalRequest>, DriveSummary), BridgeError>
where
    C: BoundaryClassifier,
    S: Stream<Item = io::Result<C::Fragment>> + Unpin,
{
    let (tx, mut rx) = mpsc::channel(64);
    let mut driver = InboundDriver::new(InboundMessageAssembler::new(classifier, config), tx);
    let summary = driver.run(fragments, CancellationToken::new()).await?;
    drop(driver);
    let mut requests = Vec::new();
    while let Some(request) = rx.recv().await {
        requests.push(request);
    }
    Ok((requests, summary))
}
