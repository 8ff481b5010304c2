//! Shared utilities for integration tests.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use bytes::Bytes;

/// Shared result type for fallible tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Split `data` at the sorted, de-duplicated `cuts`, keeping empty pieces
/// out of the result.
pub fn split_at(data: &[u8], cuts: &[usize]) -> Vec<Bytes> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (data.len() + 1)).collect();
    points.sort_unstable();
    points.dedup();
    let mut pieces = Vec::new();
    let mut start = 0;
    for point in points.into_iter().chain(std::iter::once(data.len())) {
        if point > start {
            pieces.push(Bytes::copy_from_slice(&data[start..point]));
            start = point;
        }
    }
    pieces
}
