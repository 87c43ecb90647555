use anyhow::Result;
use futures::{stream, Future, StreamExt};
use std::time::{SystemTime, UNIX_EPOCH};

/// The current UNIX timestamp, in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Runs `fetch` for every id with at most `width` calls in flight.
///
/// # Arguments
/// * `ids` - The ids to fetch.
/// * `width` - The maximum number of concurrent calls. Zero is treated as one.
/// * `fetch` - The per-id call.
///
/// # Returns
/// * `Vec<(u64, Result<T>)>` - One entry per id, in completion order. A failed call never
/// aborts the others.
pub async fn fetch_bounded<T, F, Fut>(ids: Vec<u64>, width: usize, fetch: F) -> Vec<(u64, Result<T>)>
where
    F: Fn(u64) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    stream::iter(ids)
        .map(|id| {
            let call = fetch(id);
            async move { (id, call.await) }
        })
        .buffer_unordered(width.max(1))
        .collect()
        .await
}
