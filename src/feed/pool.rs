use std::future::Future;

use futures::stream::{self, StreamExt};

use crate::models::FetchResult;

/// Run `fetch` once per source with at most `capacity` in flight.
///
/// Results are published back through the stream as each fetch finishes;
/// this function is their only consumer. The returned list is in input
/// order regardless of completion order.
pub async fn run_all<F, Fut>(sources: Vec<String>, capacity: usize, fetch: F) -> Vec<FetchResult>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = FetchResult>,
{
    let total = sources.len();
    let mut slots: Vec<Option<FetchResult>> = std::iter::repeat_with(|| None).take(total).collect();

    let mut completed = stream::iter(sources.into_iter().enumerate())
        .map(|(index, source)| {
            let pending = fetch(source);
            async move { (index, pending.await) }
        })
        .buffer_unordered(capacity.max(1));

    let mut done = 0;
    while let Some((index, result)) = completed.next().await {
        slots[index] = Some(result);
        done += 1;
        tracing::trace!(done, total, "Feed finished");
    }

    slots.into_iter().flatten().collect()
}
