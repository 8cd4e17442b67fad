//! Unordered parallel map over independent work units.
//!
//! Each unit runs as its own tokio task so a panicking unit is contained and
//! reported instead of taking its siblings down. At most `workers` tasks are
//! alive at any time; results come back in completion order.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// A unit whose task did not return (panicked or was aborted)
#[derive(Debug)]
pub struct UnitPanic<I> {
    /// The input the unit was started with
    pub input: I,
    /// Join error rendered as text
    pub message: String,
}

/// Run `f` once per input with at most `workers` units in flight
///
/// Returns exactly one entry per input, in completion order. Nothing is
/// reordered back to submission order; callers join results on the identity
/// the results carry. `on_complete` is invoked after every finished unit with
/// the number of units finished so far.
///
/// # Examples
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use squidle_dl::parallel::map_unordered;
///
/// let results = map_unordered(vec![1, 2, 3], 2, |n| async move { n * 10 }, |_| {}).await;
/// let mut values: Vec<i32> = results.into_iter().map(|r| r.unwrap()).collect();
/// values.sort();
/// assert_eq!(values, vec![10, 20, 30]);
/// # }
/// ```
pub async fn map_unordered<I, T, F, Fut>(
    inputs: Vec<I>,
    workers: usize,
    f: F,
    mut on_complete: impl FnMut(usize),
) -> Vec<Result<T, UnitPanic<I>>>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let total = inputs.len();
    let mut completed = 0usize;
    let mut results = Vec::with_capacity(total);

    // `map` runs lazily, so a task is only spawned once a slot is free.
    let mut units = stream::iter(inputs)
        .map(|input| {
            let handle = tokio::spawn(f(input.clone()));
            async move {
                handle.await.map_err(|e| UnitPanic {
                    input,
                    message: e.to_string(),
                })
            }
        })
        .buffer_unordered(workers.max(1));

    while let Some(result) = units.next().await {
        if let Err(panic) = &result {
            tracing::error!(error = %panic.message, "worker task did not complete");
        }
        completed += 1;
        on_complete(completed);
        results.push(result);
    }

    debug_assert_eq!(results.len(), total);
    results
}
