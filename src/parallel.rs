//! Bounded-concurrency fan-out primitives shared by the parallel strategies.
//!
//! Cancellation is cooperative, not a forced abort: a `watch` channel carries
//! a "winner declared" flag that each in-flight task races against its own
//! work via `tokio::select!`, checked again before acquiring a concurrency
//! permit. This mirrors the checkpoint-based cancellation model (before the
//! call, on completion of each sibling) without depending on `tokio-util`.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::errors::ProviderError;

pub struct FanOutAny<T> {
    pub winner: Option<(usize, T)>,
    pub failures: Vec<(usize, ProviderError)>,
    pub cancelled: Vec<usize>,
}

/// Runs `task_fn(0..n)` concurrently (bounded by `max_concurrency`), returning
/// as soon as the first success lands. Siblings still in flight are signalled
/// to stop at their next checkpoint; already-finished siblings are collected
/// into `failures`/`cancelled`.
pub async fn fan_out_any<T, Fut, F>(n: usize, max_concurrency: usize, task_fn: F) -> FanOutAny<T>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, ProviderError>> + Send + 'static,
    F: Fn(usize) -> Fut,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut set = JoinSet::new();

    for i in 0..n {
        let sem = semaphore.clone();
        let mut rx = cancel_rx.clone();
        let fut = task_fn(i);
        set.spawn(async move {
            if *rx.borrow() {
                return (i, Err(ProviderError::Cancelled));
            }
            let _permit = match sem.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (i, Err(ProviderError::Cancelled)),
            };
            if *rx.borrow() {
                return (i, Err(ProviderError::Cancelled));
            }
            tokio::select! {
                res = fut => (i, res),
                _ = rx.changed() => (i, Err(ProviderError::Cancelled)),
            }
        });
    }
    drop(cancel_rx);

    let mut winner = None;
    let mut failures = Vec::new();
    let mut cancelled = Vec::new();
    while let Some(joined) = set.join_next().await {
        let (i, result) = match joined {
            Ok(pair) => pair,
            Err(_join_err) => continue,
        };
        match result {
            Ok(value) => {
                if winner.is_none() {
                    winner = Some((i, value));
                    let _ = cancel_tx.send(true);
                }
            }
            Err(ProviderError::Cancelled) => cancelled.push(i),
            Err(err) => failures.push((i, err)),
        }
    }
    FanOutAny { winner, failures, cancelled }
}

/// Runs every `task_fn(0..n)` to completion (bounded by `max_concurrency`),
/// returning all results ordered by declaration index.
pub async fn fan_out_all<T, Fut, F>(n: usize, max_concurrency: usize, task_fn: F) -> Vec<(usize, Result<T, ProviderError>)>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, ProviderError>> + Send + 'static,
    F: Fn(usize) -> Fut,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut set = JoinSet::new();
    for i in 0..n {
        let sem = semaphore.clone();
        let fut = task_fn(i);
        set.spawn(async move {
            let _permit = sem.acquire_owned().await;
            (i, fut.await)
        });
    }
    let mut results = Vec::with_capacity(n);
    while let Some(joined) = set.join_next().await {
        if let Ok(pair) = joined {
            results.push(pair);
        }
    }
    results.sort_by_key(|(i, _)| *i);
    results
}
