//! Bounded-concurrency batch runner.

use std::future::Future;

use futures_util::future::join_all;
use tracing::debug;

/// Run tasks in batches of at most `limit`, stopping after the first failure.
///
/// Each task is a thunk that only starts its work when called. A batch is
/// started together and fully awaited before the next one begins; results
/// come back in submission order. When any task of a batch fails, its
/// siblings still run to completion, no later batch is started, and the
/// first error in submission order is returned. Successful results of the
/// run are discarded in that case.
///
/// Everything is polled on the calling task: "concurrent" means several
/// external calls in flight, not parallel threads.
pub async fn run_bounded<I, F, Fut, T, E>(tasks: I, limit: usize) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let limit = limit.max(1);
    let mut pending = tasks.into_iter().peekable();
    let mut results = Vec::new();
    let mut batch_number = 0usize;

    while pending.peek().is_some() {
        batch_number += 1;
        let batch: Vec<Fut> = pending.by_ref().take(limit).map(|task| task()).collect();
        debug!("Starting batch {} with {} tasks", batch_number, batch.len());

        let mut first_error = None;
        for outcome in join_all(batch).await {
            match outcome {
                Ok(value) => results.push(value),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            debug!("Batch {} failed, not starting remaining tasks", batch_number);
            return Err(e);
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    #[tokio::test]
    async fn test_batches_run_together_and_keep_order() {
        let log = RefCell::new(Vec::new());
        let tasks = (0..5).map(|i| {
            let log = &log;
            move || async move {
                log.borrow_mut().push(format!("start {i}"));
                tokio::task::yield_now().await;
                log.borrow_mut().push(format!("end {i}"));
                Ok::<_, String>(i * 10)
            }
        });

        let results = run_bounded(tasks, 3).await.unwrap();
        assert_eq!(results, vec![0, 10, 20, 30, 40]);
        assert_eq!(
            log.into_inner(),
            vec![
                "start 0", "start 1", "start 2", "end 0", "end 1", "end 2", "start 3", "start 4",
                "end 3", "end 4",
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_stops_later_batches_but_not_siblings() {
        let started = RefCell::new(Vec::new());
        let finished = RefCell::new(Vec::new());
        let tasks = (0..6).map(|i| {
            let (started, finished) = (&started, &finished);
            move || async move {
                started.borrow_mut().push(i);
                tokio::task::yield_now().await;
                finished.borrow_mut().push(i);
                if i == 1 || i == 2 {
                    Err(format!("task {i} failed"))
                } else {
                    Ok(i)
                }
            }
        });

        let result = run_bounded(tasks, 3).await;
        assert_eq!(result, Err("task 1 failed".to_string()));
        assert_eq!(started.into_inner(), vec![0, 1, 2]);
        assert_eq!(finished.into_inner(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_empty_and_zero_limit() {
        let none: Vec<fn() -> std::future::Ready<Result<u8, ()>>> = Vec::new();
        assert_eq!(run_bounded(none, 3).await, Ok(vec![]));

        let tasks = (0..3u8).map(|i| move || std::future::ready(Ok::<_, ()>(i)));
        assert_eq!(run_bounded(tasks, 0).await, Ok(vec![0, 1, 2]));
    }
}
