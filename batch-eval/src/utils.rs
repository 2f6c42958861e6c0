use crate::types::{BatchTestError, Result};
use futures::future::try_join_all;
use std::future::Future;
use tokio::sync::Semaphore;

/// Lazily splits `items` into contiguous groups of `batch_size`, the last
/// group holding whatever remains.
pub fn batch<I>(items: I, batch_size: usize) -> Result<Batches<I::IntoIter>>
where
    I: IntoIterator,
{
    if batch_size == 0 {
        return Err(BatchTestError::invalid_argument(
            "batch_size",
            "must be greater than zero",
        ));
    }

    Ok(Batches {
        items: items.into_iter(),
        batch_size,
    })
}

pub struct Batches<I> {
    items: I,
    batch_size: usize,
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let group: Vec<_> = self.items.by_ref().take(self.batch_size).collect();
        if group.is_empty() {
            None
        } else {
            Some(group)
        }
    }
}

/// Runs `selector` over every item with at most `degree_of_parallelism`
/// invocations in flight. Output `i` belongs to input `i`; the first error
/// drops the remaining work.
pub async fn select_async<I, F, Fut, T>(
    items: I,
    selector: F,
    degree_of_parallelism: usize,
) -> Result<Vec<T>>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if degree_of_parallelism == 0 {
        return Err(BatchTestError::invalid_argument(
            "degree_of_parallelism",
            "must be greater than zero",
        ));
    }

    let semaphore = Semaphore::new(degree_of_parallelism);
    let semaphore = &semaphore;
    let selector = &selector;

    let tasks = items.into_iter().map(|item| async move {
        // Permits are handed out in FIFO order, so admission follows input order.
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|_| BatchTestError::Cancelled)?;
        selector(item).await
    });

    try_join_all(tasks).await
}
