use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct BatchOptions<T> {
    /// Concurrent workers. `0` is treated as `1`.
    pub max_workers: usize,
    /// Substituted for every item that fails or panics.
    pub default: T,
    /// Log completion progress at `info` level.
    pub show_progress: bool,
}

impl<T> BatchOptions<T> {
    pub fn new(max_workers: usize, default: T) -> Self {
        Self {
            max_workers,
            default,
            show_progress: false,
        }
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

/// Applies `op` to every item with at most `max_workers` in flight.
///
/// The output has one entry per input, in input order. Each item runs in its own task,
/// so an error or a panic only replaces that item's result with `options.default`.
pub async fn run_ordered<I, T, E, F, Fut>(items: Vec<I>, options: BatchOptions<T>, op: F) -> Vec<T>
where
    I: Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Display + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let queue: Arc<Mutex<VecDeque<(usize, I)>>> =
        Arc::new(Mutex::new(items.into_iter().enumerate().collect()));
    let results: Arc<Mutex<Vec<Option<T>>>> = Arc::new(Mutex::new(vec![None; total]));
    let completed = Arc::new(AtomicUsize::new(0));
    let op = Arc::new(op);

    let workers = options.max_workers.max(1).min(total);
    let mut set = JoinSet::new();

    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let results = Arc::clone(&results);
        let completed = Arc::clone(&completed);
        let op = Arc::clone(&op);
        let show_progress = options.show_progress;

        set.spawn(async move {
            loop {
                let next = queue.lock().pop_front();
                let Some((index, item)) = next else {
                    break;
                };

                let outcome = tokio::spawn((*op)(item)).await;
                let value = match outcome {
                    Ok(Ok(value)) => Some(value),
                    Ok(Err(e)) => {
                        warn!(index, error = %e, "batch item failed, using default");
                        None
                    }
                    Err(e) => {
                        warn!(index, error = %e, "batch item panicked, using default");
                        None
                    }
                };
                results.lock()[index] = value;

                let done = completed.fetch_add(1, Ordering::AcqRel) + 1;
                if show_progress {
                    info!(done, total, "batch progress");
                }
            }
        });
    }

    while let Some(joined) = set.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "batch worker stopped unexpectedly");
        }
    }

    let mut slots = results.lock();
    slots
        .iter_mut()
        .map(|slot| slot.take().unwrap_or_else(|| options.default.clone()))
        .collect()
}
