//! Bounded worker pool for background execution.
//!
//! Submissions beyond the queue capacity are rejected, not silently dropped:
//! `try_submit` returns `PoolSaturated` and the caller decides (the task
//! runner logs and re-queues the claimed row).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::debug;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Returned when the pool's queue is full.
#[derive(Debug)]
pub struct PoolSaturated;

impl fmt::Display for PoolSaturated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker pool queue is full")
    }
}

impl std::error::Error for PoolSaturated {}

/// A fixed set of workers draining a bounded queue.
pub struct WorkerPool {
    tx: mpsc::Sender<Job>,
    workers: usize,
}

impl WorkerPool {
    /// Spawn `workers` consumers sharing a queue of `queue_capacity` slots.
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..workers {
            let rx = rx.clone();
            tokio::spawn(async move {
                loop {
                    // The guard is dropped before the job runs so another
                    // worker can pick up the next submission concurrently.
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(job) => {
                            debug!(worker_id, "worker picked up job");
                            job.await;
                        }
                        None => break,
                    }
                }
            });
        }

        Self { tx, workers }
    }

    /// Enqueue a job, failing immediately when the queue is full.
    pub fn try_submit<F>(&self, job: F) -> Result<(), PoolSaturated>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tx.try_send(Box::pin(job)).map_err(|_| PoolSaturated)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}
