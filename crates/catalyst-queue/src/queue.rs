//! The Admission Queue (C11): an unbounded FIFO backlog drained by a fixed
//! pool of `MAX_CONCURRENT` workers.
//!
//! `enqueue` never blocks and never rejects; the backlog itself is an
//! unbounded channel so a caller can never observe backpressure from it. The
//! concurrency ceiling lives entirely in how many workers pull from that
//! channel, not in the channel's capacity.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("admission queue is no longer accepting tasks")]
    ChannelClosed,
}

/// Handle for submitting tasks. Cloning shares the same backlog and worker
/// pool; dropping every handle lets the workers exit once the backlog
/// drains.
#[derive(Clone)]
pub struct AdmissionQueue<T> {
    sender: mpsc::UnboundedSender<T>,
}

impl<T> AdmissionQueue<T>
where
    T: Send + 'static,
{
    /// Spawns `max_concurrent` worker loops, each pulling from the same
    /// shared backlog and running `handler` to completion before pulling
    /// again. Strict FIFO among ready tasks falls out of all workers
    /// sharing one channel.
    pub fn start<H, Fut>(max_concurrent: usize, handler: H) -> Self
    where
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        assert!(max_concurrent > 0, "admission queue needs at least one worker");

        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let handler = Arc::new(handler);

        for worker_id in 0..max_concurrent {
            let receiver = Arc::clone(&receiver);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                loop {
                    let task = { receiver.lock().await.recv().await };
                    match task {
                        Some(task) => {
                            debug!(worker_id, "dispatching task");
                            handler(task).await;
                        }
                        None => {
                            debug!(worker_id, "backlog closed, worker exiting");
                            break;
                        }
                    }
                }
            });
        }

        Self { sender }
    }

    /// O(1), never rejects, always returns promptly.
    pub fn enqueue(&self, task: T) -> Result<(), QueueError> {
        self.sender.send(task).map_err(|_| {
            warn!("enqueue called after all workers exited");
            QueueError::ChannelClosed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{oneshot, Semaphore};

    #[tokio::test]
    async fn enqueue_runs_the_handler() {
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let queue = AdmissionQueue::start(1, move |value: u32| {
            let tx = Arc::clone(&tx);
            async move {
                if let Some(tx) = tx.lock().await.take() {
                    let _ = tx.send(value);
                }
            }
        });

        queue.enqueue(42).unwrap();
        let received = tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .expect("handler should run")
            .unwrap();
        assert_eq!(received, 42);
    }

    #[tokio::test]
    async fn never_runs_more_than_max_concurrent_handlers_at_once() {
        let max_concurrent = 2;
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let in_flight_clone = Arc::clone(&in_flight);
        let peak_clone = Arc::clone(&peak);
        let gate_clone = Arc::clone(&gate);
        let queue = AdmissionQueue::start(max_concurrent, move |_: u32| {
            let in_flight = Arc::clone(&in_flight_clone);
            let peak = Arc::clone(&peak_clone);
            let gate = Arc::clone(&gate_clone);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                gate.add_permits(1);
            }
        });

        for i in 0..6 {
            queue.enqueue(i).unwrap();
        }

        let _ = tokio::time::timeout(Duration::from_secs(2), gate.acquire_many(6)).await;
        assert!(peak.load(Ordering::SeqCst) <= max_concurrent);
    }

    #[tokio::test]
    async fn tasks_complete_in_fifo_order_under_single_worker() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_clone = Arc::clone(&order);
        let queue = AdmissionQueue::start(1, move |value: u32| {
            let order = Arc::clone(&order_clone);
            async move {
                order.lock().await.push(value);
            }
        });

        for i in 0..5 {
            queue.enqueue(i).unwrap();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn cloned_handles_share_the_same_backlog() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_clone = Arc::clone(&order);
        let queue = AdmissionQueue::start(1, move |value: u32| {
            let order = Arc::clone(&order_clone);
            async move {
                order.lock().await.push(value);
            }
        });
        let cloned = queue.clone();

        queue.enqueue(1).unwrap();
        cloned.enqueue(2).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*order.lock().await, vec![1, 2]);
    }
}
