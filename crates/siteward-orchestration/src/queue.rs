//! Bounded priority queue shared by the scraping and classification
//! orchestrators.
//!
//! Built on `tokio::sync` primitives: bound concurrency with a shared
//! primitive, never block a producer, and wake a waiting consumer when
//! queue depth changes.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

/// Default maximum queue length before `enqueue` starts rejecting.
pub const DEFAULT_MAX_QUEUE_LEN: usize = 500;

/// A unit of work with the ordering fields the queue sorts by.
///
/// Lower `priority` values are served first; ties break on `created_at`
/// (earlier first), then on `job_id` for a total order.
#[derive(Debug, Clone)]
pub struct Job<T> {
    /// Unique id, also used as a final tie-break key.
    pub job_id: Uuid,
    /// Scheduling priority; lower sorts first.
    pub priority: u8,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
    /// The work payload itself.
    pub payload: T,
}

impl<T> Job<T> {
    /// Build a job with a freshly minted id and the given priority.
    pub fn new(priority: u8, created_at: DateTime<Utc>, payload: T) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            priority,
            created_at,
            payload,
        }
    }
}

impl<T> PartialEq for Job<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.created_at == other.created_at && self.job_id == other.job_id
    }
}
impl<T> Eq for Job<T> {}

impl<T> Ord for Job<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so a `BinaryHeap` (a max-heap) pops the lowest
        // priority/oldest/lowest-id job first.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
            .then_with(|| other.job_id.cmp(&self.job_id))
    }
}

impl<T> PartialOrd for Job<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A bounded priority queue. `enqueue` never blocks: past the
/// configured maximum it returns `false` immediately.
pub struct PriorityQueue<T> {
    heap: Mutex<BinaryHeap<Job<T>>>,
    notify: Notify,
    max_len: usize,
}

impl<T: Send> PriorityQueue<T> {
    /// Build a queue with the default maximum length.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_QUEUE_LEN)
    }

    /// Build a queue with an explicit maximum length.
    #[must_use]
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            max_len,
        }
    }

    /// Attempt to enqueue `job`. Returns `false` without blocking if
    /// the queue is already at capacity.
    pub async fn enqueue(&self, job: Job<T>) -> bool {
        let mut heap = self.heap.lock().await;
        if heap.len() >= self.max_len {
            return false;
        }
        heap.push(job);
        drop(heap);
        self.notify.notify_one();
        true
    }

    /// Submission-boundary wrapper over [`enqueue`](Self::enqueue):
    /// turns a full queue into a typed `QueueFull` error instead of a
    /// bare `false`, for callers that want `?`-propagation at the
    /// point jobs enter the system.
    pub async fn submit(&self, job: Job<T>) -> crate::error::Result<()> {
        if self.enqueue(job).await {
            Ok(())
        } else {
            Err(crate::error::Error::QueueFull { max: self.max_len })
        }
    }

    /// Pop the highest-priority job, waiting up to `timeout` for one
    /// to arrive if the queue is currently empty.
    pub async fn get_job(&self, timeout: Duration) -> Option<Job<T>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut heap = self.heap.lock().await;
                if let Some(job) = heap.pop() {
                    return Some(job);
                }
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            if tokio::time::timeout(remaining, self.notify.notified()).await.is_err() {
                return None;
            }
        }
    }

    /// Current queue depth.
    pub async fn len(&self) -> usize {
        self.heap.lock().await.len()
    }

    /// Whether the queue is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether the queue is at its configured maximum.
    pub async fn is_full(&self) -> bool {
        self.len().await >= self.max_len
    }

    /// The configured maximum length.
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl<T: Send> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn higher_priority_job_is_served_first_regardless_of_enqueue_order() {
        let queue: PriorityQueue<&str> = PriorityQueue::new();
        let now = Utc::now();
        queue.enqueue(Job::new(5, now, "low")).await;
        queue.enqueue(Job::new(1, now, "high")).await;

        let job = queue.get_job(Duration::from_millis(10)).await.unwrap();
        assert_eq!(job.payload, "high");
    }

    #[tokio::test]
    async fn ties_on_priority_break_on_created_at() {
        let queue: PriorityQueue<&str> = PriorityQueue::new();
        let now = Utc::now();
        queue.enqueue(Job::new(1, now + chrono::Duration::seconds(5), "later")).await;
        queue.enqueue(Job::new(1, now, "earlier")).await;

        let job = queue.get_job(Duration::from_millis(10)).await.unwrap();
        assert_eq!(job.payload, "earlier");
    }

    #[tokio::test]
    async fn enqueue_rejects_without_blocking_once_full() {
        let queue: PriorityQueue<u32> = PriorityQueue::with_max_len(2);
        let now = Utc::now();
        assert!(queue.enqueue(Job::new(1, now, 1)).await);
        assert!(queue.enqueue(Job::new(1, now, 2)).await);
        assert!(!queue.enqueue(Job::new(1, now, 3)).await);
        assert!(queue.is_full().await);
    }

    #[tokio::test]
    async fn get_job_times_out_on_empty_queue() {
        let queue: PriorityQueue<u32> = PriorityQueue::new();
        let result = queue.get_job(Duration::from_millis(20)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn get_job_wakes_as_soon_as_a_job_is_enqueued() {
        let queue = std::sync::Arc::new(PriorityQueue::<u32>::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get_job(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(Job::new(1, Utc::now(), 42)).await;
        let job = consumer.await.unwrap().unwrap();
        assert_eq!(job.payload, 42);
    }
}
