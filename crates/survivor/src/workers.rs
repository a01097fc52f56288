//! Bounded pool for blocking work (inference and artifact deserialization).
//!
//! Each job holds a permit for as long as it runs on the blocking thread pool.
//! A caller that stops waiting does not release the permit: abandoned jobs
//! still count against capacity until they finish.

use std::sync::Arc;

use tokio::sync::Semaphore;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker pool is closed")]
    Closed,

    #[error("Worker panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "worker pool needs at least one worker");
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Workers not currently running a job.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on the blocking pool once a worker is free.
    pub async fn run<T, F>(&self, job: F) -> Result<T, WorkerError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::Closed)?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        handle.await.map_err(|e| {
            if e.is_panic() {
                WorkerError::Panicked(panic_message(e.into_panic()))
            } else {
                WorkerError::Panicked(e.to_string())
            }
        })
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn runs_job_and_returns_value() {
        let pool = WorkerPool::new(2);
        let value = pool.run(|| 40 + 2).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn panic_is_reported() {
        let pool = WorkerPool::new(1);
        let err = pool
            .run(|| -> u8 { panic!("model exploded") })
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Panicked(ref msg) if msg == "model exploded"));
        // Permit is released even when the job panics.
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn abandoned_job_keeps_its_permit() {
        let pool = WorkerPool::new(1);
        let slow = pool.run(|| std::thread::sleep(Duration::from_millis(200)));
        let waited = tokio::time::timeout(Duration::from_millis(20), slow).await;
        assert!(waited.is_err());

        // The abandoned job is still running on the blocking pool.
        assert_eq!(pool.available(), 0);

        tokio::time::timeout(Duration::from_secs(2), async {
            while pool.available() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("permit was not returned after the job finished");
    }

    #[tokio::test]
    async fn jobs_queue_when_pool_is_full() {
        let pool = WorkerPool::new(1);
        let first = pool.run(|| std::thread::sleep(Duration::from_millis(50)));
        let second = pool.run(|| 7);
        let (_, second) = tokio::join!(first, second);
        assert_eq!(second.unwrap(), 7);
    }
}
