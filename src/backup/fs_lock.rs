//! FIFO lock serializing filesystem-mutating backup operations
//!
//! Every backup-create, rotate, and delete operation acquires this lock, so
//! a rotation triggered from inside a backup run can never interleave with
//! a concurrently requested manual delete. `tokio::sync::Mutex` grants the
//! lock to waiters strictly in the order their `acquire` calls were made,
//! which is exactly the FIFO guarantee the subsystem relies on.
//!
//! The guard releases on drop, so the lock is freed on every exit path,
//! including early `?` returns.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Shared FIFO lock over all filesystem-mutating backup operations
#[derive(Clone, Default)]
pub struct FileOpsLock {
    inner: Arc<Mutex<()>>,
}

/// RAII guard returned by [`FileOpsLock::acquire`]
pub struct FileOpsGuard {
    _guard: OwnedMutexGuard<()>,
}

impl FileOpsLock {
    /// Create a new, unlocked instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait in line for the lock and return a guard
    ///
    /// Waiters are served strictly in arrival order.
    pub async fn acquire(&self) -> FileOpsGuard {
        FileOpsGuard {
            _guard: self.inner.clone().lock_owned().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let lock = FileOpsLock::new();
        {
            let _guard = lock.acquire().await;
        }
        // Released on drop; a second acquire must not deadlock.
        let _guard = lock.acquire().await;
    }

    #[tokio::test]
    async fn test_fifo_ordering() {
        let lock = FileOpsLock::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        // Hold the lock while the contenders queue up.
        let held = lock.acquire().await;

        let mut handles = Vec::new();
        for i in 0..3 {
            let lock = lock.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _guard = lock.acquire().await;
                order.lock().unwrap().push(i);
            }));
            // Let the spawned task reach its acquire before the next spawns.
            tokio::task::yield_now().await;
        }

        drop(held);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_guard_released_on_early_return() {
        async fn failing_op(lock: &FileOpsLock) -> Result<(), &'static str> {
            let _guard = lock.acquire().await;
            Err("boom")
        }

        let lock = FileOpsLock::new();
        assert!(failing_op(&lock).await.is_err());

        // The failed operation must not leave the lock held.
        let _guard = lock.acquire().await;
    }
}
