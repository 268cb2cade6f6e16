//! Owned background tasks.
//!
//! A plain `tokio::task::JoinHandle` detaches its task when dropped.  The
//! registry wants the opposite: when the handle goes, the task goes.
//! [`TaskHandle`] aborts on drop, and [`RepeatingTask`] builds the 1 Hz prune
//! timer on top of it.
//!
//! # Paused time
//!
//! Both types use `tokio::time`, so tests running under
//! `#[tokio::test(start_paused = true)]` can drive them deterministically with
//! `tokio::time::sleep` / `advance`.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// A spawned task that is aborted when this handle is dropped.
#[derive(Debug)]
pub struct TaskHandle {
    handle: JoinHandle<()>,
}

impl TaskHandle {
    /// Spawns `future` on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, like `tokio::spawn`.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Runs a closure every `period` until the closure returns `false` or the
/// task is dropped.
///
/// The first call happens one full period after spawning, not immediately.
/// Late ticks are delayed rather than bunched up.
#[derive(Debug)]
pub struct RepeatingTask {
    task: TaskHandle,
}

impl RepeatingTask {
    /// Starts the repeating task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<F>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let task = TaskHandle::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !tick() {
                    break;
                }
            }
        });
        Self { task }
    }

    /// `true` once the closure has asked to stop (or the task was aborted).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter_task(period: Duration, limit: usize) -> (RepeatingTask, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let task = RepeatingTask::spawn(period, move || {
            c.fetch_add(1, Ordering::SeqCst) + 1 < limit
        });
        (task, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_task_does_not_fire_immediately() {
        // Arrange
        let (_task, count) = counter_task(Duration::from_secs(1), usize::MAX);

        // Act
        tokio::time::sleep(Duration::from_millis(900)).await;

        // Assert
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_task_fires_once_per_period() {
        let (_task, count) = counter_task(Duration::from_secs(1), usize::MAX);

        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_task_stops_when_closure_returns_false() {
        let (task, count) = counter_task(Duration::from_secs(1), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_repeating_task_stops_it() {
        // Arrange
        let (task, count) = counter_task(Duration::from_secs(1), usize::MAX);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Act
        drop(task);
        tokio::time::sleep(Duration::from_secs(5)).await;

        // Assert
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_task_handle_aborts_on_drop() {
        // Arrange: a task that would run forever
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<()>();
        let handle = TaskHandle::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });

        // Act
        drop(handle);

        // Assert: the sender inside the task is dropped once it is aborted
        assert!(rx.recv().await.is_none());
    }
}
