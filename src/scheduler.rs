//! Cancellable scheduled work.
//!
//! Periodic session re-verification and login polling are modelled as
//! explicit handles rather than timers tied to object lifetime:
//!
//! - [`CancelFlag`] - shared, idempotent stop signal checked by loops
//! - [`ScheduledTask`] - a spawned periodic task owning its flag
//!
//! Once cancelled, a task never invokes its callback again.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Shared cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Safe to call any number of times.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Handle to a periodic background task.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct ScheduledTask {
    flag: CancelFlag,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Spawn `tick` every `period`, first run one period from now.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_periodic<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let flag = CancelFlag::new();
        let task_flag = flag.clone();

        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                timer.tick().await;
                if task_flag.is_cancelled() {
                    break;
                }
                tick().await;
                if task_flag.is_cancelled() {
                    break;
                }
            }
        });

        Self {
            flag,
            handle: Some(handle),
        }
    }

    /// Stop the task. Idempotent.
    pub fn cancel(&mut self) {
        self.flag.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether the task is still scheduled.
    pub fn is_active(&self) -> bool {
        !self.flag.is_cancelled()
            && self
                .handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancel_flag_idempotent() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());

        flag.cancel();
        flag.cancel();
        assert!(other.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_task_ticks_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let mut task = ScheduledTask::spawn_periodic(Duration::from_secs(60), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert!(task.is_active());

        // Nothing runs before the first period elapses
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        task.cancel();
        task.cancel();
        assert!(!task.is_active());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_task() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let task = ScheduledTask::spawn_periodic(Duration::from_secs(1), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        drop(task);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
