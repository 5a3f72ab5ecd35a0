//! Abortable background task slots owned by a session.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Holds at most one background task. Scheduling a new one aborts the previous task, and
/// dropping the slot aborts whatever is still pending.
#[derive(Debug, Default)]
pub(crate) struct TaskSlot {
    handle: Option<JoinHandle<()>>,
}

impl TaskSlot {
    /// Run `action` once after `delay`.
    pub(crate) fn schedule<F>(&mut self, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        });
    }

    pub(crate) fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(task));
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Every task a session may leave running in the background.
#[derive(Debug, Default)]
pub(crate) struct SessionTimers {
    pub(crate) autoplay: TaskSlot,
    pub(crate) controls: TaskSlot,
    pub(crate) transition: TaskSlot,
    pub(crate) supplementary: TaskSlot,
}

impl SessionTimers {
    pub(crate) fn cancel_all(&mut self) {
        self.autoplay.cancel();
        self.controls.cancel();
        self.transition.cancel();
        self.supplementary.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_pending_action() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut slot = TaskSlot::default();

        let counter = Arc::clone(&fired);
        slot.schedule(Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&fired);
        slot.schedule(Duration::from_secs(1), move || {
            counter.fetch_add(10, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 10);
        assert!(!slot.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_slot_cancels_task() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let mut slot = TaskSlot::default();
            let counter = Arc::clone(&fired);
            slot.schedule(Duration::from_millis(300), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            assert!(slot.is_armed());
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
