//! Cancellable advance scheduler
//!
//! One cooperative timer per replica, modeled as an explicit cancellable
//! task instead of a bare interval. Every call to [`AdvanceScheduler::
//! schedule`] cancels the previous task first, so two timers can never
//! race to write the same stage.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct AdvanceScheduler {
    interval: Duration,
    running: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl AdvanceScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: Mutex::new(None),
        }
    }

    /// Replace any running timer with a new one. `tick` fires once per
    /// interval until it returns `false` or the task is cancelled.
    pub fn schedule<F, Fut>(&self, tick: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        if !tick().await {
                            break;
                        }
                    }
                }
            }
        });

        self.replace(Some((token, handle)));
    }

    /// Cancel the running timer, if any.
    pub fn cancel(&self) {
        self.replace(None);
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    fn replace(&self, next: Option<(CancellationToken, JoinHandle<()>)>) {
        let mut slot = self.running.lock().unwrap();
        if let Some((token, handle)) = slot.take() {
            token.cancel();
            handle.abort();
        }
        *slot = next;
    }
}

impl Drop for AdvanceScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
