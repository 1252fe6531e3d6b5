//! Async timer manager (§4.8).
//!
//! Ported from the original's `AsyncTimerManager`: timers run as detached `tokio::task`s;
//! cancellation awaits the task so a cancelled timer is guaranteed not to fire after
//! `cancel_timer` returns (no Python `finally`, just `JoinHandle::abort` + `await`).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

type Callback = Box<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct TimerEntry {
    name: String,
    handle: JoinHandle<()>,
}

#[derive(Error, Debug)]
pub enum TimerError {
    #[error("timer manager not started")]
    NotStarted,
    #[error("timer id '{0}' already exists")]
    AlreadyExists(String),
}

/// Manages one-shot and recurring timers as detached async tasks.
#[derive(Default)]
pub struct TimerManager {
    timers: HashMap<String, TimerEntry>,
    running: bool,
}

impl TimerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.running = true;
        info!("timer manager started");
    }

    /// Stop the manager and cancel every active timer.
    pub async fn stop(&mut self) {
        self.running = false;
        let cancelled = self.cancel_all().await;
        info!(cancelled, "timer manager stopped");
    }

    /// Schedule a one-shot timer. Returns the timer id (generated unless `timer_id` is given).
    pub fn schedule(
        &mut self,
        name: impl Into<String>,
        delay: Duration,
        callback: Callback,
        timer_id: Option<String>,
    ) -> Result<String, TimerError> {
        if !self.running {
            return Err(TimerError::NotStarted);
        }
        let id = timer_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if self.timers.contains_key(&id) {
            return Err(TimerError::AlreadyExists(id));
        }

        let name = name.into();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::debug!(timer = %task_name, "executing timer");
            callback().await;
        });

        self.timers.insert(id.clone(), TimerEntry { name, handle });
        Ok(id)
    }

    /// Schedule a recurring timer that fires `callback` every `interval` until cancelled.
    pub fn schedule_recurring(
        &mut self,
        name: impl Into<String>,
        interval: Duration,
        callback: Callback,
        timer_id: Option<String>,
    ) -> Result<String, TimerError> {
        if !self.running {
            return Err(TimerError::NotStarted);
        }
        let id = timer_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if self.timers.contains_key(&id) {
            return Err(TimerError::AlreadyExists(id));
        }

        let name = name.into();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it to match "every interval"
            loop {
                ticker.tick().await;
                tracing::debug!(timer = %task_name, "executing recurring timer");
                callback().await;
            }
        });

        self.timers.insert(id.clone(), TimerEntry { name, handle });
        Ok(id)
    }

    /// Cancel a timer and await its task, guaranteeing it will not fire afterwards.
    pub async fn cancel(&mut self, timer_id: &str) -> bool {
        let Some(entry) = self.timers.remove(timer_id) else {
            return false;
        };
        entry.handle.abort();
        if let Err(err) = entry.handle.await {
            if !err.is_cancelled() {
                warn!(timer = %entry.name, error = %err, "timer task ended abnormally");
            }
        }
        info!(timer = %entry.name, "timer cancelled");
        true
    }

    pub async fn cancel_all(&mut self) -> usize {
        let ids: Vec<String> = self.timers.keys().cloned().collect();
        let mut cancelled = 0;
        for id in ids {
            if self.cancel(&id).await {
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn active_timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn is_active(&self, timer_id: &str) -> bool {
        self.timers.contains_key(timer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_callback(counter: Arc<AtomicUsize>) -> Callback {
        Box::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn one_shot_timer_fires_once() {
        let mut manager = TimerManager::new();
        manager.start();
        let counter = Arc::new(AtomicUsize::new(0));
        manager
            .schedule("test", Duration::from_millis(10), counting_callback(counter.clone()), None)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(manager.active_timer_count(), 1); // entry stays until explicitly cancelled
    }

    #[tokio::test]
    async fn cancelling_a_timer_prevents_it_firing() {
        let mut manager = TimerManager::new();
        manager.start();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = manager
            .schedule(
                "test",
                Duration::from_millis(200),
                counting_callback(counter.clone()),
                None,
            )
            .unwrap();

        assert!(manager.cancel(&id).await);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn scheduling_before_start_fails() {
        let mut manager = TimerManager::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let result = manager.schedule("test", Duration::from_millis(10), counting_callback(counter), None);
        assert!(matches!(result, Err(TimerError::NotStarted)));
    }

    #[tokio::test]
    async fn duplicate_timer_id_is_rejected() {
        let mut manager = TimerManager::new();
        manager.start();
        let counter = Arc::new(AtomicUsize::new(0));
        manager
            .schedule(
                "a",
                Duration::from_secs(5),
                counting_callback(counter.clone()),
                Some("fixed".to_string()),
            )
            .unwrap();
        let result = manager.schedule(
            "b",
            Duration::from_secs(5),
            counting_callback(counter),
            Some("fixed".to_string()),
        );
        assert!(matches!(result, Err(TimerError::AlreadyExists(_))));
    }
}
