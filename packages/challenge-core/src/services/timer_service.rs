use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// Names for the delayed callbacks a match can have in flight. One timer
/// per (match, kind); re-arming replaces the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    StartCountdown,
    GracePeriod,
    MaxDuration,
}

/// Per-match scheduled callbacks backed by tokio tasks. Arming and
/// cancelling are in-memory operations and safe to call concurrently from
/// multiple commands; the fired callback is responsible for re-checking
/// match state before acting.
#[derive(Default)]
pub struct TimerService {
    timers: Mutex<HashMap<(String, TimerKind), JoinHandle<()>>>,
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `callback` to run after `delay`. An existing timer with
    /// the same name for the same match is aborted first.
    pub fn arm<F>(&self, match_id: &str, kind: TimerKind, delay: Duration, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback.await;
        });

        let mut timers = self.timers.lock().unwrap();
        if let Some(previous) = timers.insert((match_id.to_string(), kind), handle) {
            debug!("Replacing armed {:?} timer for match {}", kind, match_id);
            previous.abort();
        }
    }

    pub fn cancel(&self, match_id: &str, kind: TimerKind) {
        let mut timers = self.timers.lock().unwrap();
        if let Some(handle) = timers.remove(&(match_id.to_string(), kind)) {
            handle.abort();
        }
    }

    /// Cancels every timer for the match. Called once when the match
    /// reaches a terminal status.
    pub fn cancel_all(&self, match_id: &str) {
        let mut timers = self.timers.lock().unwrap();
        timers.retain(|(id, _), handle| {
            if id == match_id {
                handle.abort();
                false
            } else {
                true
            }
        });
    }

    pub fn is_armed(&self, match_id: &str, kind: TimerKind) -> bool {
        let timers = self.timers.lock().unwrap();
        timers
            .get(&(match_id.to_string(), kind))
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_armed_timer_fires_after_delay() {
        let timers = TimerService::new();
        let fired = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&fired);
        timers.arm("m1", TimerKind::GracePeriod, Duration::from_secs(15), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(14)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let timers = TimerService::new();
        let fired = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&fired);
        timers.arm("m1", TimerKind::MaxDuration, Duration::from_secs(600), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timers.is_armed("m1", TimerKind::MaxDuration));

        timers.cancel("m1", TimerKind::MaxDuration);
        assert!(!timers.is_armed("m1", TimerKind::MaxDuration));

        tokio::time::sleep(Duration::from_secs(700)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_replaces_previous_timer() {
        let timers = TimerService::new();
        let fired = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let counter = Arc::clone(&fired);
            timers.arm("m1", TimerKind::GracePeriod, Duration::from_secs(15), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_only_affects_one_match() {
        let timers = TimerService::new();
        let fired = Arc::new(AtomicU32::new(0));

        for (match_id, kind) in [
            ("m1", TimerKind::StartCountdown),
            ("m1", TimerKind::MaxDuration),
            ("m2", TimerKind::MaxDuration),
        ] {
            let counter = Arc::clone(&fired);
            timers.arm(match_id, kind, Duration::from_secs(10), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        timers.cancel_all("m1");
        assert!(!timers.is_armed("m1", TimerKind::StartCountdown));
        assert!(!timers.is_armed("m1", TimerKind::MaxDuration));
        assert!(timers.is_armed("m2", TimerKind::MaxDuration));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_kinds_coexist_for_one_match() {
        let timers = TimerService::new();
        let fired = Arc::new(AtomicU32::new(0));

        for kind in [TimerKind::StartCountdown, TimerKind::GracePeriod] {
            let counter = Arc::clone(&fired);
            timers.arm("m1", kind, Duration::from_secs(5), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
