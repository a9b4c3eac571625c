//! Poll primitive.
//!
//! Evaluates a predicate on a repeating timer until it yields a value. Used
//! by process sessions for buffered output and exit status. Polling is
//! bounded by the call's timeout in every calling convention: awaited,
//! callback, and blocking.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::channel::{Resolver, ResultChannel};
use crate::config::{CallOptions, SettingsProvider};
use crate::error::{OpwireError, Result};

/// Shortest tick accepted by the timer.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Timer-driven predicate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    interval: Duration,
    timeout: Duration,
}

impl Poller {
    /// Create a poller with explicit timing.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            timeout,
        }
    }

    /// Resolve timing from call options, falling back to `settings`.
    pub fn from_options(options: &CallOptions, settings: &dyn SettingsProvider) -> Self {
        Self::new(
            options.resolve_interval(settings),
            options.resolve_timeout(settings),
        )
    }

    /// Tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Overall budget.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll in the background and hand the outcome to `callback`.
    ///
    /// Runs as a task on the current Tokio runtime, or on a dedicated thread
    /// when there is none.
    pub fn subscribe<T, P, F>(&self, predicate: P, callback: F)
    where
        T: Send + 'static,
        P: FnMut() -> Option<T> + Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let poller = *self;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let (channel, resolver) = ResultChannel::new(poller.timeout);
                    poller.run(predicate, resolver).await;
                    callback(channel.wait().await.and_then(|result| result));
                });
            }
            Err(_) => {
                std::thread::spawn(move || callback(poller.wait_blocking(predicate)));
            }
        }
    }

    /// Poll and wait for the outcome without blocking the runtime.
    pub async fn wait<T, P>(&self, predicate: P) -> Result<T>
    where
        T: Send + 'static,
        P: FnMut() -> Option<T> + Send + 'static,
    {
        let (channel, resolver) = ResultChannel::new(self.timeout);
        tokio::spawn(self.run(predicate, resolver));
        channel.wait().await?
    }

    /// Poll on the current thread, sleeping one interval between checks.
    pub fn wait_blocking<T, P>(&self, mut predicate: P) -> Result<T>
    where
        P: FnMut() -> Option<T>,
    {
        let deadline = std::time::Instant::now() + self.timeout;
        loop {
            if let Some(value) = predicate() {
                return Ok(value);
            }
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return Err(OpwireError::Timeout(self.timeout));
            }
            std::thread::sleep(self.interval.min(remaining));
        }
    }

    /// Tick until `resolver` settles.
    ///
    /// The predicate runs inside [`Resolver::resolve_with`], so once the
    /// waiting side has timed out it is never evaluated again and the task
    /// ends on the next tick.
    async fn run<T, P>(self, mut predicate: P, resolver: Resolver<Result<T>>)
    where
        P: FnMut() -> Option<T>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if resolver.resolve_with(|| predicate().map(Ok)) {
                return;
            }
            if Instant::now() >= deadline {
                resolver.resolve(Err(OpwireError::Timeout(self.timeout)));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::config::Settings;

    #[test]
    fn test_zero_interval_clamped() {
        let poller = Poller::new(Duration::ZERO, Duration::from_secs(1));
        assert_eq!(poller.interval(), MIN_INTERVAL);
    }

    #[test]
    fn test_from_options() {
        let settings = Settings {
            max_timeout: Duration::from_secs(9),
            poll_interval: Duration::from_millis(50),
        };
        let poller = Poller::from_options(
            &CallOptions::new().interval(Duration::from_millis(5)),
            &settings,
        );
        assert_eq!(poller.interval(), Duration::from_millis(5));
        assert_eq!(poller.timeout(), Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_wait_until_predicate_true() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let poller = Poller::new(Duration::from_millis(1), Duration::from_secs(5));

        let value = poller
            .wait(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                (n >= 3).then_some(n)
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(ticks.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let poller = Poller::new(Duration::from_millis(1), Duration::from_millis(10));
        let err = poller.wait(|| None::<()>).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_predicate_idle_after_wait_timeout() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let poller = Poller::new(Duration::from_millis(200), Duration::from_millis(10));

        let err = poller
            .wait(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                None::<()>
            })
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        let seen = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn test_wait_blocking() {
        let ticks = AtomicUsize::new(0);
        let poller = Poller::new(Duration::from_millis(1), Duration::from_secs(5));
        let value = poller
            .wait_blocking(|| (ticks.fetch_add(1, Ordering::SeqCst) >= 2).then_some("done"))
            .unwrap();
        assert_eq!(value, "done");

        let poller = Poller::new(Duration::from_millis(1), Duration::from_millis(10));
        assert!(poller.wait_blocking(|| None::<()>).unwrap_err().is_timeout());
    }

    #[test]
    fn test_subscribe_without_runtime() {
        let (tx, rx) = std::sync::mpsc::channel();
        let poller = Poller::new(Duration::from_millis(1), Duration::from_secs(5));
        poller.subscribe(
            || Some(5),
            move |result| {
                let _ = tx.send(result);
            },
        );
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_once() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let poller = Poller::new(Duration::from_millis(1), Duration::from_secs(5));
        poller.subscribe(
            || Some("ready"),
            move |result| {
                let _ = tx.send(result);
            },
        );
        assert_eq!(rx.await.unwrap().unwrap(), "ready");
    }
}
