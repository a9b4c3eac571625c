//! Blocking result channel.
//!
//! Turns one eventual resolution into a timeout-bounded wait. The producer
//! side ([`Resolver`]) may be cloned and called any number of times; only the
//! first value is kept. The consumer side ([`ResultChannel`]) waits either
//! asynchronously ([`wait`](ResultChannel::wait), which yields to the runtime
//! so the very event that resolves it can still be delivered) or by parking
//! the current thread ([`wait_blocking`](ResultChannel::wait_blocking)).
//!
//! When the budget elapses the channel closes itself and reports
//! [`OpwireError::Timeout`]; later resolutions are ignored.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use opwire_client::channel::ResultChannel;
//!
//! let (channel, resolver) = ResultChannel::new(Duration::from_millis(50));
//! assert!(resolver.resolve(7));
//! assert!(!resolver.resolve(8));
//! assert_eq!(channel.wait_blocking().unwrap(), 7);
//! ```

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::error::{OpwireError, Result};

enum Slot<T> {
    Pending,
    Ready(T),
    Closed,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
    notify: Notify,
}

impl<T> Shared<T> {
    fn slot(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a ready value, closing the slot.
    fn take(slot: &mut Slot<T>) -> Option<T> {
        match std::mem::replace(slot, Slot::Closed) {
            Slot::Ready(value) => Some(value),
            Slot::Pending => {
                *slot = Slot::Pending;
                None
            }
            Slot::Closed => None,
        }
    }

    /// Close the slot after the budget elapsed; a value that landed in the
    /// meantime still wins.
    fn expire(&self) -> Option<T> {
        let mut slot = self.slot();
        let value = Self::take(&mut slot);
        *slot = Slot::Closed;
        value
    }
}

/// Producer side of a [`ResultChannel`].
pub struct Resolver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Resolver<T> {
    /// Resolve the channel.
    ///
    /// Returns `true` if `value` was accepted; `false` if the channel was
    /// already resolved or timed out.
    pub fn resolve(&self, value: T) -> bool {
        {
            let mut slot = self.shared.slot();
            if !matches!(*slot, Slot::Pending) {
                return false;
            }
            *slot = Slot::Ready(value);
        }
        self.shared.ready.notify_all();
        self.shared.notify.notify_waiters();
        true
    }

    /// Evaluate `produce` and store what it yields, in one step under the
    /// slot lock.
    ///
    /// `produce` only runs while the channel is pending, so a value it
    /// consumes is never lost to a channel that already timed out. Returns
    /// `true` once the channel is settled, either by this call or earlier.
    pub fn resolve_with(&self, produce: impl FnOnce() -> Option<T>) -> bool {
        {
            let mut slot = self.shared.slot();
            if !matches!(*slot, Slot::Pending) {
                return true;
            }
            match produce() {
                Some(value) => *slot = Slot::Ready(value),
                None => return false,
            }
        }
        self.shared.ready.notify_all();
        self.shared.notify.notify_waiters();
        true
    }

    /// Whether the channel still accepts a value.
    pub fn is_pending(&self) -> bool {
        matches!(*self.shared.slot(), Slot::Pending)
    }
}

/// Consumer side: a single-assignment slot with a timeout budget.
pub struct ResultChannel<T> {
    shared: Arc<Shared<T>>,
    timeout: Duration,
}

impl<T> ResultChannel<T> {
    /// Create a channel with the given budget.
    pub fn new(timeout: Duration) -> (Self, Resolver<T>) {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot::Pending),
            ready: Condvar::new(),
            notify: Notify::new(),
        });
        (
            Self {
                shared: shared.clone(),
                timeout,
            },
            Resolver { shared },
        )
    }

    /// The budget of this channel.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for the value without blocking the runtime.
    pub async fn wait(self) -> Result<T> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let ready = Shared::take(&mut self.shared.slot());
            if let Some(value) = ready {
                return Ok(value);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self
                    .shared
                    .expire()
                    .ok_or(OpwireError::Timeout(self.timeout));
            }
        }
    }

    /// Wait for the value by parking the current thread.
    ///
    /// Must not be called from a runtime worker thread that is also
    /// responsible for delivering the value.
    pub fn wait_blocking(self) -> Result<T> {
        let deadline = Instant::now() + self.timeout;
        let mut slot = self.shared.slot();
        loop {
            if let Some(value) = Shared::take(&mut slot) {
                return Ok(value);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                *slot = Slot::Closed;
                return Err(OpwireError::Timeout(self.timeout));
            }
            slot = self
                .shared
                .ready
                .wait_timeout(slot, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_once() {
        let (channel, resolver) = ResultChannel::new(Duration::from_secs(1));
        assert!(resolver.is_pending());
        assert!(resolver.resolve("first"));
        assert!(!resolver.resolve("second"));
        assert!(!resolver.is_pending());
        assert_eq!(channel.wait_blocking().unwrap(), "first");
    }

    #[test]
    fn test_blocking_timeout() {
        let (channel, resolver) = ResultChannel::<u8>::new(Duration::from_millis(10));
        let start = Instant::now();
        let err = channel.wait_blocking().unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert!(start.elapsed() < Duration::from_secs(2));

        // Late resolution is a no-op.
        assert!(!resolver.resolve(1));
    }

    #[test]
    fn test_resolve_with_skips_closed_channel() {
        let (channel, resolver) = ResultChannel::<u8>::new(Duration::from_millis(1));
        assert!(!resolver.resolve_with(|| None));
        assert!(channel.wait_blocking().unwrap_err().is_timeout());

        let mut evaluated = false;
        assert!(resolver.resolve_with(|| {
            evaluated = true;
            Some(1)
        }));
        assert!(!evaluated);
    }

    #[test]
    fn test_resolve_with_stores_value() {
        let (channel, resolver) = ResultChannel::new(Duration::from_secs(1));
        assert!(resolver.resolve_with(|| Some("now")));
        assert!(resolver.resolve_with(|| Some("again")));
        assert_eq!(channel.wait_blocking().unwrap(), "now");
    }

    #[test]
    fn test_blocking_resolved_from_thread() {
        let (channel, resolver) = ResultChannel::new(Duration::from_secs(5));
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            resolver.resolve(42);
        });
        assert_eq!(channel.wait_blocking().unwrap(), 42);
    }

    #[tokio::test]
    async fn test_async_wait_resolved_later() {
        let (channel, resolver) = ResultChannel::new(Duration::from_secs(5));
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            resolver.resolve("late");
        });
        assert_eq!(channel.wait().await.unwrap(), "late");
    }

    #[tokio::test]
    async fn test_async_wait_already_resolved() {
        let (channel, resolver) = ResultChannel::new(Duration::from_millis(1));
        resolver.resolve(1);
        assert_eq!(channel.wait().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_async_timeout() {
        let (channel, resolver) = ResultChannel::<()>::new(Duration::from_millis(10));
        let start = std::time::Instant::now();
        let err = channel.wait().await.unwrap_err();
        assert!(matches!(err, OpwireError::Timeout(d) if d == Duration::from_millis(10)));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!resolver.resolve(()));
    }
}
