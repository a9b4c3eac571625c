//! Transport seam.
//!
//! The client never talks to the wire itself. A [`Transport`] accepts a batch
//! of messages, delivers every response event for that batch to an
//! [`EventSink`], and hands each event a [`StopHandle`] for the subscription.
//!
//! - [`loopback`] - in-memory transport for tests and embedding

pub mod loopback;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::SendOptions;
use crate::error::Result;
use crate::protocol::{IncomingEvent, OutgoingMessage};

pub use loopback::{Dispatch, LoopbackTransport};

/// Per-event callback supplied with every dispatched batch.
pub type EventSink = Arc<dyn Fn(IncomingEvent, StopHandle) + Send + Sync>;

/// Connection that carries batches to the remote peer.
///
/// Implementations must deliver events of one batch in arrival order and
/// stop delivering once the batch's [`StopHandle`] is stopped. When
/// `options.multiplicity` is `false` a single response event per message is
/// expected.
pub trait Transport: Send + Sync + 'static {
    /// Submit a batch.
    ///
    /// Returns an error only if the batch could not be submitted at all.
    fn send(
        &self,
        messages: Vec<OutgoingMessage>,
        options: SendOptions,
        on_event: EventSink,
    ) -> Result<()>;
}

type StopHook = Box<dyn FnOnce() + Send>;

struct StopInner {
    stopped: AtomicBool,
    hook: Mutex<Option<StopHook>>,
}

/// Capability that ends event delivery for one subscription.
///
/// Cloning shares the same subscription. Stopping is idempotent: only the
/// first call has an effect.
#[derive(Clone)]
pub struct StopHandle {
    inner: Arc<StopInner>,
}

impl StopHandle {
    /// Create a handle with no unsubscribe hook.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StopInner {
                stopped: AtomicBool::new(false),
                hook: Mutex::new(None),
            }),
        }
    }

    /// Create a handle that runs `hook` when first stopped.
    ///
    /// Transports use the hook to drop their routing entry.
    pub fn with_hook(hook: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Arc::new(StopInner {
                stopped: AtomicBool::new(false),
                hook: Mutex::new(Some(Box::new(hook))),
            }),
        }
    }

    /// Stop the subscription.
    ///
    /// Returns `true` if this call performed the stop, `false` if the
    /// subscription was already stopped.
    pub fn stop(&self) -> bool {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return false;
        }
        let hook = self
            .inner
            .hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = hook {
            hook();
        }
        true
    }

    /// Whether the subscription has been stopped.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same subscription.
    pub fn same_subscription(&self, other: &StopHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_stop_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let stop = StopHandle::with_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!stop.is_stopped());
        assert!(stop.stop());
        assert!(!stop.stop());
        assert!(stop.is_stopped());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let stop = StopHandle::new();
        let other = stop.clone();

        other.stop();
        assert!(stop.is_stopped());
        assert!(stop.same_subscription(&other));
        assert!(!stop.same_subscription(&StopHandle::new()));
    }
}
