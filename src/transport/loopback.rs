//! In-memory transport.
//!
//! [`LoopbackTransport`] records every dispatched batch and keeps its
//! subscription routable until stopped, so events can be pushed into it
//! later with [`emit`](LoopbackTransport::emit). An optional responder answers batches
//! immediately, inside `send`.
//!
//! # Example
//!
//! ```
//! use opwire_client::protocol::IncomingEvent;
//! use opwire_client::transport::LoopbackTransport;
//!
//! let transport = LoopbackTransport::with_responder(|_batch| vec![IncomingEvent::ok()]);
//! assert_eq!(transport.dispatch_count(), 0);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use super::{EventSink, StopHandle, Transport};
use crate::config::SendOptions;
use crate::error::Result;
use crate::protocol::{IncomingEvent, OutgoingMessage};

/// Scripted reply for a batch.
pub type Responder = Arc<dyn Fn(&[OutgoingMessage]) -> Vec<IncomingEvent> + Send + Sync>;

/// Snapshot of one dispatched batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// Messages of the batch.
    pub messages: Vec<OutgoingMessage>,
    /// Options the batch was sent with.
    pub options: SendOptions,
}

/// Live routing entry of a batch; dropped once its subscription stops.
struct Route {
    sink: EventSink,
    stop: StopHandle,
}

#[derive(Default)]
struct Inner {
    dispatches: Vec<Dispatch>,
    routes: HashMap<usize, Route>,
}

#[derive(Default)]
struct Shared {
    inner: Mutex<Inner>,
    dispatched: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Transport that keeps everything in process.
///
/// The dispatch history grows with every batch; routing entries live only
/// as long as their subscription.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    shared: Arc<Shared>,
    responder: Option<Responder>,
}

impl LoopbackTransport {
    /// Create a transport that never answers on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that answers every batch with `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&[OutgoingMessage]) -> Vec<IncomingEvent> + Send + Sync + 'static,
    {
        Self {
            shared: Arc::default(),
            responder: Some(Arc::new(responder)),
        }
    }

    /// Number of batches dispatched so far.
    pub fn dispatch_count(&self) -> usize {
        self.shared.lock().dispatches.len()
    }

    /// All dispatched batches, oldest first.
    pub fn dispatches(&self) -> Vec<Dispatch> {
        self.shared.lock().dispatches.clone()
    }

    /// The most recent batch.
    pub fn last_dispatch(&self) -> Option<Dispatch> {
        self.shared.lock().dispatches.last().cloned()
    }

    /// Number of subscriptions not stopped yet.
    pub fn live_subscriptions(&self) -> usize {
        self.shared.lock().routes.len()
    }

    /// Stop handle of batch `index`, while its subscription is live.
    pub fn stop_handle(&self, index: usize) -> Option<StopHandle> {
        self.shared.lock().routes.get(&index).map(|r| r.stop.clone())
    }

    /// Whether batch `index` has been stopped. Unknown batches count as stopped.
    pub fn is_stopped(&self, index: usize) -> bool {
        self.stop_handle(index).map_or(true, |s| s.is_stopped())
    }

    /// Deliver `event` to batch `index`.
    ///
    /// Returns `false` if the batch does not exist or was stopped.
    pub fn emit(&self, index: usize, event: IncomingEvent) -> bool {
        let target = self
            .shared
            .lock()
            .routes
            .get(&index)
            .map(|r| (r.sink.clone(), r.stop.clone()));

        match target {
            Some((sink, stop)) if !stop.is_stopped() => {
                tracing::trace!(index, tag = %event.tag, "loopback emit");
                sink(event, stop);
                true
            }
            _ => false,
        }
    }

    /// Deliver `event` to the most recent batch.
    pub fn emit_last(&self, event: IncomingEvent) -> bool {
        match self.dispatch_count().checked_sub(1) {
            Some(index) => self.emit(index, event),
            None => false,
        }
    }

    /// Wait until at least `count` batches have been dispatched.
    pub async fn wait_for_dispatches(&self, count: usize) {
        loop {
            let notified = self.shared.dispatched.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.dispatch_count() >= count {
                return;
            }
            notified.await;
        }
    }
}

impl Transport for LoopbackTransport {
    fn send(
        &self,
        messages: Vec<OutgoingMessage>,
        options: SendOptions,
        on_event: EventSink,
    ) -> Result<()> {
        let replies = self
            .responder
            .as_ref()
            .map(|respond| respond(&messages))
            .unwrap_or_default();

        let (index, stop) = {
            let mut inner = self.shared.lock();
            let index = inner.dispatches.len();
            let shared = Arc::downgrade(&self.shared);
            let stop = StopHandle::with_hook(move || {
                if let Some(shared) = shared.upgrade() {
                    shared.lock().routes.remove(&index);
                    tracing::trace!(index, "loopback route dropped");
                }
            });
            inner.dispatches.push(Dispatch { messages, options });
            inner.routes.insert(
                index,
                Route {
                    sink: on_event.clone(),
                    stop: stop.clone(),
                },
            );
            (index, stop)
        };
        tracing::debug!(index, "loopback dispatch");
        self.shared.dispatched.notify_waiters();

        for event in replies {
            if stop.is_stopped() {
                break;
            }
            on_event(event, stop.clone());
        }
        Ok(())
    }
}
