//! Watch sessions.
//!
//! A `watch` request is answered by an `ok` acknowledgment and then by a
//! `changed` event for every change under the path. On acknowledgment the
//! subscription's [`StopHandle`] is stored under the path; `unwatch` stops it
//! and removes the entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;

use crate::catalog::{self, request, result, Change, ChangeKind};
use crate::error::{OpwireError, Result};
use crate::operation::{decode_data, Forward, Interceptor, OperationDescriptor};
use crate::protocol::tags;
use crate::transport::StopHandle;

/// Registry of active watches, keyed by path.
#[derive(Clone, Default)]
pub(crate) struct WatchRegistry {
    sessions: Arc<Mutex<HashMap<String, StopHandle>>>,
}

impl WatchRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, StopHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `stop` under `path`, returning a different session it replaced.
    fn insert(&self, path: &str, stop: &StopHandle) -> Option<StopHandle> {
        self.lock()
            .insert(path.to_string(), stop.clone())
            .filter(|old| !old.same_subscription(stop))
    }

    /// Remove the session for `path`.
    pub(crate) fn remove(&self, path: &str) -> Option<StopHandle> {
        self.lock().remove(path)
    }

    /// Remove `path` only if it belongs to the subscription `stop`.
    fn remove_if_same(&self, path: &str, stop: &StopHandle) -> bool {
        let mut sessions = self.lock();
        match sessions.get(path) {
            Some(current) if current.same_subscription(stop) => {
                sessions.remove(path);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn contains(&self, path: &str) -> bool {
        self.lock().contains_key(path)
    }

    pub(crate) fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

/// Parsed event of a watch subscription, before routing.
#[derive(Debug)]
pub enum WatchSignal {
    /// The peer acknowledged the watch.
    Ack,
    /// A change under the watched path.
    Changed(Change),
}

/// Event delivered to a watch callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The watch is active.
    Watching {
        /// Watched path.
        path: String,
    },
    /// Something changed.
    Changed(Change),
}

#[derive(Deserialize)]
struct ChangedPayload {
    kind: ChangeKind,
    paths: Vec<String>,
}

/// Build the `watch` descriptor for `path`.
pub(crate) fn watch_descriptor(path: &str) -> OperationDescriptor<WatchSignal> {
    let watched = path.to_string();
    OperationDescriptor::new(request::WATCH, &catalog::WATCH_RESULTS, move |data, tag, _| {
        match tag {
            result::CHANGED => {
                let ChangedPayload { kind, paths } = decode_data(data, tag)?;
                Ok(WatchSignal::Changed(Change {
                    path: watched.clone(),
                    kind,
                    paths,
                }))
            }
            tags::OK => Ok(WatchSignal::Ack),
            other => Err(OpwireError::Protocol(format!(
                "unhandled watch event '{}'",
                other
            ))),
        }
    })
    .with_schema(catalog::watch_schema())
    .response_schema(catalog::changed_schema())
    .multiplicity(true)
}

/// Registers acknowledged watches and forwards changes.
pub(crate) struct WatchRouter {
    path: String,
    registry: WatchRegistry,
}

impl WatchRouter {
    pub(crate) fn new(path: &str, registry: WatchRegistry) -> Self {
        Self {
            path: path.to_string(),
            registry,
        }
    }
}

impl Interceptor<WatchSignal, WatchEvent> for WatchRouter {
    fn intercept(
        &self,
        result: Result<WatchSignal>,
        stop: &StopHandle,
        forward: &Forward<WatchEvent>,
    ) {
        match result {
            Ok(WatchSignal::Ack) => {
                if let Some(previous) = self.registry.insert(&self.path, stop) {
                    tracing::debug!(path = %self.path, "replacing existing watch");
                    previous.stop();
                }
                tracing::debug!(path = %self.path, "watching");
                forward.send(
                    Ok(WatchEvent::Watching {
                        path: self.path.clone(),
                    }),
                    stop,
                );
            }
            Ok(WatchSignal::Changed(change)) => {
                forward.send(Ok(WatchEvent::Changed(change)), stop);
            }
            Err(err) => {
                tracing::debug!(path = %self.path, error = %err, "watch failed");
                stop.stop();
                self.registry.remove_if_same(&self.path, stop);
                forward.send(Err(err), stop);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::config::{CallOptions, Settings};
    use crate::operation::{Operation, Reply};
    use crate::protocol::IncomingEvent;
    use crate::transport::LoopbackTransport;

    fn watch_op(
        transport: &LoopbackTransport,
        registry: &WatchRegistry,
        path: &str,
    ) -> Operation<WatchSignal, WatchEvent> {
        Operation::with_interceptor(
            watch_descriptor(path),
            WatchRouter::new(path, registry.clone()),
            Arc::new(transport.clone()),
            Arc::new(Settings::default()),
        )
    }

    type Replies = Arc<Mutex<Vec<Reply<WatchEvent>>>>;

    fn watch(transport: &LoopbackTransport, registry: &WatchRegistry, path: &str) -> Replies {
        let replies: Replies = Arc::default();
        let sink = replies.clone();
        watch_op(transport, registry, path).subscribe(
            catalog::WatchRequest::new(path).to_message(),
            CallOptions::new(),
            move |reply| sink.lock().unwrap().push(reply),
        );
        replies
    }

    fn changed(kind: &str, paths: &[&str]) -> IncomingEvent {
        IncomingEvent::new(result::CHANGED, json!({ "kind": kind, "paths": paths }))
    }

    #[test]
    fn test_ack_registers_and_reports_once() {
        let transport = LoopbackTransport::new();
        let registry = WatchRegistry::default();
        let replies = watch(&transport, &registry, "src");

        assert!(!registry.contains("src"));
        transport.emit(0, IncomingEvent::ok());

        assert!(registry.contains("src"));
        let replies = replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(
            replies[0].result.as_ref().unwrap(),
            &WatchEvent::Watching {
                path: "src".to_string()
            }
        );
        assert!(transport.last_dispatch().unwrap().options.multiplicity);
    }

    #[test]
    fn test_changes_forwarded_without_stopping() {
        let transport = LoopbackTransport::new();
        let registry = WatchRegistry::default();
        let replies = watch(&transport, &registry, "src");

        transport.emit(0, IncomingEvent::ok());
        transport.emit(0, changed("modify", &["src/lib.rs"]));
        transport.emit(0, changed("create", &["src/new.rs"]));

        assert!(!transport.is_stopped(0));
        let replies = replies.lock().unwrap();
        assert_eq!(replies.len(), 3);
        assert_eq!(
            replies[2].result.as_ref().unwrap(),
            &WatchEvent::Changed(Change {
                path: "src".to_string(),
                kind: ChangeKind::Create,
                paths: vec!["src/new.rs".to_string()],
            })
        );
    }

    #[test]
    fn test_malformed_change_stops_watch() {
        let transport = LoopbackTransport::new();
        let registry = WatchRegistry::default();
        let replies = watch(&transport, &registry, "src");

        transport.emit(0, IncomingEvent::ok());
        transport.emit(0, IncomingEvent::new(result::CHANGED, json!({ "kind": "modify" })));

        assert!(transport.is_stopped(0));
        assert!(!registry.contains("src"));
        assert!(replies.lock().unwrap()[1].error().is_some());
    }

    #[test]
    fn test_remote_error_reported() {
        let transport = LoopbackTransport::new();
        let registry = WatchRegistry::default();
        let replies = watch(&transport, &registry, "missing");

        transport.emit(0, IncomingEvent::error("no such path"));

        assert!(transport.is_stopped(0));
        let replies = replies.lock().unwrap();
        assert!(matches!(
            replies[0].result,
            Err(OpwireError::Remote(ref d)) if d == "no such path"
        ));
    }

    #[test]
    fn test_rewatch_stops_previous_subscription() {
        let transport = LoopbackTransport::new();
        let registry = WatchRegistry::default();
        let _first = watch(&transport, &registry, "src");
        let _second = watch(&transport, &registry, "src");

        transport.emit(0, IncomingEvent::ok());
        transport.emit(1, IncomingEvent::ok());

        assert!(transport.is_stopped(0));
        assert!(!transport.is_stopped(1));
        assert_eq!(registry.paths(), vec!["src".to_string()]);
    }

    #[test]
    fn test_stale_error_keeps_newer_session() {
        let registry = WatchRegistry::default();
        let old = StopHandle::new();
        let new = StopHandle::new();

        assert!(registry.insert("src", &old).is_none());
        assert!(registry.insert("src", &new).is_some());
        assert!(!registry.remove_if_same("src", &old));
        assert!(registry.contains("src"));
        assert!(registry.remove("src").unwrap().same_subscription(&new));
    }

    #[tokio::test]
    async fn test_await_resolves_on_ack() {
        let transport = LoopbackTransport::with_responder(|_| vec![IncomingEvent::ok()]);
        let registry = WatchRegistry::default();
        let reply = watch_op(&transport, &registry, "docs")
            .call(
                catalog::WatchRequest::new("docs").recursive(true).to_message(),
                CallOptions::new().timeout(Duration::from_secs(1)),
            )
            .await;

        assert!(reply.is_ok());
        assert!(registry.contains("docs"));
    }
}
