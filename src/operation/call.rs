//! Prepared calls.
//!
//! A [`PreparedCall`] bundles an operation, its request and per-call options.
//! It is consumed in one of three ways:
//!
//! ```ignore
//! // Await the first reply (bounded by the timeout).
//! let reply = client.read_file_text("notes.md").timeout(secs(2)).await;
//!
//! // Park the current thread instead.
//! let reply = client.read_file_text("notes.md").blocking();
//!
//! // Receive every reply through a callback.
//! client.read_file_text("notes.md").subscribe(|reply| { /* ... */ });
//! ```

use std::future::IntoFuture;
use std::time::Duration;

use serde_json::Value;

use super::{BoxFuture, Operation, Reply};
use crate::config::CallOptions;
use crate::protocol::Request;

/// A request ready to be dispatched through an operation.
#[must_use = "a prepared call does nothing until awaited, blocked on or subscribed"]
pub struct PreparedCall<T, O = T> {
    operation: Operation<T, O>,
    request: Request,
    options: CallOptions,
}

impl<T: Send + 'static, O: Send + 'static> PreparedCall<T, O> {
    /// Prepare `request` with default options.
    pub fn new(operation: Operation<T, O>, request: Request) -> Self {
        Self {
            operation,
            request,
            options: CallOptions::default(),
        }
    }

    /// Replace all options.
    pub fn options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the synchronous budget.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Set the poll interval.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.options.interval = Some(interval);
        self
    }

    /// Override the operation's multiplicity flag.
    pub fn multiplicity(mut self, multiplicity: bool) -> Self {
        self.options.multiplicity = Some(multiplicity);
        self
    }

    /// Add a transport-specific option.
    pub fn extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.extra.insert(key.to_string(), value.into());
        self
    }

    /// The request that will be sent.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Dispatch and deliver replies to `callback`.
    pub fn subscribe<F>(self, callback: F)
    where
        F: Fn(Reply<O>) + Send + Sync + 'static,
    {
        self.operation
            .subscribe(self.request, self.options, callback);
    }

    /// Dispatch and park the current thread until the first reply.
    pub fn blocking(self) -> Reply<O> {
        self.operation.call_blocking(self.request, self.options)
    }
}

impl<T: Send + 'static, O: Send + 'static> IntoFuture for PreparedCall<T, O> {
    type Output = Reply<O>;
    type IntoFuture = BoxFuture<'static, Reply<O>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.operation.call(self.request, self.options).await })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Settings;
    use crate::operation::OperationDescriptor;
    use crate::protocol::{IncomingEvent, OutgoingMessage};
    use crate::transport::LoopbackTransport;

    fn op(transport: &LoopbackTransport) -> Operation<()> {
        Operation::new(
            OperationDescriptor::ack("ping"),
            Arc::new(transport.clone()),
            Arc::new(Settings::default()),
        )
    }

    #[test]
    fn test_builder_sets_options() {
        let transport = LoopbackTransport::new();
        let call = op(&transport)
            .prepare(OutgoingMessage::new("ping"))
            .timeout(Duration::from_millis(5))
            .interval(Duration::from_millis(1))
            .multiplicity(true)
            .extra("tenant", "a");

        assert_eq!(call.options.timeout, Some(Duration::from_millis(5)));
        assert_eq!(call.options.interval, Some(Duration::from_millis(1)));
        assert_eq!(call.options.multiplicity, Some(true));
        assert_eq!(call.options.extra["tenant"], "a");
        assert!(matches!(call.request(), Request::One(_)));
    }

    #[tokio::test]
    async fn test_await_prepared_call() {
        let transport = LoopbackTransport::with_responder(|_| vec![IncomingEvent::ok()]);
        let reply = op(&transport).prepare(OutgoingMessage::new("ping")).await;
        assert!(reply.is_ok());
    }

    #[test]
    fn test_blocking_prepared_call() {
        let transport = LoopbackTransport::with_responder(|_| vec![IncomingEvent::ok()]);
        let reply = op(&transport).prepare(OutgoingMessage::new("ping")).blocking();
        assert!(reply.is_ok());
    }

    #[test]
    fn test_extra_reaches_transport() {
        let transport = LoopbackTransport::new();
        op(&transport)
            .prepare(OutgoingMessage::new("ping"))
            .extra("tenant", "a")
            .subscribe(|_| {});
        assert_eq!(transport.dispatches()[0].options.extra["tenant"], "a");
    }
}
