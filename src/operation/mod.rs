//! Operation factory.
//!
//! An [`Operation`] turns an [`OperationDescriptor`] plus a transport into a
//! callable with two calling conventions:
//!
//! - [`subscribe`](Operation::subscribe) - non-blocking; the callback runs for
//!   every reply the operation forwards (once for plain operations, many times
//!   for streams)
//! - [`call`](Operation::call) / [`call_blocking`](Operation::call_blocking) -
//!   wait for the first reply, bounded by the call's timeout
//!
//! Per call the factory validates the outgoing batch, submits it, and runs
//! every incoming event through the descriptor (normalize, validate, classify,
//! map) and then through the operation's [`Interceptor`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use opwire_client::config::{CallOptions, Settings};
//! use opwire_client::operation::{Operation, OperationDescriptor};
//! use opwire_client::protocol::{FieldKind, IncomingEvent, OutgoingMessage};
//! use opwire_client::transport::LoopbackTransport;
//!
//! let transport = LoopbackTransport::with_responder(|_| vec![IncomingEvent::ok()]);
//! let remove = Operation::new(
//!     OperationDescriptor::ack("remove").field("path", FieldKind::String),
//!     Arc::new(transport),
//!     Arc::new(Settings::default()),
//! );
//!
//! let reply = remove.call_blocking(
//!     OutgoingMessage::new("remove").with("path", "old.txt"),
//!     CallOptions::new(),
//! );
//! assert!(reply.result.is_ok());
//! ```

mod call;
mod descriptor;
mod poll;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::channel::ResultChannel;
use crate::config::{CallOptions, SettingsProvider};
use crate::error::{OpwireError, Result};
use crate::protocol::Request;
use crate::transport::{EventSink, StopHandle, Transport};

pub use call::PreparedCall;
pub use descriptor::{decode_data, MapFn, OperationDescriptor};
pub use poll::Poller;

/// Boxed future for call results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of one delivery: the result and the subscription's stop handle.
///
/// The stop handle is absent when the call failed before anything was sent
/// (validation, transport refusal, timeout).
#[derive(Debug)]
pub struct Reply<T> {
    /// Value or error.
    pub result: Result<T>,
    /// Handle ending the subscription that produced this reply.
    pub stop: Option<StopHandle>,
}

impl<T> Reply<T> {
    /// Successful reply.
    pub fn ok(value: T, stop: Option<StopHandle>) -> Self {
        Self {
            result: Ok(value),
            stop,
        }
    }

    /// Failed reply without a subscription.
    pub fn failed(error: OpwireError) -> Self {
        Self {
            result: Err(error),
            stop: None,
        }
    }

    /// Drop the stop handle and keep the result.
    pub fn into_result(self) -> Result<T> {
        self.result
    }

    /// Whether the reply carries a value.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Borrow the error, if any.
    pub fn error(&self) -> Option<&OpwireError> {
        self.result.as_ref().err()
    }

    /// Map the value, keeping the stop handle.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        Reply {
            result: self.result.map(f),
            stop: self.stop,
        }
    }
}

/// Caller-side callback.
pub type Callback<T> = Arc<dyn Fn(Reply<T>) + Send + Sync>;

/// Route to the caller's callback, handed to an [`Interceptor`].
pub struct Forward<O> {
    callback: Callback<O>,
}

impl<O> Clone for Forward<O> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
        }
    }
}

impl<O> Forward<O> {
    /// Wrap a callback.
    pub fn new(callback: Callback<O>) -> Self {
        Self { callback }
    }

    /// Deliver a result together with the subscription's stop handle.
    pub fn send(&self, result: Result<O>, stop: &StopHandle) {
        (self.callback)(Reply {
            result,
            stop: Some(stop.clone()),
        });
    }

    /// Deliver a prepared reply.
    pub fn reply(&self, reply: Reply<O>) {
        (self.callback)(reply);
    }
}

/// Hook between the parsed result of an event and the caller.
///
/// The interceptor fully owns delivery: it may forward nothing (absorbing
/// the event), forward once, or forward on every event of a stream.
pub trait Interceptor<T, O>: Send + Sync + 'static {
    /// Handle the parsed result of one event.
    fn intercept(&self, result: Result<T>, stop: &StopHandle, forward: &Forward<O>);
}

/// Interceptor that forwards every result unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl<T: Send + 'static> Interceptor<T, T> for Passthrough {
    fn intercept(&self, result: Result<T>, stop: &StopHandle, forward: &Forward<T>) {
        forward.send(result, stop);
    }
}

/// A callable remote operation.
pub struct Operation<T, O = T> {
    descriptor: Arc<OperationDescriptor<T>>,
    interceptor: Arc<dyn Interceptor<T, O>>,
    transport: Arc<dyn Transport>,
    settings: Arc<dyn SettingsProvider>,
}

impl<T, O> Clone for Operation<T, O> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            interceptor: self.interceptor.clone(),
            transport: self.transport.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<T: Send + 'static> Operation<T, T> {
    /// Build an operation that forwards parsed results directly.
    pub fn new(
        descriptor: impl Into<Arc<OperationDescriptor<T>>>,
        transport: Arc<dyn Transport>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self::with_interceptor(descriptor, Passthrough, transport, settings)
    }
}

impl<T: Send + 'static, O: Send + 'static> Operation<T, O> {
    /// Build an operation whose results pass through `interceptor`.
    pub fn with_interceptor(
        descriptor: impl Into<Arc<OperationDescriptor<T>>>,
        interceptor: impl Interceptor<T, O>,
        transport: Arc<dyn Transport>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            descriptor: descriptor.into(),
            interceptor: Arc::new(interceptor),
            transport,
            settings,
        }
    }

    /// The operation's descriptor.
    pub fn descriptor(&self) -> &OperationDescriptor<T> {
        &self.descriptor
    }

    /// Settings used to resolve call defaults.
    pub fn settings(&self) -> &Arc<dyn SettingsProvider> {
        &self.settings
    }

    /// Prepare a call for `request`.
    pub fn prepare(&self, request: impl Into<Request>) -> PreparedCall<T, O> {
        PreparedCall::new(self.clone(), request.into())
    }

    /// Dispatch `request` and deliver every forwarded reply to `callback`.
    ///
    /// Validation failures and transport refusals are reported to the
    /// callback immediately; in that case nothing is sent.
    pub fn subscribe<F>(&self, request: impl Into<Request>, options: CallOptions, callback: F)
    where
        F: Fn(Reply<O>) + Send + Sync + 'static,
    {
        let callback: Callback<O> = Arc::new(callback);
        let messages = request.into().into_messages();
        let op = self.descriptor.request_tag();

        if let Some(schema) = self.descriptor.request_schema() {
            if let Some(err) = messages
                .iter()
                .find_map(|msg| schema.validate_message(msg).err())
            {
                tracing::debug!(op, error = %err, "request rejected before dispatch");
                callback(Reply::failed(err.into()));
                return;
            }
        }

        let send_options = options.send_options(self.descriptor.is_multiplicity());
        tracing::debug!(
            op,
            batch = messages.len(),
            multiplicity = send_options.multiplicity,
            "dispatching"
        );

        let descriptor = self.descriptor.clone();
        let interceptor = self.interceptor.clone();
        let forward = Forward::new(callback.clone());
        let sink: EventSink = Arc::new(move |event, stop| {
            if stop.is_stopped() {
                tracing::trace!(tag = %event.tag, "dropping event for stopped subscription");
                return;
            }
            let result = descriptor.handle_event(event, &stop);
            interceptor.intercept(result, &stop, &forward);
        });

        if let Err(err) = self.transport.send(messages, send_options, sink) {
            tracing::debug!(op, error = %err, "transport refused batch");
            callback(Reply::failed(err));
        }
    }

    /// Dispatch `request` and wait for the first reply.
    ///
    /// Suspends the calling task until a reply arrives or the timeout
    /// (`options.timeout`, else the settings' max timeout) elapses. Timing out
    /// does not cancel the request.
    pub async fn call(&self, request: impl Into<Request>, options: CallOptions) -> Reply<O> {
        let channel = self.dispatch_pending(request.into(), options);
        channel.wait().await.unwrap_or_else(Reply::failed)
    }

    /// Like [`call`](Self::call) but parks the current thread.
    ///
    /// Must not be used on a runtime thread that also drives the transport.
    pub fn call_blocking(&self, request: impl Into<Request>, options: CallOptions) -> Reply<O> {
        let channel = self.dispatch_pending(request.into(), options);
        channel.wait_blocking().unwrap_or_else(Reply::failed)
    }

    fn dispatch_pending(&self, request: Request, options: CallOptions) -> ResultChannel<Reply<O>> {
        let timeout = options.resolve_timeout(self.settings.as_ref());
        let (channel, resolver) = ResultChannel::new(timeout);
        self.subscribe(request, options, move |reply| {
            resolver.resolve(reply);
        });
        channel
    }
}
