//! Client builder and API surface.
//!
//! The [`ClientBuilder`] wires a [`Transport`] and timing settings into a
//! [`Client`]. The client owns one prebuilt [`Operation`] per catalog entry
//! plus the process and watch registries; nothing outside the client can
//! reach those registries except through its read-only accessors.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use opwire_client::protocol::IncomingEvent;
//! use opwire_client::transport::LoopbackTransport;
//! use opwire_client::Client;
//!
//! let transport = LoopbackTransport::with_responder(|_| vec![IncomingEvent::ok()]);
//! let client = Client::builder(transport)
//!     .max_timeout(Duration::from_secs(5))
//!     .build();
//!
//! let reply = client.write_file_text("notes.md", "hello").blocking();
//! assert!(reply.is_ok());
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{
    self, request, DirEntries, Metadata, MetadataRequest, ProcessOutput, ReadDirRequest,
    SpawnRequest, SystemInfo, WatchRequest,
};
use crate::config::{CallOptions, Settings, SettingsProvider};
use crate::error::{OpwireError, Result};
use crate::operation::{Operation, OperationDescriptor, PreparedCall, Reply};
use crate::protocol::OutgoingMessage;
use crate::session::{
    spawn_descriptor, watch_descriptor, ProcessEvent, ProcessHandle, ProcessRegistry,
    ProcessRouter, WatchEvent, WatchRegistry, WatchRouter, WatchSignal,
};
use crate::transport::Transport;

/// Builder for a [`Client`].
pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    settings: Settings,
    provider: Option<Arc<dyn SettingsProvider>>,
}

impl ClientBuilder {
    /// Start a builder over `transport`.
    pub fn new(transport: impl Transport) -> Self {
        Self::with_shared_transport(Arc::new(transport))
    }

    /// Start a builder over an already shared transport.
    pub fn with_shared_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            settings: Settings::default(),
            provider: None,
        }
    }

    /// Set the default budget for synchronous calls.
    ///
    /// Default: 15 seconds
    pub fn max_timeout(mut self, timeout: Duration) -> Self {
        self.settings.max_timeout = timeout;
        self
    }

    /// Set the default poll interval.
    ///
    /// Default: 200 milliseconds
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.settings.poll_interval = interval;
        self
    }

    /// Read defaults from a live provider instead.
    ///
    /// Overrides [`max_timeout`](Self::max_timeout) and
    /// [`poll_interval`](Self::poll_interval).
    pub fn settings(mut self, provider: impl SettingsProvider) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        let settings = self
            .provider
            .unwrap_or_else(|| Arc::new(self.settings));
        Client::new(self.transport, settings)
    }
}

struct Operations {
    append_file: Operation<()>,
    append_file_text: Operation<()>,
    copy: Operation<()>,
    create_dir: Operation<()>,
    exists: Operation<bool>,
    metadata: Operation<Metadata>,
    read_dir: Operation<DirEntries>,
    read_file: Operation<Vec<u8>>,
    read_file_text: Operation<String>,
    remove: Operation<()>,
    rename: Operation<()>,
    write_file: Operation<()>,
    write_file_text: Operation<()>,
    system_info: Operation<SystemInfo>,
    spawn: Operation<ProcessEvent, ProcessHandle>,
    unwatch: Operation<()>,
}

/// Typed API over a remote peer.
pub struct Client {
    transport: Arc<dyn Transport>,
    settings: Arc<dyn SettingsProvider>,
    ops: Operations,
    processes: ProcessRegistry,
    watches: WatchRegistry,
}

impl Client {
    /// Create a builder over `transport`.
    pub fn builder(transport: impl Transport) -> ClientBuilder {
        ClientBuilder::new(transport)
    }

    fn new(transport: Arc<dyn Transport>, settings: Arc<dyn SettingsProvider>) -> Self {
        let processes = ProcessRegistry::default();
        let op = |descriptor: OperationDescriptor<()>| {
            Operation::new(descriptor, transport.clone(), settings.clone())
        };

        let ops = Operations {
            append_file: op(catalog::append_file()),
            append_file_text: op(catalog::append_file_text()),
            copy: op(catalog::copy()),
            create_dir: op(catalog::create_dir()),
            exists: Operation::new(catalog::exists(), transport.clone(), settings.clone()),
            metadata: Operation::new(catalog::metadata(), transport.clone(), settings.clone()),
            read_dir: Operation::new(catalog::read_dir(), transport.clone(), settings.clone()),
            read_file: Operation::new(catalog::read_file(), transport.clone(), settings.clone()),
            read_file_text: Operation::new(
                catalog::read_file_text(),
                transport.clone(),
                settings.clone(),
            ),
            remove: op(catalog::remove()),
            rename: op(catalog::rename()),
            write_file: op(catalog::write_file()),
            write_file_text: op(catalog::write_file_text()),
            system_info: Operation::new(
                catalog::system_info(),
                transport.clone(),
                settings.clone(),
            ),
            spawn: Operation::with_interceptor(
                spawn_descriptor(processes.clone(), transport.clone(), settings.clone()),
                ProcessRouter::new(processes.clone()),
                transport.clone(),
                settings.clone(),
            ),
            unwatch: op(catalog::unwatch()),
        };

        Self {
            transport,
            settings,
            ops,
            processes,
            watches: WatchRegistry::default(),
        }
    }

    /// Settings used to resolve call defaults.
    pub fn settings(&self) -> &Arc<dyn SettingsProvider> {
        &self.settings
    }

    /// Append bytes to a file.
    pub fn append_file(&self, path: &str, data: impl Into<Vec<u8>>) -> PreparedCall<()> {
        self.ops.append_file.prepare(
            OutgoingMessage::new(request::APPEND_FILE)
                .with("path", path)
                .with("data", data.into()),
        )
    }

    /// Append text to a file.
    pub fn append_file_text(&self, path: &str, text: &str) -> PreparedCall<()> {
        self.ops.append_file_text.prepare(
            OutgoingMessage::new(request::APPEND_FILE_TEXT)
                .with("path", path)
                .with("text", text),
        )
    }

    /// Copy `src` to `dst`.
    pub fn copy(&self, src: &str, dst: &str) -> PreparedCall<()> {
        self.ops.copy.prepare(
            OutgoingMessage::new(request::COPY)
                .with("src", src)
                .with("dst", dst),
        )
    }

    /// Create a directory, with its parents when `all` is set.
    pub fn create_dir(&self, path: &str, all: bool) -> PreparedCall<()> {
        self.ops.create_dir.prepare(
            OutgoingMessage::new(request::CREATE_DIR)
                .with("path", path)
                .with("all", all),
        )
    }

    /// Test whether `path` exists.
    pub fn exists(&self, path: &str) -> PreparedCall<bool> {
        self.ops
            .exists
            .prepare(OutgoingMessage::new(request::EXISTS).with("path", path))
    }

    /// Read metadata of a path.
    pub fn metadata(&self, request: MetadataRequest) -> PreparedCall<Metadata> {
        self.ops.metadata.prepare(request.to_message())
    }

    /// List a directory.
    pub fn read_dir(&self, request: ReadDirRequest) -> PreparedCall<DirEntries> {
        self.ops.read_dir.prepare(request.to_message())
    }

    /// Read a file as bytes.
    pub fn read_file(&self, path: &str) -> PreparedCall<Vec<u8>> {
        self.ops
            .read_file
            .prepare(OutgoingMessage::new(request::READ_FILE).with("path", path))
    }

    /// Read a file as text.
    pub fn read_file_text(&self, path: &str) -> PreparedCall<String> {
        self.ops
            .read_file_text
            .prepare(OutgoingMessage::new(request::READ_FILE_TEXT).with("path", path))
    }

    /// Remove a file or directory.
    pub fn remove(&self, path: &str, force: bool) -> PreparedCall<()> {
        self.ops.remove.prepare(
            OutgoingMessage::new(request::REMOVE)
                .with("path", path)
                .with("force", force),
        )
    }

    /// Rename `src` to `dst`.
    pub fn rename(&self, src: &str, dst: &str) -> PreparedCall<()> {
        self.ops.rename.prepare(
            OutgoingMessage::new(request::RENAME)
                .with("src", src)
                .with("dst", dst),
        )
    }

    /// Write bytes to a file, replacing its content.
    pub fn write_file(&self, path: &str, data: impl Into<Vec<u8>>) -> PreparedCall<()> {
        self.ops.write_file.prepare(
            OutgoingMessage::new(request::WRITE_FILE)
                .with("path", path)
                .with("data", data.into()),
        )
    }

    /// Write text to a file, replacing its content.
    pub fn write_file_text(&self, path: &str, text: &str) -> PreparedCall<()> {
        self.ops.write_file_text.prepare(
            OutgoingMessage::new(request::WRITE_FILE_TEXT)
                .with("path", path)
                .with("text", text),
        )
    }

    /// Describe the remote system.
    pub fn system_info(&self) -> PreparedCall<SystemInfo> {
        self.ops
            .system_info
            .prepare(OutgoingMessage::new(request::SYSTEM_INFO))
    }

    /// Start a process.
    ///
    /// The reply carries a [`ProcessHandle`] once the peer reports the
    /// process id. Output and exit events are buffered in the session.
    pub fn spawn(&self, request: SpawnRequest) -> PreparedCall<ProcessEvent, ProcessHandle> {
        self.ops.spawn.prepare(request.to_message())
    }

    /// Start a process and collect everything it prints until it exits.
    ///
    /// `options.timeout` bounds the spawn acknowledgment and the wait for
    /// exit separately.
    pub async fn spawn_wait(
        &self,
        request: SpawnRequest,
        options: CallOptions,
    ) -> Result<ProcessOutput> {
        let handle = self
            .spawn(request)
            .options(options.clone())
            .await
            .into_result()?;
        Ok(Self::collect(handle.wait(options).await?))
    }

    /// Blocking form of [`spawn_wait`](Self::spawn_wait).
    pub fn spawn_wait_blocking(
        &self,
        request: SpawnRequest,
        options: CallOptions,
    ) -> Result<ProcessOutput> {
        let handle = self
            .spawn(request)
            .options(options.clone())
            .blocking()
            .into_result()?;
        Ok(Self::collect(handle.wait_blocking(options)?))
    }

    fn collect(done: ProcessHandle) -> ProcessOutput {
        let (stdout, stderr) = done.take_output();
        ProcessOutput {
            status: done.status().unwrap_or_default(),
            exit_code: done.exit_code(),
            stdout,
            stderr,
        }
    }

    /// Whether a session for process `id` is registered.
    pub fn has_process(&self, id: &str) -> bool {
        self.processes.contains(id)
    }

    /// Ids of all registered processes, sorted.
    pub fn process_ids(&self) -> Vec<String> {
        self.processes.ids()
    }

    /// Watch a path.
    ///
    /// The first reply is [`WatchEvent::Watching`]; with
    /// [`subscribe`](PreparedCall::subscribe) every later change follows.
    /// Watching a path again replaces the earlier session.
    pub fn watch(&self, request: WatchRequest) -> PreparedCall<WatchSignal, WatchEvent> {
        Operation::with_interceptor(
            watch_descriptor(request.path()),
            WatchRouter::new(request.path(), self.watches.clone()),
            self.transport.clone(),
            self.settings.clone(),
        )
        .prepare(request.to_message())
    }

    /// Stop watching `path` and tell the peer.
    ///
    /// Fails with [`OpwireError::NotWatching`] without sending anything if
    /// no watch is registered for `path`.
    pub async fn unwatch(&self, path: &str, options: CallOptions) -> Result<()> {
        self.detach_watch(path)?.options(options).await.into_result()
    }

    /// Callback form of [`unwatch`](Self::unwatch).
    pub fn unwatch_with<F>(&self, path: &str, options: CallOptions, callback: F)
    where
        F: Fn(Reply<()>) + Send + Sync + 'static,
    {
        match self.detach_watch(path) {
            Ok(call) => call.options(options).subscribe(callback),
            Err(err) => callback(Reply::failed(err)),
        }
    }

    /// Blocking form of [`unwatch`](Self::unwatch).
    pub fn unwatch_blocking(&self, path: &str, options: CallOptions) -> Result<()> {
        self.detach_watch(path)?
            .options(options)
            .blocking()
            .into_result()
    }

    fn detach_watch(&self, path: &str) -> Result<PreparedCall<()>> {
        let stop = self
            .watches
            .remove(path)
            .ok_or_else(|| OpwireError::NotWatching(path.to_string()))?;
        stop.stop();
        tracing::debug!(path, "watch removed");
        Ok(self
            .ops
            .unwatch
            .prepare(OutgoingMessage::new(request::UNWATCH).with("path", path)))
    }

    /// Whether a watch for `path` is registered.
    pub fn is_watching(&self, path: &str) -> bool {
        self.watches.contains(path)
    }

    /// All watched paths, sorted.
    pub fn watched_paths(&self) -> Vec<String> {
        self.watches.paths()
    }
}
