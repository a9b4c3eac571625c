//! Process sessions.
//!
//! One `spawn` request yields a stream of events for the new process:
//!
//! ```text
//! process-spawned ─► process-stdout* / process-stderr* ─► process-done
//! ```
//!
//! The spawn operation's mapping turns `process-spawned` into a
//! [`ProcessHandle`] and registers its state; [`ProcessRouter`] then
//! forwards the handle to the caller and absorbs every later event into the
//! session's buffers. `process-done` records the exit status and stops the
//! subscription. The session leaves the registry when a caller's
//! [`wait`](ProcessHandle::wait) first observes the terminal status.
//!
//! # Example
//!
//! ```ignore
//! let proc = client.spawn(SpawnRequest::new("cargo").arg("check")).await.into_result()?;
//! proc.write_stdin("y\n").await.into_result()?;
//! let lines = proc.read_stdout(CallOptions::new()).await?;
//! let done = proc.wait(CallOptions::new()).await?;
//! assert_eq!(done.exit_code(), Some(0));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use serde_json::Value;

use crate::catalog::{self, request, result};
use crate::config::{CallOptions, SettingsProvider};
use crate::error::{OpwireError, Result};
use crate::operation::{
    decode_data, Forward, Interceptor, Operation, OperationDescriptor, Poller, PreparedCall,
};
use crate::protocol::OutgoingMessage;
use crate::transport::{StopHandle, Transport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Buffered state of one process.
#[derive(Debug, Default)]
struct ProcessState {
    stdout: Vec<String>,
    stderr: Vec<String>,
    status: Option<String>,
    exit_code: Option<i64>,
}

type SharedState = Arc<Mutex<ProcessState>>;

/// Registry of live process sessions, keyed by process id.
#[derive(Clone, Default)]
pub(crate) struct ProcessRegistry {
    sessions: Arc<Mutex<HashMap<String, SharedState>>>,
}

impl ProcessRegistry {
    fn insert(&self, id: &str, state: SharedState) {
        if lock(&self.sessions)
            .insert(id.to_string(), state)
            .is_some()
        {
            tracing::debug!(id, "replacing existing process session");
        }
    }

    /// Remove `id` only if it still refers to `state`.
    fn remove_if_same(&self, id: &str, state: &SharedState) -> bool {
        let mut sessions = lock(&self.sessions);
        match sessions.get(id) {
            Some(current) if Arc::ptr_eq(current, state) => {
                sessions.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Apply `f` to the session `id`. Returns `false` if there is none.
    fn with_session(&self, id: &str, f: impl FnOnce(&mut ProcessState)) -> bool {
        let state = lock(&self.sessions).get(id).cloned();
        match state {
            Some(state) => {
                f(&mut *lock(&state));
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        lock(&self.sessions).contains_key(id)
    }

    pub(crate) fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.sessions).keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Chunks of one output event: a single string or a list of strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Chunks {
    One(String),
    Many(Vec<String>),
}

impl From<Chunks> for Vec<String> {
    fn from(chunks: Chunks) -> Self {
        match chunks {
            Chunks::One(chunk) => vec![chunk],
            Chunks::Many(chunks) => chunks,
        }
    }
}

#[derive(Deserialize)]
struct SpawnedPayload {
    id: String,
}

#[derive(Deserialize)]
struct OutputPayload {
    id: String,
    #[serde(default)]
    data: Option<Chunks>,
}

#[derive(Deserialize)]
struct DonePayload {
    id: String,
    status: String,
    #[serde(default)]
    code: Option<i64>,
}

/// Typed event of a spawn subscription.
#[derive(Debug)]
pub enum ProcessEvent {
    /// The process started; its session is registered.
    Spawned(ProcessHandle),
    /// Output on stdout.
    Stdout {
        /// Process id.
        id: String,
        /// Output chunks.
        chunks: Vec<String>,
    },
    /// Output on stderr.
    Stderr {
        /// Process id.
        id: String,
        /// Output chunks.
        chunks: Vec<String>,
    },
    /// The process finished.
    Done {
        /// Process id.
        id: String,
        /// Terminal status.
        status: String,
        /// Exit code, if any.
        code: Option<i64>,
    },
}

fn output(data: Option<Value>, tag: &str) -> Result<(String, Vec<String>)> {
    let payload: OutputPayload = decode_data(data, tag)?;
    Ok((payload.id, payload.data.map(Into::into).unwrap_or_default()))
}

/// Build the `spawn` descriptor.
///
/// The mapping registers a session in `registry` for every
/// `process-spawned` event.
pub(crate) fn spawn_descriptor(
    registry: ProcessRegistry,
    transport: Arc<dyn Transport>,
    settings: Arc<dyn SettingsProvider>,
) -> OperationDescriptor<ProcessEvent> {
    let descriptor = OperationDescriptor::new(
        request::SPAWN,
        &catalog::SPAWN_RESULTS,
        move |data, tag, _stop| match tag {
            result::PROCESS_SPAWNED => {
                let SpawnedPayload { id } = decode_data(data, tag)?;
                let handle =
                    ProcessHandle::new(id, registry.clone(), transport.clone(), settings.clone());
                registry.insert(&handle.id, handle.state.clone());
                tracing::debug!(id = %handle.id, "process spawned");
                Ok(ProcessEvent::Spawned(handle))
            }
            result::PROCESS_STDOUT => {
                output(data, tag).map(|(id, chunks)| ProcessEvent::Stdout { id, chunks })
            }
            result::PROCESS_STDERR => {
                output(data, tag).map(|(id, chunks)| ProcessEvent::Stderr { id, chunks })
            }
            result::PROCESS_DONE => {
                let DonePayload { id, status, code } = decode_data(data, tag)?;
                Ok(ProcessEvent::Done { id, status, code })
            }
            other => Err(OpwireError::Protocol(format!(
                "unhandled spawn event '{}'",
                other
            ))),
        },
    )
    .with_schema(catalog::spawn_schema())
    .multiplicity(true);

    catalog::spawn_response_schemas()
        .into_iter()
        .fold(descriptor, OperationDescriptor::response_schema)
}

/// Routes spawn events: hands the session to the caller, absorbs output and
/// exit events into the session.
pub(crate) struct ProcessRouter {
    registry: ProcessRegistry,
}

impl ProcessRouter {
    pub(crate) fn new(registry: ProcessRegistry) -> Self {
        Self { registry }
    }

    fn route(&self, id: &str, f: impl FnOnce(&mut ProcessState)) {
        if !self.registry.with_session(id, f) {
            tracing::debug!(id, "dropping event for unknown process");
        }
    }
}

impl Interceptor<ProcessEvent, ProcessHandle> for ProcessRouter {
    fn intercept(
        &self,
        result: Result<ProcessEvent>,
        stop: &StopHandle,
        forward: &Forward<ProcessHandle>,
    ) {
        match result {
            Err(err) => forward.send(Err(err), stop),
            Ok(ProcessEvent::Spawned(handle)) => forward.send(Ok(handle), stop),
            Ok(ProcessEvent::Stdout { id, chunks }) => {
                self.route(&id, |s| s.stdout.extend(chunks));
            }
            Ok(ProcessEvent::Stderr { id, chunks }) => {
                self.route(&id, |s| s.stderr.extend(chunks));
            }
            Ok(ProcessEvent::Done { id, status, code }) => {
                tracing::debug!(%id, %status, ?code, "process done");
                self.route(&id, |s| {
                    s.status = Some(status);
                    s.exit_code = code;
                });
                stop.stop();
            }
        }
    }
}

/// Handle to a spawned process.
///
/// Cloning shares the same session.
#[derive(Clone)]
pub struct ProcessHandle {
    id: String,
    state: SharedState,
    registry: ProcessRegistry,
    write_stdin: Operation<()>,
    kill: Operation<()>,
}

impl ProcessHandle {
    fn new(
        id: String,
        registry: ProcessRegistry,
        transport: Arc<dyn Transport>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            id,
            state: SharedState::default(),
            registry,
            write_stdin: Operation::new(
                catalog::write_stdin(),
                transport.clone(),
                settings.clone(),
            ),
            kill: Operation::new(catalog::kill(), transport, settings),
        }
    }

    /// Process id assigned by the peer.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the process has not reported a terminal status yet.
    pub fn is_active(&self) -> bool {
        lock(&self.state).status.is_none()
    }

    /// Whether the process reported a terminal status.
    pub fn is_done(&self) -> bool {
        !self.is_active()
    }

    /// Terminal status, once done.
    pub fn status(&self) -> Option<String> {
        lock(&self.state).status.clone()
    }

    /// Exit code, once done (absent if the process was killed by a signal).
    pub fn exit_code(&self) -> Option<i64> {
        lock(&self.state).exit_code
    }

    /// Send `data` to the process's stdin.
    pub fn write_stdin(&self, data: impl Into<String>) -> PreparedCall<()> {
        self.write_stdin.prepare(
            OutgoingMessage::new(request::WRITE_STDIN)
                .with("id", self.id.as_str())
                .with("data", data.into()),
        )
    }

    /// Ask the peer to kill the process.
    pub fn kill(&self) -> PreparedCall<()> {
        self.kill
            .prepare(OutgoingMessage::new(request::KILL).with("id", self.id.as_str()))
    }

    fn poller(&self, options: &CallOptions) -> Poller {
        Poller::from_options(options, self.write_stdin.settings().as_ref())
    }

    fn drain(
        &self,
        select: fn(&mut ProcessState) -> &mut Vec<String>,
    ) -> impl FnMut() -> Option<Vec<String>> {
        let state = self.state.clone();
        move || {
            let mut guard = lock(&state);
            let buffer = select(&mut *guard);
            (!buffer.is_empty()).then(|| std::mem::take(buffer))
        }
    }

    fn stdout_buffer(state: &mut ProcessState) -> &mut Vec<String> {
        &mut state.stdout
    }

    fn stderr_buffer(state: &mut ProcessState) -> &mut Vec<String> {
        &mut state.stderr
    }

    /// Wait for buffered stdout and drain it.
    ///
    /// Each chunk is returned exactly once.
    pub async fn read_stdout(&self, options: CallOptions) -> Result<Vec<String>> {
        self.poller(&options)
            .wait(self.drain(Self::stdout_buffer))
            .await
    }

    /// Callback form of [`read_stdout`](Self::read_stdout).
    pub fn read_stdout_with<F>(&self, options: CallOptions, callback: F)
    where
        F: FnOnce(Result<Vec<String>>) + Send + 'static,
    {
        self.poller(&options)
            .subscribe(self.drain(Self::stdout_buffer), callback);
    }

    /// Blocking form of [`read_stdout`](Self::read_stdout); needs no runtime.
    pub fn read_stdout_blocking(&self, options: CallOptions) -> Result<Vec<String>> {
        self.poller(&options)
            .wait_blocking(self.drain(Self::stdout_buffer))
    }

    /// Wait for buffered stderr and drain it.
    pub async fn read_stderr(&self, options: CallOptions) -> Result<Vec<String>> {
        self.poller(&options)
            .wait(self.drain(Self::stderr_buffer))
            .await
    }

    /// Callback form of [`read_stderr`](Self::read_stderr).
    pub fn read_stderr_with<F>(&self, options: CallOptions, callback: F)
    where
        F: FnOnce(Result<Vec<String>>) + Send + 'static,
    {
        self.poller(&options)
            .subscribe(self.drain(Self::stderr_buffer), callback);
    }

    /// Blocking form of [`read_stderr`](Self::read_stderr).
    pub fn read_stderr_blocking(&self, options: CallOptions) -> Result<Vec<String>> {
        self.poller(&options)
            .wait_blocking(self.drain(Self::stderr_buffer))
    }

    fn finished(&self) -> impl FnMut() -> Option<ProcessHandle> {
        let handle = self.clone();
        move || {
            if handle.is_active() {
                return None;
            }
            if handle.registry.remove_if_same(&handle.id, &handle.state) {
                tracing::debug!(id = %handle.id, "process session closed");
            }
            Some(handle.clone())
        }
    }

    /// Wait until the process is done and close its session.
    ///
    /// Returns the handle so status and exit code can be read. Output still
    /// buffered stays readable through [`take_output`](Self::take_output).
    pub async fn wait(&self, options: CallOptions) -> Result<ProcessHandle> {
        self.poller(&options).wait(self.finished()).await
    }

    /// Callback form of [`wait`](Self::wait).
    pub fn wait_with<F>(&self, options: CallOptions, callback: F)
    where
        F: FnOnce(Result<ProcessHandle>) + Send + 'static,
    {
        self.poller(&options).subscribe(self.finished(), callback);
    }

    /// Blocking form of [`wait`](Self::wait).
    pub fn wait_blocking(&self, options: CallOptions) -> Result<ProcessHandle> {
        self.poller(&options).wait_blocking(self.finished())
    }

    /// Drain both buffers without waiting.
    pub fn take_output(&self) -> (Vec<String>, Vec<String>) {
        let mut state = lock(&self.state);
        (
            std::mem::take(&mut state.stdout),
            std::mem::take(&mut state.stderr),
        )
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("ProcessHandle")
            .field("id", &self.id)
            .field("status", &state.status)
            .field("exit_code", &state.exit_code)
            .finish()
    }
}
