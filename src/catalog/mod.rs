//! Operation catalog.
//!
//! Tags, schemas and mappings of every operation the [`Client`](crate::Client)
//! exposes. Each descriptor is built once per client.
//!
//! | operation          | request tag        | result tag(s)                   |
//! |--------------------|--------------------|---------------------------------|
//! | append_file        | `append-file`      | `ok`                            |
//! | append_file_text   | `append-file-text` | `ok`                            |
//! | copy               | `copy`             | `ok`                            |
//! | create_dir         | `create-dir`       | `ok`                            |
//! | exists             | `exists`           | `exists`                        |
//! | metadata           | `metadata`         | `metadata`                      |
//! | read_dir           | `read-dir`         | `dir-entries`                   |
//! | read_file          | `read-file`        | `blob`                          |
//! | read_file_text     | `read-file-text`   | `text`                          |
//! | remove             | `remove`           | `ok`                            |
//! | rename             | `rename`           | `ok`                            |
//! | write_file         | `write-file`       | `ok`                            |
//! | write_file_text    | `write-file-text`  | `ok`                            |
//! | system_info        | `system-info`      | `system-info`                   |
//! | spawn              | `spawn`            | `process-*` stream              |
//! | write_stdin        | `write-stdin`      | `ok`                            |
//! | kill               | `kill`             | `ok`                            |
//! | watch              | `watch`            | `ok`, then `changed` stream     |
//! | unwatch            | `unwatch`          | `ok`                            |

mod types;

use serde::Deserialize;

use crate::operation::{decode_data, OperationDescriptor};
use crate::protocol::{tags, FieldKind, Schema};

pub use types::{
    Change, ChangeKind, DirEntries, DirEntry, FileType, Metadata, MetadataRequest,
    ProcessOutput, PtySize, ReadDirRequest, SpawnRequest, SystemInfo, WatchRequest,
};

/// Request tags.
pub mod request {
    /// Append bytes to a file.
    pub const APPEND_FILE: &str = "append-file";
    /// Append text to a file.
    pub const APPEND_FILE_TEXT: &str = "append-file-text";
    /// Copy a file or directory.
    pub const COPY: &str = "copy";
    /// Create a directory.
    pub const CREATE_DIR: &str = "create-dir";
    /// Test whether a path exists.
    pub const EXISTS: &str = "exists";
    /// Read metadata of a path.
    pub const METADATA: &str = "metadata";
    /// List a directory.
    pub const READ_DIR: &str = "read-dir";
    /// Read a file as bytes.
    pub const READ_FILE: &str = "read-file";
    /// Read a file as text.
    pub const READ_FILE_TEXT: &str = "read-file-text";
    /// Remove a file or directory.
    pub const REMOVE: &str = "remove";
    /// Rename a path.
    pub const RENAME: &str = "rename";
    /// Write bytes to a file.
    pub const WRITE_FILE: &str = "write-file";
    /// Write text to a file.
    pub const WRITE_FILE_TEXT: &str = "write-file-text";
    /// Describe the remote system.
    pub const SYSTEM_INFO: &str = "system-info";
    /// Start a process.
    pub const SPAWN: &str = "spawn";
    /// Feed a process's stdin.
    pub const WRITE_STDIN: &str = "write-stdin";
    /// Kill a process.
    pub const KILL: &str = "kill";
    /// Watch a path for changes.
    pub const WATCH: &str = "watch";
    /// Stop watching a path.
    pub const UNWATCH: &str = "unwatch";
}

/// Result tags (besides `ok` and `error`).
pub mod result {
    /// `exists` answer.
    pub const EXISTS: &str = "exists";
    /// `metadata` answer.
    pub const METADATA: &str = "metadata";
    /// `read-dir` answer.
    pub const DIR_ENTRIES: &str = "dir-entries";
    /// `read-file` answer.
    pub const BLOB: &str = "blob";
    /// `read-file-text` answer.
    pub const TEXT: &str = "text";
    /// `system-info` answer.
    pub const SYSTEM_INFO: &str = "system-info";
    /// Process started.
    pub const PROCESS_SPAWNED: &str = "process-spawned";
    /// Process wrote to stdout.
    pub const PROCESS_STDOUT: &str = "process-stdout";
    /// Process wrote to stderr.
    pub const PROCESS_STDERR: &str = "process-stderr";
    /// Process finished.
    pub const PROCESS_DONE: &str = "process-done";
    /// Watched path changed.
    pub const CHANGED: &str = "changed";
}

#[derive(Deserialize)]
struct Wrapped<T> {
    data: T,
}

#[derive(Deserialize)]
struct ExistsPayload {
    value: bool,
}

fn path_op(tag: &str) -> OperationDescriptor<()> {
    OperationDescriptor::ack(tag).field("path", FieldKind::String)
}

/// `append-file` descriptor.
pub fn append_file() -> OperationDescriptor<()> {
    path_op(request::APPEND_FILE).field("data", FieldKind::Sequence)
}

/// `append-file-text` descriptor.
pub fn append_file_text() -> OperationDescriptor<()> {
    path_op(request::APPEND_FILE_TEXT).field("text", FieldKind::String)
}

/// `copy` descriptor.
pub fn copy() -> OperationDescriptor<()> {
    OperationDescriptor::ack(request::COPY)
        .field("src", FieldKind::String)
        .field("dst", FieldKind::String)
}

/// `create-dir` descriptor.
pub fn create_dir() -> OperationDescriptor<()> {
    path_op(request::CREATE_DIR).optional("all", FieldKind::Boolean)
}

/// `exists` descriptor.
pub fn exists() -> OperationDescriptor<bool> {
    OperationDescriptor::new(request::EXISTS, &[result::EXISTS], |data, tag, _| {
        decode_data::<ExistsPayload>(data, tag).map(|p| p.value)
    })
    .field("path", FieldKind::String)
}

/// `metadata` descriptor.
pub fn metadata() -> OperationDescriptor<Metadata> {
    OperationDescriptor::decoding(request::METADATA, result::METADATA)
        .field("path", FieldKind::String)
        .optional("canonicalize", FieldKind::Boolean)
        .optional("resolve_file_type", FieldKind::Boolean)
}

/// `read-dir` descriptor.
pub fn read_dir() -> OperationDescriptor<DirEntries> {
    OperationDescriptor::decoding(request::READ_DIR, result::DIR_ENTRIES)
        .field("path", FieldKind::String)
        .optional("depth", FieldKind::Number)
        .optional("absolute", FieldKind::Boolean)
        .optional("canonicalize", FieldKind::Boolean)
        .optional("include_root", FieldKind::Boolean)
}

/// `read-file` descriptor.
pub fn read_file() -> OperationDescriptor<Vec<u8>> {
    OperationDescriptor::new(request::READ_FILE, &[result::BLOB], |data, tag, _| {
        decode_data::<Wrapped<Vec<u8>>>(data, tag).map(|w| w.data)
    })
    .field("path", FieldKind::String)
}

/// `read-file-text` descriptor.
pub fn read_file_text() -> OperationDescriptor<String> {
    OperationDescriptor::new(request::READ_FILE_TEXT, &[result::TEXT], |data, tag, _| {
        decode_data::<Wrapped<String>>(data, tag).map(|w| w.data)
    })
    .field("path", FieldKind::String)
}

/// `remove` descriptor.
pub fn remove() -> OperationDescriptor<()> {
    path_op(request::REMOVE).optional("force", FieldKind::Boolean)
}

/// `rename` descriptor.
pub fn rename() -> OperationDescriptor<()> {
    OperationDescriptor::ack(request::RENAME)
        .field("src", FieldKind::String)
        .field("dst", FieldKind::String)
}

/// `write-file` descriptor.
pub fn write_file() -> OperationDescriptor<()> {
    path_op(request::WRITE_FILE).field("data", FieldKind::Sequence)
}

/// `write-file-text` descriptor.
pub fn write_file_text() -> OperationDescriptor<()> {
    path_op(request::WRITE_FILE_TEXT).field("text", FieldKind::String)
}

/// `system-info` descriptor.
pub fn system_info() -> OperationDescriptor<SystemInfo> {
    OperationDescriptor::decoding(request::SYSTEM_INFO, result::SYSTEM_INFO)
}

/// `write-stdin` descriptor.
pub fn write_stdin() -> OperationDescriptor<()> {
    OperationDescriptor::ack(request::WRITE_STDIN)
        .field("id", FieldKind::String)
        .field("data", FieldKind::String)
}

/// `kill` descriptor.
pub fn kill() -> OperationDescriptor<()> {
    OperationDescriptor::ack(request::KILL).field("id", FieldKind::String)
}

/// `unwatch` descriptor.
pub fn unwatch() -> OperationDescriptor<()> {
    path_op(request::UNWATCH)
}

/// Result tags accepted by `spawn`.
pub const SPAWN_RESULTS: [&str; 4] = [
    result::PROCESS_SPAWNED,
    result::PROCESS_STDOUT,
    result::PROCESS_STDERR,
    result::PROCESS_DONE,
];

/// Request schema of `spawn`.
pub fn spawn_schema() -> Schema {
    Schema::new(request::SPAWN)
        .field("cmd", FieldKind::String)
        .optional("args", FieldKind::Sequence)
        .optional("persist", FieldKind::Boolean)
        .optional("pty", FieldKind::Mapping)
}

/// Response schemas of `spawn`.
pub fn spawn_response_schemas() -> [Schema; 4] {
    [
        Schema::new(result::PROCESS_SPAWNED).field("id", FieldKind::String),
        Schema::new(result::PROCESS_STDOUT).field("id", FieldKind::String),
        Schema::new(result::PROCESS_STDERR).field("id", FieldKind::String),
        Schema::new(result::PROCESS_DONE)
            .field("id", FieldKind::String)
            .field("status", FieldKind::String)
            .optional("code", FieldKind::Number),
    ]
}

/// Result tags accepted by `watch`.
pub const WATCH_RESULTS: [&str; 2] = [tags::OK, result::CHANGED];

/// Request schema of `watch`.
pub fn watch_schema() -> Schema {
    Schema::new(request::WATCH)
        .field("path", FieldKind::String)
        .optional("recursive", FieldKind::Boolean)
        .optional("only", FieldKind::Sequence)
        .optional("except", FieldKind::Sequence)
}

/// Response schema of `changed` events.
pub fn changed_schema() -> Schema {
    Schema::new(result::CHANGED)
        .field("kind", FieldKind::String)
        .field("paths", FieldKind::Sequence)
}
