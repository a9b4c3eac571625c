//! Typed request and response payloads of the catalog.

use serde::{Deserialize, Serialize};

use crate::protocol::OutgoingMessage;

use super::request;

/// Kind of filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Directory.
    Dir,
    /// Regular file.
    File,
    /// Symbolic link.
    Symlink,
}

/// Result of `metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Entry kind.
    pub file_type: FileType,
    /// Size in bytes.
    pub len: u64,
    /// Whether the entry is read-only.
    pub readonly: bool,
    /// Last access, milliseconds since the epoch.
    #[serde(default)]
    pub accessed: Option<u64>,
    /// Creation time, milliseconds since the epoch.
    #[serde(default)]
    pub created: Option<u64>,
    /// Last modification, milliseconds since the epoch.
    #[serde(default)]
    pub modified: Option<u64>,
    /// Canonical path, when requested.
    #[serde(default)]
    pub canonicalized_path: Option<String>,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry path.
    pub path: String,
    /// Entry kind.
    pub file_type: FileType,
    /// Depth below the listed directory (0 for the root itself).
    pub depth: usize,
}

/// Result of `read_dir`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntries {
    /// Entries found.
    #[serde(default)]
    pub entries: Vec<DirEntry>,
    /// Per-entry failures reported by the peer.
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Result of `system_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// OS family (`unix`, `windows`).
    pub family: String,
    /// Operating system name.
    pub os: String,
    /// CPU architecture.
    pub arch: String,
    /// Working directory of the peer.
    pub current_dir: String,
    /// Path separator.
    pub main_separator: String,
}

/// Kind of a filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Entry was read.
    Access,
    /// Entry was created.
    Create,
    /// Entry was removed.
    Delete,
    /// Entry content or metadata changed.
    Modify,
    /// Entry was renamed.
    Rename,
    /// Any kind this client does not know.
    #[serde(other)]
    Unknown,
}

/// A change reported for a watched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// The watched path the change belongs to.
    pub path: String,
    /// What happened.
    pub kind: ChangeKind,
    /// Paths affected by the change.
    pub paths: Vec<String>,
}

/// Collected result of `spawn_wait`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Terminal status reported by the peer.
    pub status: String,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i64>,
    /// All stdout chunks, in order.
    pub stdout: Vec<String>,
    /// All stderr chunks, in order.
    pub stderr: Vec<String>,
}

impl ProcessOutput {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Parameters of `metadata`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    path: String,
    canonicalize: Option<bool>,
    resolve_file_type: Option<bool>,
}

impl MetadataRequest {
    /// Describe `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            canonicalize: None,
            resolve_file_type: None,
        }
    }

    /// Report the canonical path as well.
    pub fn canonicalize(mut self, canonicalize: bool) -> Self {
        self.canonicalize = Some(canonicalize);
        self
    }

    /// Follow symlinks when reporting the file type.
    pub fn resolve_file_type(mut self, resolve: bool) -> Self {
        self.resolve_file_type = Some(resolve);
        self
    }

    /// Build the wire message.
    pub fn to_message(&self) -> OutgoingMessage {
        OutgoingMessage::new(request::METADATA)
            .with("path", self.path.as_str())
            .with_opt("canonicalize", self.canonicalize)
            .with_opt("resolve_file_type", self.resolve_file_type)
    }
}

/// Parameters of `read-dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadDirRequest {
    path: String,
    depth: Option<u32>,
    absolute: Option<bool>,
    canonicalize: Option<bool>,
    include_root: Option<bool>,
}

impl ReadDirRequest {
    /// List `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            depth: None,
            absolute: None,
            canonicalize: None,
            include_root: None,
        }
    }

    /// Descend this many levels; 0 means unlimited.
    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Report absolute paths.
    pub fn absolute(mut self, absolute: bool) -> Self {
        self.absolute = Some(absolute);
        self
    }

    /// Report canonical paths.
    pub fn canonicalize(mut self, canonicalize: bool) -> Self {
        self.canonicalize = Some(canonicalize);
        self
    }

    /// Include `path` itself as the first entry.
    pub fn include_root(mut self, include_root: bool) -> Self {
        self.include_root = Some(include_root);
        self
    }

    /// Build the wire message.
    pub fn to_message(&self) -> OutgoingMessage {
        OutgoingMessage::new(request::READ_DIR)
            .with("path", self.path.as_str())
            .with_opt("depth", self.depth)
            .with_opt("absolute", self.absolute)
            .with_opt("canonicalize", self.canonicalize)
            .with_opt("include_root", self.include_root)
    }
}

/// Terminal size for a pty-backed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtySize {
    /// Rows.
    pub rows: u16,
    /// Columns.
    pub cols: u16,
}

/// Parameters of `spawn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    cmd: String,
    args: Vec<String>,
    persist: Option<bool>,
    pty: Option<PtySize>,
}

impl SpawnRequest {
    /// Run `cmd` with no arguments.
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            args: Vec::new(),
            persist: None,
            pty: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Keep the process alive when the connection drops.
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = Some(persist);
        self
    }

    /// Run inside a pseudo terminal.
    pub fn pty(mut self, size: PtySize) -> Self {
        self.pty = Some(size);
        self
    }

    /// Build the wire message.
    pub fn to_message(&self) -> OutgoingMessage {
        let pty = self
            .pty
            .map(|p| serde_json::json!({ "rows": p.rows, "cols": p.cols }));
        OutgoingMessage::new(request::SPAWN)
            .with("cmd", self.cmd.as_str())
            .with("args", self.args.clone())
            .with_opt("persist", self.persist)
            .with_opt("pty", pty)
    }
}

/// Parameters of `watch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRequest {
    path: String,
    recursive: Option<bool>,
    only: Vec<ChangeKind>,
    except: Vec<ChangeKind>,
}

impl WatchRequest {
    /// Watch `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            recursive: None,
            only: Vec::new(),
            except: Vec::new(),
        }
    }

    /// Watch subdirectories too.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = Some(recursive);
        self
    }

    /// Report only these change kinds.
    pub fn only(mut self, kinds: impl IntoIterator<Item = ChangeKind>) -> Self {
        self.only.extend(kinds);
        self
    }

    /// Never report these change kinds.
    pub fn except(mut self, kinds: impl IntoIterator<Item = ChangeKind>) -> Self {
        self.except.extend(kinds);
        self
    }

    /// Watched path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Build the wire message.
    pub fn to_message(&self) -> OutgoingMessage {
        let kinds = |kinds: &[ChangeKind]| {
            (!kinds.is_empty()).then(|| serde_json::to_value(kinds).unwrap_or_default())
        };
        OutgoingMessage::new(request::WATCH)
            .with("path", self.path.as_str())
            .with_opt("recursive", self.recursive)
            .with_opt("only", kinds(&self.only))
            .with_opt("except", kinds(&self.except))
    }
}
