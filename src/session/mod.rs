//! Streaming sessions built on top of operations.
//!
//! - [`process`] - spawned processes: buffered output, exit status, stdin
//! - [`watch`] - per-path change subscriptions

pub mod process;
pub mod watch;

pub use process::{ProcessEvent, ProcessHandle};
pub use watch::{WatchEvent, WatchSignal};

pub(crate) use process::{spawn_descriptor, ProcessRegistry, ProcessRouter};
pub(crate) use watch::{watch_descriptor, WatchRegistry, WatchRouter};
