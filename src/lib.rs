//! Interactive Console - embeddable line editor and command shell
//!
//! Features:
//! - Line editing with history (arrow keys)
//! - Filesystem completion on double Tab
//! - Quote-aware command tokenizer
//! - Pluggable tasks with case-insensitive dispatch
//! - Ctrl+C routed to the running task or ending the session

pub mod config;
pub mod interrupt;
pub mod logging;
pub mod shell;
pub mod task;

pub use config::ConsoleConfig;
pub use shell::{ExitReason, Session};
pub use task::{ArgumentError, Dispatch, Registry, RegistryError, Task, TaskContext, TaskDescriptor};
