//! ferrosh - Remote SSH session and SFTP transfer engine
//!
//! Establishes and multiplexes SSH transport sessions (interactive shell +
//! SFTP subsystem) over a single authenticated connection per logical
//! session, streams terminal I/O bidirectionally, and performs file-transfer
//! and filesystem operations with progress reporting and pause/resume/cancel
//! control.
//!
//! The crate is an engine, not an application: callers drive it through
//! [`Engine`] and drain the [`EngineEvent`] stream handed out at
//! construction. No UI, IPC framing, or credential persistence lives here.

pub mod engine;
pub mod events;
pub mod session;
pub mod sftp;
pub mod ssh;
pub mod store;

pub use engine::Engine;
pub use events::{EngineEvent, EventSender, TransferProgressEvent};
pub use session::SessionRegistry;
pub use sftp::{SftpError, SftpOps, TransferEngine};
pub use ssh::{AuthMethod, HostDescriptor, SshError, TestOutcome};
pub use store::{HostStore, NullHostStore};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging
///
/// Respects `RUST_LOG`; defaults to `info`. Call once from the embedding
/// application, never from library code.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
