//! Session lifecycle management
//!
//! One logical session = one authenticated transport + one interactive
//! shell channel + (lazily) one SFTP subsystem handle, keyed by a
//! caller-supplied opaque id.

pub mod registry;
pub mod shell;

pub use registry::SessionRegistry;
pub use shell::SessionCommand;
