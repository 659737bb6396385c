//! SFTP operation surface
//!
//! Filesystem operations, bounded-depth tree traversal, recursive delete,
//! and the streaming transfer engine, all running over a session's
//! lazily-created SFTP subsystem handle.

pub mod error;
pub mod path_utils;
pub mod session;
pub mod transfer;
pub mod tree;
pub mod types;

pub use error::SftpError;
pub use session::SftpOps;
pub use transfer::{TransferControl, TransferEngine};
pub use tree::{build_tree, delete_recursive, RemoteFs};
pub use types::*;
