//! SSH transport layer
//!
//! Wraps russh with the pieces the engine needs: connect + authenticate,
//! single-owner handle management, and the one-shot connection tester.

pub mod client;
pub mod config;
pub mod error;
pub mod handle_owner;
pub mod tester;

pub use client::SshClient;
pub use config::{AuthMethod, HostDescriptor};
pub use error::SshError;
pub use handle_owner::{spawn_handle_owner_task, HandleController};
pub use tester::{test, TestOutcome};
