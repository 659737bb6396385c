//! SFTP Error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SftpError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("SFTP subsystem error: {0}")]
    SubsystemError(String),

    /// Remote SFTP status errors (permission denied, no such file, ...)
    /// propagated verbatim, never retried.
    #[error("Remote IO error: {0}")]
    RemoteIo(String),

    #[error("File too large: {size} bytes (max {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Write error: {0}")]
    WriteError(String),

    #[error("Transfer cancelled")]
    TransferCancelled,
}

impl From<russh_sftp::client::error::Error> for SftpError {
    fn from(err: russh_sftp::client::error::Error) -> Self {
        SftpError::RemoteIo(err.to_string())
    }
}

// String form so an IPC layer can forward errors without a schema
impl serde::Serialize for SftpError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
