//! SFTP operations over a session's subsystem handle
//!
//! The per-session SFTP handle is created on first use and memoized in the
//! session's registry entry; every later operation on that session reuses
//! it, so the subsystem is negotiated at most once per session. Operations
//! against an unregistered session id fail with `SessionNotFound`.

use std::sync::Arc;

use async_trait::async_trait;
use russh_sftp::client::SftpSession as RawSftpSession;
use russh_sftp::protocol::FileAttributes;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::error::SftpError;
use super::path_utils::remote_file_name;
use super::tree::RemoteFs;
use super::types::{constants, FileEntry, FileType};
use crate::session::SessionRegistry;

/// Stateless SFTP operation set, bound to the session registry
#[derive(Clone)]
pub struct SftpOps {
    registry: SessionRegistry,
}

impl SftpOps {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    /// Get the memoized SFTP handle for a session, creating it on first use.
    ///
    /// The slot's async mutex serializes concurrent first use: the loser of
    /// the race finds the handle already present and reuses it.
    pub(crate) async fn handle(&self, session_id: &str) -> Result<Arc<RawSftpSession>, SftpError> {
        let (controller, slot) = self
            .registry
            .transport_parts(session_id)
            .ok_or_else(|| SftpError::SessionNotFound(session_id.to_string()))?;

        let mut guard = slot.lock().await;
        if let Some(sftp) = guard.as_ref() {
            return Ok(sftp.clone());
        }

        info!("Opening SFTP subsystem for session {}", session_id);

        let channel = controller
            .open_session_channel()
            .await
            .map_err(|e| SftpError::ChannelError(e.to_string()))?;

        channel.request_subsystem(true, "sftp").await.map_err(|e| {
            SftpError::SubsystemError(format!("Failed to request SFTP subsystem: {}", e))
        })?;

        let sftp = RawSftpSession::new(channel.into_stream())
            .await
            .map_err(|e| SftpError::SubsystemError(e.to_string()))?;

        let sftp = Arc::new(sftp);
        *guard = Some(sftp.clone());

        info!("SFTP subsystem opened for session {}", session_id);
        Ok(sftp)
    }

    /// Canonicalized absolute path
    pub async fn real_path(&self, session_id: &str, path: &str) -> Result<String, SftpError> {
        let sftp = self.handle(session_id).await?;
        Ok(sftp.canonicalize(path).await?)
    }

    /// List directory contents in remote order. `.` and `..` are included;
    /// tree traversal and recursive delete skip them, raw listing does not.
    pub async fn list(&self, session_id: &str, path: &str) -> Result<Vec<FileEntry>, SftpError> {
        let sftp = self.handle(session_id).await?;
        debug!("Listing directory: {}", path);

        let read_dir = sftp.read_dir(path).await?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let name = entry.file_name();
            let full_path = super::path_utils::join_remote_path(path, &name);
            entries.push(entry_from_attrs(name, full_path, &entry.metadata()));
        }

        debug!("Listed {} entries in {}", entries.len(), path);
        Ok(entries)
    }

    /// File metadata: size, mode, mtime, atime, type
    pub async fn stat(&self, session_id: &str, path: &str) -> Result<FileEntry, SftpError> {
        let sftp = self.handle(session_id).await?;
        let metadata = sftp.metadata(path).await?;
        let name = remote_file_name(path).to_string();
        Ok(entry_from_attrs(name, path.to_string(), &metadata))
    }

    /// Read a whole remote file into memory.
    ///
    /// Checked against the 10 MiB ceiling via `stat` before the read begins
    /// so an oversized file never gets buffered; callers stream larger
    /// files through the transfer engine instead.
    pub async fn read_file(&self, session_id: &str, path: &str) -> Result<Vec<u8>, SftpError> {
        let info = self.stat(session_id, path).await?;
        check_read_size(info.size)?;

        let sftp = self.handle(session_id).await?;
        Ok(sftp.read(path).await?)
    }

    /// Create or truncate `path` and write `content` to it
    pub async fn write_file(
        &self,
        session_id: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), SftpError> {
        let sftp = self.handle(session_id).await?;
        let mut file = sftp.create(path).await?;
        file.write_all(content)
            .await
            .map_err(|e| SftpError::WriteError(format!("Failed to write content: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| SftpError::WriteError(format!("Failed to flush file: {}", e)))?;
        info!("Wrote {} bytes to {}", content.len(), path);
        Ok(())
    }

    pub async fn mkdir(&self, session_id: &str, path: &str) -> Result<(), SftpError> {
        let sftp = self.handle(session_id).await?;
        Ok(sftp.create_dir(path).await?)
    }

    pub async fn rename(
        &self,
        session_id: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<(), SftpError> {
        let sftp = self.handle(session_id).await?;
        Ok(sftp.rename(old_path, new_path).await?)
    }

    /// Move is rename; SFTP has no distinct primitive for it.
    pub async fn move_item(
        &self,
        session_id: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<(), SftpError> {
        self.rename(session_id, old_path, new_path).await
    }

    /// Single-file unlink
    pub async fn delete(&self, session_id: &str, path: &str) -> Result<(), SftpError> {
        let sftp = self.handle(session_id).await?;
        Ok(sftp.remove_file(path).await?)
    }

    /// Remove an (empty) directory
    pub async fn remove_dir(&self, session_id: &str, path: &str) -> Result<(), SftpError> {
        let sftp = self.handle(session_id).await?;
        Ok(sftp.remove_dir(path).await?)
    }

    /// Bind the operation set to one session for traversal
    pub fn fs_for<'a>(&'a self, session_id: &'a str) -> SessionFs<'a> {
        SessionFs {
            ops: self,
            session_id,
        }
    }
}

/// [`RemoteFs`] view of one session's filesystem
pub struct SessionFs<'a> {
    ops: &'a SftpOps,
    session_id: &'a str,
}

#[async_trait]
impl RemoteFs for SessionFs<'_> {
    async fn list(&self, path: &str) -> Result<Vec<FileEntry>, SftpError> {
        self.ops.list(self.session_id, path).await
    }

    async fn remove_file(&self, path: &str) -> Result<(), SftpError> {
        self.ops.delete(self.session_id, path).await
    }

    async fn remove_dir(&self, path: &str) -> Result<(), SftpError> {
        self.ops.remove_dir(self.session_id, path).await
    }
}

/// Reject whole-file reads above the ceiling before any bytes are buffered.
/// A file of exactly the ceiling size is allowed.
fn check_read_size(size: u64) -> Result<(), SftpError> {
    if size > constants::MAX_READ_SIZE {
        return Err(SftpError::FileTooLarge {
            size,
            max: constants::MAX_READ_SIZE,
        });
    }
    Ok(())
}

fn entry_from_attrs(name: String, path: String, metadata: &FileAttributes) -> FileEntry {
    let file_type = if metadata.is_dir() {
        FileType::Directory
    } else if metadata.is_symlink() {
        FileType::Symlink
    } else if metadata.is_regular() {
        FileType::File
    } else {
        FileType::Unknown
    };

    FileEntry {
        name,
        path,
        file_type,
        size: metadata.size.unwrap_or(0),
        mtime: metadata.mtime.unwrap_or(0) as u64,
        atime: metadata.atime.unwrap_or(0) as u64,
        mode: metadata.permissions.unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSender;

    fn ops() -> SftpOps {
        let (events, _rx) = EventSender::channel();
        SftpOps::new(SessionRegistry::new(events))
    }

    #[tokio::test]
    async fn operations_on_unknown_session_fail_with_session_not_found() {
        let ops = ops();

        let err = ops.list("ghost", "/").await.unwrap_err();
        assert!(matches!(err, SftpError::SessionNotFound(_)));

        let err = ops.stat("ghost", "/etc/passwd").await.unwrap_err();
        assert!(matches!(err, SftpError::SessionNotFound(_)));

        let err = ops.read_file("ghost", "/etc/passwd").await.unwrap_err();
        assert!(matches!(err, SftpError::SessionNotFound(_)));

        let err = ops.write_file("ghost", "/tmp/x", b"hi").await.unwrap_err();
        assert!(matches!(err, SftpError::SessionNotFound(_)));

        let err = ops.mkdir("ghost", "/tmp/d").await.unwrap_err();
        assert!(matches!(err, SftpError::SessionNotFound(_)));

        let err = ops.rename("ghost", "/a", "/b").await.unwrap_err();
        assert!(matches!(err, SftpError::SessionNotFound(_)));

        let err = ops.delete("ghost", "/a").await.unwrap_err();
        assert!(matches!(err, SftpError::SessionNotFound(_)));

        let err = ops.real_path("ghost", ".").await.unwrap_err();
        assert!(matches!(err, SftpError::SessionNotFound(_)));
    }

    #[test]
    fn read_size_ceiling_is_inclusive() {
        assert!(check_read_size(0).is_ok());
        assert!(check_read_size(constants::MAX_READ_SIZE).is_ok());
    }

    #[test]
    fn read_size_over_ceiling_is_rejected() {
        let err = check_read_size(constants::MAX_READ_SIZE + 1).unwrap_err();
        match err {
            SftpError::FileTooLarge { size, max } => {
                assert_eq!(size, constants::MAX_READ_SIZE + 1);
                assert_eq!(max, constants::MAX_READ_SIZE);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
