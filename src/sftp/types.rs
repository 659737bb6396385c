//! SFTP data types

use serde::{Deserialize, Serialize};

/// File entry information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// File name (not full path)
    pub name: String,
    /// Absolute remote path
    pub path: String,
    /// File type
    pub file_type: FileType,
    /// File size in bytes
    pub size: u64,
    /// Last modified time (Unix timestamp, seconds)
    pub mtime: u64,
    /// Last access time (Unix timestamp, seconds)
    pub atime: u64,
    /// Permission bits
    pub mode: u32,
}

impl FileEntry {
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }
}

/// File type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Directory,
    Symlink,
    Unknown,
}

/// Node of a bounded-depth directory tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub file_type: FileType,
    pub size: u64,
    pub mtime: u64,
    pub mode: u32,
    /// Present only for directories listed below the depth ceiling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    pub fn from_entry(entry: FileEntry, children: Option<Vec<TreeNode>>) -> Self {
        Self {
            name: entry.name,
            path: entry.path,
            file_type: entry.file_type,
            size: entry.size,
            mtime: entry.mtime,
            mode: entry.mode,
            children,
        }
    }
}

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Upload,
    Download,
}

/// Transfer state
///
/// `Pending → Running → {Completed, Failed, Cancelled}` with
/// `Running ⇄ Paused`. Terminal states freeze the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Failed | TransferState::Cancelled
        )
    }
}

/// Constants for SFTP operations
pub mod constants {
    /// Ceiling for whole-file reads (10 MiB); larger files must stream
    pub const MAX_READ_SIZE: u64 = 10 * 1024 * 1024;

    /// Chunk size for streaming transfers (64 KB)
    pub const TRANSFER_CHUNK_SIZE: usize = 64 * 1024;

    /// Poll interval while a transfer is paused
    pub const PAUSE_POLL_MS: u64 = 100;
}
