//! Bounded-depth directory tree and recursive delete
//!
//! Both walks run over the [`RemoteFs`] trait rather than a concrete SFTP
//! handle so traversal order and failure behavior can be tested against an
//! in-memory filesystem.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use tracing::{debug, info};

use super::error::SftpError;
use super::types::{FileEntry, TreeNode};

/// Minimal remote filesystem surface the walks need
#[async_trait]
pub trait RemoteFs: Sync {
    async fn list(&self, path: &str) -> Result<Vec<FileEntry>, SftpError>;
    async fn remove_file(&self, path: &str) -> Result<(), SftpError>;
    async fn remove_dir(&self, path: &str) -> Result<(), SftpError>;
}

/// Build a directory tree rooted at `root`, descending at most `max_depth`
/// levels. Directories sitting at the ceiling are reported without children
/// (`children: None`) so callers can tell "not descended" from "empty".
/// `.` and `..` entries are skipped.
pub async fn build_tree<F: RemoteFs + Send>(
    fs: &F,
    root: &str,
    max_depth: u32,
) -> Result<Vec<TreeNode>, SftpError> {
    debug!("Building tree at {} (max depth {})", root, max_depth);
    let nodes = walk(fs, root, 1, max_depth).await?;
    debug!("Tree at {} has {} top-level entries", root, nodes.len());
    Ok(nodes)
}

fn walk<'a, F: RemoteFs>(
    fs: &'a F,
    path: &'a str,
    depth: u32,
    max_depth: u32,
) -> Pin<Box<dyn Future<Output = Result<Vec<TreeNode>, SftpError>> + Send + 'a>>
where
    F: Send,
{
    Box::pin(async move {
        let entries = fs.list(path).await?;

        let mut nodes = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.name == "." || entry.name == ".." {
                continue;
            }

            let children = if entry.is_dir() && depth < max_depth {
                Some(walk(fs, &entry.path, depth + 1, max_depth).await?)
            } else {
                None
            };

            nodes.push(TreeNode::from_entry(entry, children));
        }

        Ok(nodes)
    })
}

/// Delete `path` and everything under it, depth-first.
///
/// Children are removed before their parent; the first failure aborts the
/// walk, leaving later siblings and every ancestor in place.
pub async fn delete_recursive<F: RemoteFs + Send>(fs: &F, path: &str) -> Result<(), SftpError> {
    info!("Recursively deleting {}", path);
    delete_dir_contents(fs, path).await?;
    fs.remove_dir(path).await
}

fn delete_dir_contents<'a, F: RemoteFs + Send>(
    fs: &'a F,
    path: &'a str,
) -> Pin<Box<dyn Future<Output = Result<(), SftpError>> + Send + 'a>> {
    Box::pin(async move {
        let entries = fs.list(path).await?;

        for entry in entries {
            if entry.name == "." || entry.name == ".." {
                continue;
            }

            if entry.is_dir() {
                delete_dir_contents(fs, &entry.path).await?;
                fs.remove_dir(&entry.path).await?;
            } else {
                fs.remove_file(&entry.path).await?;
            }
        }

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp::types::FileType;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    /// In-memory filesystem: path → (is_dir, child names)
    struct MockFs {
        dirs: Mutex<BTreeMap<String, Vec<FileEntry>>>,
        removed: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl MockFs {
        fn new() -> Self {
            Self {
                dirs: Mutex::new(BTreeMap::new()),
                removed: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn dir(mut self, path: &str, entries: Vec<FileEntry>) -> Self {
            self.dirs.get_mut().insert(path.to_string(), entries);
            self
        }

        fn fail_on(mut self, path: &str) -> Self {
            self.fail_on = Some(path.to_string());
            self
        }
    }

    fn file(name: &str, parent: &str, size: u64) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            path: format!("{}/{}", parent.trim_end_matches('/'), name),
            file_type: FileType::File,
            size,
            mtime: 0,
            atime: 0,
            mode: 0o644,
        }
    }

    fn dir(name: &str, parent: &str) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            path: format!("{}/{}", parent.trim_end_matches('/'), name),
            file_type: FileType::Directory,
            size: 0,
            mtime: 0,
            atime: 0,
            mode: 0o755,
        }
    }

    fn dot(name: &str) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            path: name.to_string(),
            file_type: FileType::Directory,
            size: 0,
            mtime: 0,
            atime: 0,
            mode: 0o755,
        }
    }

    #[async_trait]
    impl RemoteFs for MockFs {
        async fn list(&self, path: &str) -> Result<Vec<FileEntry>, SftpError> {
            self.dirs
                .lock()
                .get(path)
                .cloned()
                .ok_or_else(|| SftpError::RemoteIo(format!("no such directory: {}", path)))
        }

        async fn remove_file(&self, path: &str) -> Result<(), SftpError> {
            if self.fail_on.as_deref() == Some(path) {
                return Err(SftpError::RemoteIo(format!("permission denied: {}", path)));
            }
            self.removed.lock().push(path.to_string());
            Ok(())
        }

        async fn remove_dir(&self, path: &str) -> Result<(), SftpError> {
            if self.fail_on.as_deref() == Some(path) {
                return Err(SftpError::RemoteIo(format!("permission denied: {}", path)));
            }
            self.removed.lock().push(path.to_string());
            Ok(())
        }
    }

    fn fixture() -> MockFs {
        // /a contains file f and directory b; /a/b contains file g
        MockFs::new()
            .dir(
                "/a",
                vec![
                    dot("."),
                    dot(".."),
                    file("f", "/a", 5),
                    dir("b", "/a"),
                ],
            )
            .dir("/a/b", vec![dot("."), dot(".."), file("g", "/a/b", 7)])
    }

    #[tokio::test]
    async fn tree_depth_one_lists_without_descending() {
        let fs = fixture();
        let nodes = build_tree(&fs, "/a", 1).await.unwrap();

        assert_eq!(nodes.len(), 2);
        let b = nodes.iter().find(|n| n.name == "b").unwrap();
        assert!(b.children.is_none());
    }

    #[tokio::test]
    async fn tree_depth_two_descends_into_subdirectory() {
        let fs = fixture();
        let nodes = build_tree(&fs, "/a", 2).await.unwrap();

        let b = nodes.iter().find(|n| n.name == "b").unwrap();
        let children = b.children.as_ref().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "g");
        assert!(children[0].children.is_none());
    }

    #[tokio::test]
    async fn tree_skips_dot_entries() {
        let fs = fixture();
        let nodes = build_tree(&fs, "/a", 2).await.unwrap();
        assert!(nodes.iter().all(|n| n.name != "." && n.name != ".."));
    }

    #[tokio::test]
    async fn tree_list_failure_propagates() {
        let fs = MockFs::new();
        let err = build_tree(&fs, "/missing", 1).await.unwrap_err();
        assert!(matches!(err, SftpError::RemoteIo(_)));
    }

    #[tokio::test]
    async fn recursive_delete_removes_children_before_parent() {
        let fs = fixture();
        delete_recursive(&fs, "/a").await.unwrap();

        let removed = fs.removed.lock().clone();
        assert_eq!(removed, vec!["/a/f", "/a/b/g", "/a/b", "/a"]);
    }

    #[tokio::test]
    async fn recursive_delete_aborts_on_first_failure() {
        // g cannot be removed; b and a must both survive
        let fs = fixture().fail_on("/a/b/g");
        let err = delete_recursive(&fs, "/a").await.unwrap_err();
        assert!(matches!(err, SftpError::RemoteIo(_)));

        let removed = fs.removed.lock().clone();
        assert!(!removed.contains(&"/a/b".to_string()));
        assert!(!removed.contains(&"/a".to_string()));
    }
}
