//! Top-level facade
//!
//! One [`Engine`] owns the session registry, the SFTP operation surface,
//! and the transfer engine, and fans every asynchronous occurrence out
//! through a single event stream handed back at construction.

use std::sync::Arc;

use tracing::info;

use crate::events::{EngineEvent, EventSender};
use crate::session::SessionRegistry;
use crate::sftp::{
    build_tree, delete_recursive, FileEntry, SftpError, SftpOps, TransferEngine, TransferState,
    TreeNode,
};
use crate::ssh::{tester, HostDescriptor, SshError, TestOutcome};
use crate::store::HostStore;

pub struct Engine {
    registry: SessionRegistry,
    ops: SftpOps,
    transfers: TransferEngine,
    store: Arc<dyn HostStore>,
}

impl Engine {
    /// Build an engine and hand back the receiving end of its event stream.
    /// Terminal output, session closures, and transfer progress all arrive
    /// on that one channel.
    pub fn new(
        store: Arc<dyn HostStore>,
    ) -> (Self, tokio::sync::mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, rx) = EventSender::channel();
        let registry = SessionRegistry::new(events.clone());
        let ops = SftpOps::new(registry.clone());
        let transfers = TransferEngine::new(ops.clone(), events);

        (
            Self {
                registry,
                ops,
                transfers,
                store,
            },
            rx,
        )
    }

    // ---- sessions ----

    /// Connect to a host described inline and register the session under
    /// `session_id`. Fails with `SessionExists` if the id is taken.
    pub async fn connect(
        &self,
        session_id: &str,
        host: &HostDescriptor,
    ) -> Result<(), SshError> {
        self.registry.connect(session_id, host).await
    }

    /// Connect to a stored host by id, recording the connection time on
    /// success.
    pub async fn connect_host(&self, session_id: &str, host_id: &str) -> Result<(), SshError> {
        let host = self
            .store
            .get_host(host_id)
            .await
            .ok_or_else(|| SshError::HostNotFound(host_id.to_string()))?;

        self.registry.connect(session_id, &host).await?;
        self.store.update_last_connected(host_id).await;
        info!("Session {} connected to stored host {}", session_id, host_id);
        Ok(())
    }

    /// Feed keyboard input to a session's shell. A no-op for unknown ids.
    pub async fn input(&self, session_id: &str, data: Vec<u8>) {
        self.registry.write(session_id, data).await;
    }

    /// Propagate a terminal resize to the remote PTY.
    pub async fn resize(&self, session_id: &str, cols: u16, rows: u16) {
        self.registry.resize(session_id, cols, rows).await;
    }

    /// Tear down a session. Idempotent.
    pub async fn disconnect(&self, session_id: &str) {
        self.registry.disconnect(session_id).await;
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.registry.contains(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Probe a host's reachability and authentication without registering
    /// anything. Always resolves within the test timeout.
    pub async fn test(&self, host: &HostDescriptor) -> TestOutcome {
        tester::test(host).await
    }

    // ---- remote filesystem ----

    pub async fn real_path(&self, session_id: &str, path: &str) -> Result<String, SftpError> {
        self.ops.real_path(session_id, path).await
    }

    pub async fn list(&self, session_id: &str, path: &str) -> Result<Vec<FileEntry>, SftpError> {
        self.ops.list(session_id, path).await
    }

    pub async fn stat(&self, session_id: &str, path: &str) -> Result<FileEntry, SftpError> {
        self.ops.stat(session_id, path).await
    }

    pub async fn get_file(&self, session_id: &str, path: &str) -> Result<Vec<u8>, SftpError> {
        self.ops.read_file(session_id, path).await
    }

    pub async fn put_file(
        &self,
        session_id: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), SftpError> {
        self.ops.write_file(session_id, path, content).await
    }

    pub async fn mkdir(&self, session_id: &str, path: &str) -> Result<(), SftpError> {
        self.ops.mkdir(session_id, path).await
    }

    pub async fn rename(
        &self,
        session_id: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<(), SftpError> {
        self.ops.rename(session_id, old_path, new_path).await
    }

    pub async fn move_item(
        &self,
        session_id: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<(), SftpError> {
        self.ops.move_item(session_id, old_path, new_path).await
    }

    pub async fn delete(&self, session_id: &str, path: &str) -> Result<(), SftpError> {
        self.ops.delete(session_id, path).await
    }

    pub async fn delete_recursive(&self, session_id: &str, path: &str) -> Result<(), SftpError> {
        delete_recursive(&self.ops.fs_for(session_id), path).await
    }

    pub async fn tree(
        &self,
        session_id: &str,
        root: &str,
        max_depth: u32,
    ) -> Result<Vec<TreeNode>, SftpError> {
        build_tree(&self.ops.fs_for(session_id), root, max_depth).await
    }

    // ---- transfers ----

    pub async fn upload(
        &self,
        session_id: &str,
        transfer_id: &str,
        local_path: &str,
        remote_path: &str,
    ) -> Result<(), SftpError> {
        self.transfers
            .upload(session_id, transfer_id, local_path, remote_path)
            .await
    }

    pub async fn download(
        &self,
        session_id: &str,
        transfer_id: &str,
        remote_path: &str,
        local_path: &str,
    ) -> Result<(), SftpError> {
        self.transfers
            .download(session_id, transfer_id, remote_path, local_path)
            .await
    }

    pub fn pause_transfer(&self, transfer_id: &str) -> bool {
        self.transfers.pause(transfer_id)
    }

    pub fn resume_transfer(&self, transfer_id: &str) -> bool {
        self.transfers.resume(transfer_id)
    }

    pub fn cancel_transfer(&self, transfer_id: &str) -> bool {
        self.transfers.cancel(transfer_id)
    }

    pub fn transfer_state(&self, transfer_id: &str) -> Option<TransferState> {
        self.transfers.state(transfer_id)
    }

    pub fn transfer_progress(&self, transfer_id: &str) -> Option<(u64, Option<u64>)> {
        self.transfers.progress(transfer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NullHostStore;

    fn engine() -> Engine {
        let (engine, _rx) = Engine::new(Arc::new(NullHostStore));
        engine
    }

    #[tokio::test]
    async fn connect_host_fails_for_unknown_host_id() {
        let engine = engine();
        let err = engine.connect_host("s1", "nope").await.unwrap_err();
        assert!(matches!(err, SshError::HostNotFound(_)));
        assert!(!engine.has_session("s1"));
    }

    #[tokio::test]
    async fn sftp_operations_on_unknown_session_fail() {
        let engine = engine();

        let err = engine.list("ghost", "/").await.unwrap_err();
        assert!(matches!(err, SftpError::SessionNotFound(_)));

        let err = engine.tree("ghost", "/", 2).await.unwrap_err();
        assert!(matches!(err, SftpError::SessionNotFound(_)));

        let err = engine.delete_recursive("ghost", "/tmp/x").await.unwrap_err();
        assert!(matches!(err, SftpError::SessionNotFound(_)));

        let err = engine
            .upload("ghost", "t1", "/tmp/in", "/tmp/out")
            .await
            .unwrap_err();
        assert!(matches!(err, SftpError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn transfer_controls_return_false_for_unknown_ids() {
        let engine = engine();
        assert!(!engine.pause_transfer("ghost"));
        assert!(!engine.resume_transfer("ghost"));
        assert!(!engine.cancel_transfer("ghost"));
        assert_eq!(engine.transfer_state("ghost"), None);
    }

    #[tokio::test]
    async fn shell_operations_on_unknown_session_are_noops() {
        let engine = engine();
        engine.input("ghost", b"ls\n".to_vec()).await;
        engine.resize("ghost", 120, 40).await;
        engine.disconnect("ghost").await;
        assert_eq!(engine.session_count(), 0);
    }
}
