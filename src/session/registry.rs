//! Session registry
//!
//! Owns the map from session id to live connection state: the shell task's
//! command channel, the transport controller, and the lazily-initialized
//! SFTP handle slot. The map is the only shared mutable state in the
//! engine; DashMap keeps insert/remove atomic with respect to in-flight
//! lookups, so an operation against a removed session observes absence and
//! fails with a not-found error rather than touching a stale handle.

use std::sync::Arc;

use dashmap::DashMap;
use russh_sftp::client::SftpSession as RawSftpSession;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::shell::{spawn_shell_task, SessionCommand};
use crate::events::EventSender;
use crate::ssh::{spawn_handle_owner_task, HandleController, HostDescriptor, SshClient, SshError};

/// Memoized SFTP handle slot: `None` until the first SFTP operation.
/// The async mutex serializes first use so concurrent callers never open
/// two subsystem channels for one session.
pub(crate) type SftpSlot = Arc<tokio::sync::Mutex<Option<Arc<RawSftpSession>>>>;

/// Live state for one registered session
pub(crate) struct SessionEntry {
    pub cmd_tx: mpsc::Sender<SessionCommand>,
    pub controller: HandleController,
    pub sftp: SftpSlot,
}

pub(crate) struct RegistryInner {
    pub sessions: DashMap<String, SessionEntry>,
    pub events: EventSender,
}

/// Registry of live sessions, cheap to clone
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(events: EventSender) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: DashMap::new(),
                events,
            }),
        }
    }

    /// Open a transport + interactive shell for `session_id`.
    ///
    /// Nothing is registered until every step (connect, auth, channel, PTY,
    /// shell) has succeeded; any failure tears the transport down. A second
    /// connect for a live id fails with `SessionExists`.
    pub async fn connect(&self, session_id: &str, host: &HostDescriptor) -> Result<(), SshError> {
        if self.inner.sessions.contains_key(session_id) {
            return Err(SshError::SessionExists(session_id.to_string()));
        }

        let handle = SshClient::new(host.clone()).connect().await?;
        let controller = spawn_handle_owner_task(handle, session_id.to_string());

        let channel = match controller.open_session_channel().await {
            Ok(c) => c,
            Err(e) => {
                controller.disconnect().await;
                return Err(e);
            }
        };

        if let Err(e) = channel
            .request_pty(false, "xterm-256color", host.cols, host.rows, 0, 0, &[])
            .await
        {
            controller.disconnect().await;
            return Err(SshError::ChannelError(format!("PTY request failed: {}", e)));
        }

        if let Err(e) = channel.request_shell(false).await {
            controller.disconnect().await;
            return Err(SshError::ChannelError(format!(
                "Shell request failed: {}",
                e
            )));
        }

        let (cmd_tx, cmd_rx) = mpsc::channel::<SessionCommand>(1024);

        let entry = SessionEntry {
            cmd_tx,
            controller: controller.clone(),
            sftp: Arc::new(tokio::sync::Mutex::new(None)),
        };

        // Re-check at insert time: a racing connect for the same id may have
        // won while we were dialing.
        let clashed = match self.inner.sessions.entry(session_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => true,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(entry);
                false
            }
        };
        if clashed {
            controller.disconnect().await;
            return Err(SshError::SessionExists(session_id.to_string()));
        }

        spawn_shell_task(
            channel,
            session_id.to_string(),
            cmd_rx,
            controller,
            self.inner.clone(),
        );

        info!(
            "Session {} connected: {}@{}:{}",
            session_id, host.username, host.host, host.port
        );
        Ok(())
    }

    /// Close the shell and transport and drop the entry. Idempotent: an
    /// unknown id is a no-op.
    pub async fn disconnect(&self, session_id: &str) {
        if let Some((_, entry)) = self.inner.sessions.remove(session_id) {
            info!("Disconnecting session {}", session_id);
            // The shell task emits the single Closed event on its way out.
            if entry.cmd_tx.send(SessionCommand::Close).await.is_err() {
                // Relay already gone; make sure the transport dies too.
                entry.controller.disconnect().await;
            }
        } else {
            debug!("disconnect: session {} not registered, ignoring", session_id);
        }
    }

    /// Forward raw input bytes to the session's shell. Best-effort: unknown
    /// or already-closed sessions are a no-op, never an error.
    pub async fn write(&self, session_id: &str, data: Vec<u8>) {
        let tx = match self.inner.sessions.get(session_id) {
            Some(entry) => entry.cmd_tx.clone(),
            None => {
                debug!("write: session {} not registered, dropping input", session_id);
                return;
            }
        };
        if tx.send(SessionCommand::Data(data)).await.is_err() {
            warn!("write: shell relay for session {} already gone", session_id);
        }
    }

    /// Forward a window-change to the shell if the session exists.
    pub async fn resize(&self, session_id: &str, cols: u16, rows: u16) {
        let tx = match self.inner.sessions.get(session_id) {
            Some(entry) => entry.cmd_tx.clone(),
            None => return,
        };
        let _ = tx.send(SessionCommand::Resize(cols, rows)).await;
    }

    /// Whether a session is currently registered
    pub fn contains(&self, session_id: &str) -> bool {
        self.inner.sessions.contains_key(session_id)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    /// Transport controller and SFTP slot for a session, if registered.
    pub(crate) fn transport_parts(&self, session_id: &str) -> Option<(HandleController, SftpSlot)> {
        self.inner
            .sessions
            .get(session_id)
            .map(|e| (e.controller.clone(), e.sftp.clone()))
    }
}
