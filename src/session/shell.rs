//! Interactive shell channel relay
//!
//! One spawned task per session owns the PTY channel and relays bytes both
//! ways: caller input arrives as [`SessionCommand`]s, remote output leaves
//! as [`EngineEvent::Data`]. Primary and stderr chunks go to the same sink;
//! ordering is FIFO within each stream, undefined between them.

use std::sync::Arc;

use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::registry::RegistryInner;
use crate::events::EngineEvent;
use crate::ssh::HandleController;

/// Commands that can be sent to a session's shell task
#[derive(Debug)]
pub enum SessionCommand {
    /// Raw bytes for the remote PTY
    Data(Vec<u8>),
    /// Resize the PTY (cols, rows)
    Resize(u16, u16),
    /// Close the session
    Close,
}

/// Owns the session's close notification.
///
/// `notify` drops the registry entry (a no-op if an explicit disconnect
/// already removed it) and emits the `Closed` event. The guard latches on
/// first use, so a session can never emit `Closed` more than once even if
/// an explicit disconnect races a remote close.
pub(crate) struct CloseNotifier {
    inner: Arc<RegistryInner>,
    session_id: String,
    notified: bool,
}

impl CloseNotifier {
    pub(crate) fn new(inner: Arc<RegistryInner>, session_id: String) -> Self {
        Self {
            inner,
            session_id,
            notified: false,
        }
    }

    pub(crate) fn notify(&mut self) {
        if self.notified {
            return;
        }
        self.notified = true;
        self.inner.sessions.remove(&self.session_id);
        self.inner.events.emit(EngineEvent::Closed {
            session_id: self.session_id.clone(),
        });
    }
}

/// Spawn the shell relay task for a registered session.
///
/// The task removes the session from the registry and emits `Closed`
/// exactly once when the channel ends, whether the close was remote,
/// an explicit disconnect, or a transport error.
pub(crate) fn spawn_shell_task(
    mut channel: Channel<Msg>,
    session_id: String,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    controller: HandleController,
    inner: Arc<RegistryInner>,
) {
    tokio::spawn(async move {
        debug!("Shell relay started for session {}", session_id);

        let mut closer = CloseNotifier::new(inner.clone(), session_id.clone());

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Data(data)) => {
                            if let Err(e) = channel.data(&data[..]).await {
                                error!("Failed to send data to shell channel: {}", e);
                                break;
                            }
                        }
                        Some(SessionCommand::Resize(cols, rows)) => {
                            debug!("window_change {}x{} for session {}", cols, rows, session_id);
                            if let Err(e) = channel
                                .window_change(cols as u32, rows as u32, 0, 0)
                                .await
                            {
                                // Resize failure is not fatal to the session
                                error!("Failed to resize PTY: {}", e);
                            }
                        }
                        Some(SessionCommand::Close) | None => {
                            info!("Close requested for session {}", session_id);
                            let _ = channel.eof().await;
                            break;
                        }
                    }
                }

                msg = channel.wait() => {
                    match msg {
                        Some(ChannelMsg::Data { data }) => {
                            inner.events.emit(EngineEvent::Data {
                                session_id: session_id.clone(),
                                bytes: data.to_vec(),
                            });
                        }
                        Some(ChannelMsg::ExtendedData { data, ext }) => {
                            // ext == 1 is the stderr stream
                            if ext == 1 {
                                inner.events.emit(EngineEvent::Data {
                                    session_id: session_id.clone(),
                                    bytes: data.to_vec(),
                                });
                            }
                        }
                        Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) => {
                            info!("Shell channel closed for session {}", session_id);
                            break;
                        }
                        Some(ChannelMsg::ExitStatus { exit_status }) => {
                            info!(
                                "Shell exit status {} for session {}",
                                exit_status, session_id
                            );
                        }
                        Some(_) => {}
                        None => {
                            info!("Shell channel ended for session {}", session_id);
                            break;
                        }
                    }
                }
            }
        }

        // Teardown: notify the caller (at most once), then tear down the
        // transport.
        closer.notify();
        controller.disconnect().await;

        info!("Shell relay terminated for session {}", session_id);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSender;
    use dashmap::DashMap;

    fn inner() -> (
        Arc<RegistryInner>,
        tokio::sync::mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        let (events, rx) = EventSender::channel();
        (
            Arc::new(RegistryInner {
                sessions: DashMap::new(),
                events,
            }),
            rx,
        )
    }

    #[tokio::test]
    async fn close_notifier_emits_exactly_once() {
        let (inner, mut rx) = inner();
        let mut closer = CloseNotifier::new(inner, "s1".to_string());

        closer.notify();
        closer.notify();
        closer.notify();

        match rx.try_recv() {
            Ok(EngineEvent::Closed { session_id }) => assert_eq!(session_id, "s1"),
            other => panic!("expected Closed, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_notifier_emits_even_when_entry_already_removed() {
        // An explicit disconnect removes the entry before the relay's
        // teardown runs; the caller still gets its one Closed event.
        let (inner, mut rx) = inner();
        assert!(inner.sessions.remove("s2").is_none());

        let mut closer = CloseNotifier::new(inner, "s2".to_string());
        closer.notify();
        closer.notify();

        assert!(matches!(
            rx.try_recv(),
            Ok(EngineEvent::Closed { session_id }) if session_id == "s2"
        ));
        assert!(rx.try_recv().is_err());
    }
}
