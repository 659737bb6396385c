//! Engine event stream
//!
//! All caller-facing notifications (shell output, session close, transfer
//! progress) flow through one unbounded mpsc channel handed out at engine
//! construction. A dropped receiver never propagates back into the engine:
//! emission failures are logged and swallowed so an abandoned consumer
//! cannot stall or corrupt an in-flight stream.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

/// Progress payload for upload/download events
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgressEvent {
    pub session_id: String,
    pub transfer_id: String,
    pub remote_path: String,
    pub bytes_transferred: u64,
    /// Absent when the source could not be stat'ed (upload without a total)
    pub total_bytes: Option<u64>,
}

/// Events emitted to the caller
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// Shell output bytes for a session. Primary and stderr streams are
    /// relayed to this same variant; ordering is FIFO within each stream.
    #[serde(rename_all = "camelCase")]
    Data { session_id: String, bytes: Vec<u8> },

    /// Emitted exactly once per connected session, on remote close or
    /// explicit disconnect.
    #[serde(rename_all = "camelCase")]
    Closed { session_id: String },

    UploadProgress(TransferProgressEvent),

    DownloadProgress(TransferProgressEvent),
}

/// Cloneable sender side of the engine event stream
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSender {
    /// Create a sender/receiver pair
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit an event; a closed receiver is logged and ignored
    pub fn emit(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            warn!("Event receiver dropped; discarding engine event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_delivers_in_order() {
        let (tx, mut rx) = EventSender::channel();
        tx.emit(EngineEvent::Data {
            session_id: "s1".into(),
            bytes: b"a".to_vec(),
        });
        tx.emit(EngineEvent::Closed {
            session_id: "s1".into(),
        });

        assert!(matches!(rx.recv().await, Some(EngineEvent::Data { .. })));
        assert!(matches!(rx.recv().await, Some(EngineEvent::Closed { .. })));
    }

    #[tokio::test]
    async fn emit_survives_dropped_receiver() {
        let (tx, rx) = EventSender::channel();
        drop(rx);
        // Must not panic or error out
        tx.emit(EngineEvent::Closed {
            session_id: "gone".into(),
        });
    }

    #[test]
    fn progress_event_serializes_camel_case() {
        let ev = EngineEvent::UploadProgress(TransferProgressEvent {
            session_id: "s".into(),
            transfer_id: "t".into(),
            remote_path: "/tmp/f".into(),
            bytes_transferred: 10,
            total_bytes: Some(100),
        });
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("bytesTransferred"));
        assert!(json.contains("totalBytes"));
        assert!(json.contains("uploadProgress"));
    }
}
