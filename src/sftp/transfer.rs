//! Streaming file transfers with pause, resume, and cancel
//!
//! Each transfer is a registered task driven by a chunked copy loop. A pair
//! of watch channels carries pause and cancel signals into the loop; the
//! task's state record gates progress reporting so nothing is emitted after
//! a transfer reaches a terminal state.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{info, warn};

use super::error::SftpError;
use super::session::SftpOps;
use super::types::{constants, TransferDirection, TransferState};
use crate::events::{EngineEvent, EventSender, TransferProgressEvent};

/// Pause/cancel signals for one transfer
///
/// Cloned into the copy loop; the engine keeps the sending side.
#[derive(Clone)]
pub struct TransferControl {
    pause: Arc<watch::Sender<bool>>,
    cancel: Arc<watch::Sender<bool>>,
}

impl TransferControl {
    pub fn new() -> Self {
        let (pause, _) = watch::channel(false);
        let (cancel, _) = watch::channel(false);
        Self {
            pause: Arc::new(pause),
            cancel: Arc::new(cancel),
        }
    }

    pub fn pause(&self) {
        self.pause.send_replace(true);
    }

    pub fn resume(&self) {
        self.pause.send_replace(false);
    }

    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_paused(&self) -> bool {
        *self.pause.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

impl Default for TransferControl {
    fn default() -> Self {
        Self::new()
    }
}

struct TaskProgress {
    state: TransferState,
    bytes: u64,
    total: Option<u64>,
}

/// One registered transfer
pub(crate) struct TransferEntry {
    id: String,
    session_id: String,
    direction: TransferDirection,
    remote_path: String,
    control: TransferControl,
    progress: Mutex<TaskProgress>,
}

impl TransferEntry {
    fn new(
        id: String,
        session_id: String,
        direction: TransferDirection,
        remote_path: String,
        total: Option<u64>,
    ) -> Self {
        Self {
            id,
            session_id,
            direction,
            remote_path,
            control: TransferControl::new(),
            progress: Mutex::new(TaskProgress {
                state: TransferState::Pending,
                bytes: 0,
                total,
            }),
        }
    }

    fn mark_running(&self) {
        let mut p = self.progress.lock();
        if p.state == TransferState::Pending {
            p.state = TransferState::Running;
        }
    }

    /// Record a byte count. Returns false (and records nothing) unless the
    /// task is still running, so progress observed after a cancel or pause
    /// taking effect is dropped. Counts never go backwards.
    fn record_progress(&self, bytes: u64) -> bool {
        let mut p = self.progress.lock();
        if p.state != TransferState::Running {
            return false;
        }
        if bytes > p.bytes {
            p.bytes = bytes;
        }
        true
    }

    /// Move to a terminal state unless one was already reached
    fn finish(&self, state: TransferState) {
        debug_assert!(state.is_terminal());
        let mut p = self.progress.lock();
        if !p.state.is_terminal() {
            p.state = state;
        }
    }

    fn total(&self) -> Option<u64> {
        self.progress.lock().total
    }

    fn progress_event(&self, bytes: u64) -> TransferProgressEvent {
        TransferProgressEvent {
            session_id: self.session_id.clone(),
            transfer_id: self.id.clone(),
            remote_path: self.remote_path.clone(),
            bytes_transferred: bytes,
            total_bytes: self.total(),
        }
    }
}

/// Transfer registry and driver
#[derive(Clone)]
pub struct TransferEngine {
    ops: SftpOps,
    tasks: Arc<DashMap<String, Arc<TransferEntry>>>,
    events: EventSender,
}

impl TransferEngine {
    pub fn new(ops: SftpOps, events: EventSender) -> Self {
        Self {
            ops,
            tasks: Arc::new(DashMap::new()),
            events,
        }
    }

    /// Upload a local file to the remote host.
    ///
    /// The local size is probed for progress totals but is not required;
    /// a transfer with an unknown total still runs and reports raw byte
    /// counts.
    pub async fn upload(
        &self,
        session_id: &str,
        transfer_id: &str,
        local_path: &str,
        remote_path: &str,
    ) -> Result<(), SftpError> {
        let total = tokio::fs::metadata(local_path).await.ok().map(|m| m.len());
        let entry = self.register(
            transfer_id,
            session_id,
            TransferDirection::Upload,
            remote_path,
            total,
        );

        info!(
            "Starting upload {} -> {} (transfer {})",
            local_path, remote_path, transfer_id
        );

        let result = self.upload_inner(&entry, local_path, remote_path).await;
        self.settle(&entry, result, transfer_id).await
    }

    async fn upload_inner(
        &self,
        entry: &Arc<TransferEntry>,
        local_path: &str,
        remote_path: &str,
    ) -> Result<u64, SftpError> {
        let sftp = self.ops.handle(&entry.session_id).await?;

        let mut local = tokio::fs::File::open(local_path).await?;
        let mut remote = sftp.create(remote_path).await?;

        entry.mark_running();

        let events = self.events.clone();
        let reporter = entry.clone();
        let transferred = copy_stream(
            &mut local,
            &mut remote,
            &entry.control,
            constants::TRANSFER_CHUNK_SIZE,
            |bytes| {
                if reporter.record_progress(bytes) {
                    events.emit(EngineEvent::UploadProgress(reporter.progress_event(bytes)));
                }
            },
        )
        .await?;

        remote
            .flush()
            .await
            .map_err(|e| SftpError::WriteError(format!("Failed to flush remote file: {}", e)))?;

        Ok(transferred)
    }

    /// Download a remote file to the local filesystem.
    ///
    /// The remote file is stat'd first; a missing or unreadable source
    /// fails the transfer before any local file is created. A cancelled
    /// download removes the partial local file.
    pub async fn download(
        &self,
        session_id: &str,
        transfer_id: &str,
        remote_path: &str,
        local_path: &str,
    ) -> Result<(), SftpError> {
        let remote_info = self.ops.stat(session_id, remote_path).await?;
        let entry = self.register(
            transfer_id,
            session_id,
            TransferDirection::Download,
            remote_path,
            Some(remote_info.size),
        );

        info!(
            "Starting download {} -> {} (transfer {}, {} bytes)",
            remote_path, local_path, transfer_id, remote_info.size
        );

        let result = self.download_inner(&entry, remote_path, local_path).await;

        if matches!(result, Err(SftpError::TransferCancelled)) {
            if let Err(e) = tokio::fs::remove_file(local_path).await {
                warn!("Failed to remove partial download {}: {}", local_path, e);
            }
        }

        self.settle(&entry, result, transfer_id).await
    }

    async fn download_inner(
        &self,
        entry: &Arc<TransferEntry>,
        remote_path: &str,
        local_path: &str,
    ) -> Result<u64, SftpError> {
        let sftp = self.ops.handle(&entry.session_id).await?;

        let mut remote = sftp.open(remote_path).await?;
        let mut local = tokio::fs::File::create(local_path).await?;

        entry.mark_running();

        let events = self.events.clone();
        let reporter = entry.clone();
        let transferred = copy_stream(
            &mut remote,
            &mut local,
            &entry.control,
            constants::TRANSFER_CHUNK_SIZE,
            |bytes| {
                if reporter.record_progress(bytes) {
                    events.emit(EngineEvent::DownloadProgress(
                        reporter.progress_event(bytes),
                    ));
                }
            },
        )
        .await?;

        local.flush().await?;

        Ok(transferred)
    }

    fn register(
        &self,
        transfer_id: &str,
        session_id: &str,
        direction: TransferDirection,
        remote_path: &str,
        total: Option<u64>,
    ) -> Arc<TransferEntry> {
        let entry = Arc::new(TransferEntry::new(
            transfer_id.to_string(),
            session_id.to_string(),
            direction,
            remote_path.to_string(),
            total,
        ));
        self.tasks.insert(transfer_id.to_string(), entry.clone());
        entry
    }

    async fn settle(
        &self,
        entry: &Arc<TransferEntry>,
        result: Result<u64, SftpError>,
        transfer_id: &str,
    ) -> Result<(), SftpError> {
        match result {
            Ok(transferred) => {
                entry.finish(TransferState::Completed);
                info!(
                    "{:?} {} completed ({} bytes)",
                    entry.direction, transfer_id, transferred
                );
                Ok(())
            }
            Err(SftpError::TransferCancelled) => {
                entry.finish(TransferState::Cancelled);
                info!("{:?} {} cancelled", entry.direction, transfer_id);
                Err(SftpError::TransferCancelled)
            }
            Err(e) => {
                entry.finish(TransferState::Failed);
                warn!("{:?} {} failed: {}", entry.direction, transfer_id, e);
                Err(e)
            }
        }
    }

    /// Pause a running transfer. Returns false for unknown ids and for
    /// transfers not currently running.
    pub fn pause(&self, transfer_id: &str) -> bool {
        let Some(entry) = self.tasks.get(transfer_id) else {
            return false;
        };
        let mut p = entry.progress.lock();
        if p.state != TransferState::Running {
            return false;
        }
        p.state = TransferState::Paused;
        entry.control.pause();
        info!("Transfer {} paused", transfer_id);
        true
    }

    /// Resume a paused transfer. Returns false for unknown ids and for
    /// transfers not currently paused.
    pub fn resume(&self, transfer_id: &str) -> bool {
        let Some(entry) = self.tasks.get(transfer_id) else {
            return false;
        };
        let mut p = entry.progress.lock();
        if p.state != TransferState::Paused {
            return false;
        }
        p.state = TransferState::Running;
        entry.control.resume();
        info!("Transfer {} resumed", transfer_id);
        true
    }

    /// Cancel a transfer. Returns false for unknown ids and for transfers
    /// already in a terminal state. Cancelling a paused transfer works:
    /// the copy loop's pause poll also watches for cancellation.
    pub fn cancel(&self, transfer_id: &str) -> bool {
        let Some(entry) = self.tasks.get(transfer_id) else {
            return false;
        };
        let mut p = entry.progress.lock();
        if p.state.is_terminal() {
            return false;
        }
        p.state = TransferState::Cancelled;
        entry.control.cancel();
        info!("Transfer {} cancelled", transfer_id);
        true
    }

    pub fn state(&self, transfer_id: &str) -> Option<TransferState> {
        self.tasks
            .get(transfer_id)
            .map(|e| e.progress.lock().state)
    }

    /// (bytes transferred, total if known) for a registered transfer
    pub fn progress(&self, transfer_id: &str) -> Option<(u64, Option<u64>)> {
        self.tasks.get(transfer_id).map(|e| {
            let p = e.progress.lock();
            (p.bytes, p.total)
        })
    }

    /// Drop terminal tasks from the registry
    pub fn prune_finished(&self) {
        self.tasks.retain(|_, e| !e.progress.lock().state.is_terminal());
    }
}

/// Chunked copy loop shared by uploads and downloads.
///
/// Cancellation is checked before every read and during every pause poll.
/// While paused, the loop sleeps in short intervals instead of reading, so
/// no bytes move and a cancel still lands promptly. `on_chunk` receives the
/// cumulative byte count after each written chunk.
pub(crate) async fn copy_stream<R, W>(
    reader: &mut R,
    writer: &mut W,
    control: &TransferControl,
    chunk_size: usize,
    mut on_chunk: impl FnMut(u64),
) -> Result<u64, SftpError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; chunk_size];
    let mut transferred: u64 = 0;

    loop {
        if control.is_cancelled() {
            return Err(SftpError::TransferCancelled);
        }

        while control.is_paused() {
            tokio::time::sleep(std::time::Duration::from_millis(constants::PAUSE_POLL_MS))
                .await;
            if control.is_cancelled() {
                return Err(SftpError::TransferCancelled);
            }
        }

        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        writer
            .write_all(&buf[..n])
            .await
            .map_err(|e| SftpError::WriteError(e.to_string()))?;

        transferred += n as u64;
        on_chunk(transferred);
    }

    Ok(transferred)
}
