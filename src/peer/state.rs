use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};

use crate::error::TransferError;
use crate::record::FileRecord;

pub type DownloadResult = Result<PathBuf, TransferError>;

/// The one download a peer can have in flight.
#[derive(Debug)]
pub struct PendingDownload {
    pub target: FileRecord,
    /// The owner asked for the file; pushes from anywhere else are ignored.
    pub owner: IpAddr,
    completion: oneshot::Sender<DownloadResult>,
}

impl PendingDownload {
    /// Wakes the fetching side. Consumes the slot entry so it can only
    /// happen once.
    pub fn complete(self, result: DownloadResult) {
        // Receiver gone means the fetch was abandoned
        let _ = self.completion.send(result);
    }
}

/// Shared between the fetching caller and the listener that receives the
/// push-back connection.
#[derive(Debug, Clone, Default)]
pub struct DownloadSlot {
    pending: Arc<Mutex<Option<PendingDownload>>>,
}

impl DownloadSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for `target`. Fails if another download is still
    /// waiting; an entry whose fetcher has gone away is replaced.
    pub async fn arm(
        &self,
        target: FileRecord,
        owner: IpAddr,
    ) -> Result<oneshot::Receiver<DownloadResult>, TransferError> {
        let mut pending = self.pending.lock().await;

        if let Some(current) = pending.as_ref() {
            if !current.completion.is_closed() {
                return Err(TransferError::DownloadInProgress(current.target.name.clone()));
            }
        }

        let (completion, receiver) = oneshot::channel();
        *pending = Some(PendingDownload {
            target,
            owner,
            completion,
        });
        Ok(receiver)
    }

    /// Hands out the pending download if `sender` is the owner it waits on.
    pub async fn take_from(&self, sender: IpAddr) -> Option<PendingDownload> {
        let mut pending = self.pending.lock().await;
        match pending.as_ref() {
            Some(current) if current.owner == sender => pending.take(),
            _ => None,
        }
    }

    pub async fn clear(&self) {
        self.pending.lock().await.take();
    }

    pub async fn is_pending(&self) -> bool {
        self.pending.lock().await.is_some()
    }
}
