use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::bytes::Bytes;
use tracing::{debug, error, info, instrument, warn};

use super::state::DownloadSlot;
use crate::error::TransferError;
use crate::file::LocalStore;
use crate::hash;
use crate::message::{Command, Message};
use crate::net::{client, parse_inbound, MessageHandler};
use crate::record::FileRecord;

/// Handles everything that arrives on a peer's listening port: handshakes,
/// file requests from other peers, and files pushed back to us.
pub struct PeerService {
    store: LocalStore,
    downloads: DownloadSlot,
    /// Requesters are reached on this port
    peer_port: u16,
}

impl PeerService {
    pub fn new(store: LocalStore, downloads: DownloadSlot, peer_port: u16) -> Self {
        Self {
            store,
            downloads,
            peer_port,
        }
    }

    /// Opens a new connection to the requester and pushes the file over it.
    /// Nothing is answered on the request connection itself.
    #[instrument(skip(self), fields(requester = %requester))]
    async fn serve(&self, requester: IpAddr, name: &str) -> Result<()> {
        let target = SocketAddr::new(requester, self.peer_port);

        let mut file = match self.store.open_file(name).await {
            Ok(file) => file,
            Err(e) => {
                warn!("Cannot serve {}: {}", name, e);
                return client::send(target, Message::error(&e))
                    .await
                    .context("Failed to report missing file");
            }
        };

        let mut stream = TcpStream::connect(target)
            .await
            .with_context(|| format!("Failed to connect back to {}", target))?;

        stream
            .write_all(&Message::new(Command::File).to_bytes())
            .await
            .context("Failed to send file header")?;
        let sent = tokio::io::copy(&mut file, &mut stream)
            .await
            .context("Failed to stream file")?;
        stream
            .shutdown()
            .await
            .context("Failed to half-close push connection")?;

        info!("Sent {} ({} bytes) to {}", name, sent, target);
        Ok(())
    }

    async fn receive(&self, from: SocketAddr, data: Bytes) {
        let Some(pending) = self.downloads.take_from(from.ip().to_canonical()).await else {
            warn!("Discarding unsolicited file from {} ({} bytes)", from, data.len());
            return;
        };

        info!("Received {} bytes from {} for {}", data.len(), from, pending.target.name);
        let result = self.verify_and_store(&pending.target, &data).await;
        pending.complete(result);
    }

    /// Only data whose hash matches the listing is written to storage.
    async fn verify_and_store(
        &self,
        target: &FileRecord,
        data: &[u8],
    ) -> Result<PathBuf, TransferError> {
        if !hash::verify(data, &target.hash) {
            let actual = hash::hash_bytes(data);
            error!(
                "Hash check failed for {}: expected {}, got {}",
                target.name, target.hash, actual
            );
            return Err(TransferError::IntegrityFailure {
                name: target.name.clone(),
                expected: target.hash.clone(),
                actual,
            });
        }

        let path = self.store.write(&target.name, data).await?;
        info!("Saved {} to {}", target.name, path.display());
        Ok(path)
    }

    async fn receive_failure(&self, from: SocketAddr, reason: String) {
        match self.downloads.take_from(from.ip().to_canonical()).await {
            Some(pending) => {
                warn!("Peer {} could not send {}: {}", from, pending.target.name, reason);
                pending.complete(Err(TransferError::Remote(reason)));
            }
            None => debug!("Ignoring error from {}: {}", from, reason),
        }
    }
}

impl MessageHandler for PeerService {
    fn name(&self) -> &str {
        "peer"
    }

    async fn handle(&mut self, from: SocketAddr, frame: Bytes) -> Result<Option<Message>> {
        let Some(message) = parse_inbound(from, frame) else {
            return Ok(None);
        };

        match message.command {
            Command::Connect => {
                debug!("Handshake from {}", from);
                Ok(Some(Message::new(Command::Accept)))
            }
            Command::Request => {
                let name = message.text()?.to_string();
                info!("Peer {} requested {}", from, name);
                self.serve(from.ip().to_canonical(), &name).await?;
                Ok(None)
            }
            Command::File => {
                self.receive(from, message.payload).await;
                Ok(None)
            }
            Command::Error => {
                let reason = message.text().unwrap_or_default().trim().to_string();
                self.receive_failure(from, reason).await;
                Ok(None)
            }
            other => {
                warn!("Unsupported command {} from {}", other, from);
                Ok(None)
            }
        }
    }
}
