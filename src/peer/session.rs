use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use super::handshake::handshake;
use super::listener::PeerService;
use super::select::choose_owner;
use super::state::DownloadSlot;
use crate::config::PeerConfig;
use crate::error::TransferError;
use crate::file::LocalStore;
use crate::message::Message;
use crate::net::client;
use crate::record::{FileRecord, Listing};
use crate::tracker::TrackerClient;

/// Everything a peer does on its own initiative: talking to the tracker,
/// sharing files and fetching them from other peers.
pub struct PeerSession {
    config: PeerConfig,
    tracker: TrackerClient,
    store: LocalStore,
    downloads: DownloadSlot,
}

impl PeerSession {
    pub async fn new(config: PeerConfig) -> Result<Self> {
        let store = LocalStore::open(config.storage_root.clone())
            .await
            .context("Failed to open storage root")?;

        Ok(Self {
            tracker: TrackerClient::new(config.tracker_addr),
            store,
            downloads: DownloadSlot::new(),
            config,
        })
    }

    /// Handler for this peer's listening port. It shares the download slot
    /// with the session so pushed files complete [`PeerSession::fetch`].
    pub fn service(&self) -> PeerService {
        PeerService::new(
            self.store.clone(),
            self.downloads.clone(),
            self.config.peer_port,
        )
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub async fn connect(&self) -> Result<()> {
        self.tracker.connect().await
    }

    /// Hashes `name` from the storage root and registers it with the tracker.
    #[instrument(skip(self))]
    pub async fn share(&self, name: &str) -> Result<FileRecord> {
        let record = self
            .store
            .describe(name)
            .await
            .with_context(|| format!("Failed to read {}", name))?;
        self.tracker.add(&record).await?;
        Ok(record)
    }

    pub async fn list(&self) -> Result<Vec<Listing>> {
        self.tracker.list().await
    }

    /// Downloads a listed file from one of its owners, chosen at random.
    ///
    /// The file does not come back on the request connection: the owner
    /// connects to our listener and pushes it, and the listener resolves the
    /// pending download this call waits on.
    #[instrument(skip(self, listing), fields(name = %listing.record.name))]
    pub async fn fetch(&self, listing: &Listing) -> Result<PathBuf> {
        let name = &listing.record.name;
        let owner = choose_owner(&listing.owners, &mut rand::thread_rng())
            .ok_or_else(|| TransferError::NoOwners(name.clone()))?;
        let owner_addr = SocketAddr::new(owner, self.config.peer_port);
        info!("Fetching {} from {}", name, owner_addr);

        handshake(owner_addr).await?;

        let completion = self.downloads.arm(listing.record.clone(), owner).await?;
        if let Err(e) = client::send(owner_addr, Message::request(name)).await {
            self.downloads.clear().await;
            return Err(e.context(format!("Failed to request {} from {}", name, owner_addr)));
        }

        let path = completion.await.map_err(|_| TransferError::Cancelled)??;
        info!("Downloaded {} to {}", name, path.display());
        Ok(path)
    }

    /// Leaves the network; the tracker forgets our files and our trust.
    pub async fn quit(&self) -> Result<()> {
        self.tracker.quit().await
    }
}
