use std::net::SocketAddr;

use anyhow::Context;
use tracing::{info, instrument};

use crate::message::{Command, Message};
use crate::net::client::{self, expect_response};
use crate::record::{parse_listings, FileRecord, Listing};

/// Requests a peer makes to the tracker. Every call uses a fresh connection.
#[derive(Debug, Clone, Copy)]
pub struct TrackerClient {
    addr: SocketAddr,
}

impl TrackerClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[instrument(skip(self), fields(tracker = %self.addr))]
    pub async fn connect(&self) -> anyhow::Result<()> {
        let response = client::request(self.addr, Message::new(Command::Connect)).await?;
        expect_response(response, Command::Accept).context("Tracker did not accept connect")?;

        info!("Authenticated with tracker");
        Ok(())
    }

    #[instrument(skip(self, record), fields(tracker = %self.addr, name = %record.name))]
    pub async fn add(&self, record: &FileRecord) -> anyhow::Result<()> {
        let response = client::request(self.addr, Message::add(record)).await?;
        expect_response(response, Command::Ok)
            .with_context(|| format!("Tracker refused to register {}", record.name))?;

        info!("Registered {} with tracker", record.name);
        Ok(())
    }

    #[instrument(skip(self), fields(tracker = %self.addr))]
    pub async fn list(&self) -> anyhow::Result<Vec<Listing>> {
        let response = client::request(self.addr, Message::new(Command::List)).await?;
        let response =
            expect_response(response, Command::Ok).context("Tracker refused to list files")?;

        let listings = parse_listings(response.text()?).context("Failed to parse file listing")?;
        info!("Retrieved {} listings from tracker", listings.len());
        Ok(listings)
    }

    /// The tracker never answers `quit`.
    #[instrument(skip(self), fields(tracker = %self.addr))]
    pub async fn quit(&self) -> anyhow::Result<()> {
        client::send(self.addr, Message::new(Command::Quit)).await?;
        info!("Left the tracker");
        Ok(())
    }
}
