use std::net::SocketAddr;

use anyhow::Context;
use tracing::instrument;

use crate::error::TransferError;
use crate::message::{Command, Message};
use crate::net::client;

/// `connect` / `accept` exchange with another peer's listener, done before
/// asking it for a file.
#[instrument]
pub async fn handshake(addr: SocketAddr) -> anyhow::Result<()> {
    let response = client::request(addr, Message::new(Command::Connect))
        .await
        .context("Failed to handshake")?;

    match response {
        Some(message) if message.command == Command::Accept => {
            tracing::info!("Handshake with peer {} successful", addr);
            Ok(())
        }
        _ => Err(TransferError::HandshakeRefused(addr).into()),
    }
}
