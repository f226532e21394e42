use std::net::{IpAddr, SocketAddr};

use anyhow::Result;
use tokio_util::bytes::Bytes;
use tracing::{info, warn};

use super::registry::{Registry, RegistryError};
use crate::message::{Command, Message};
use crate::net::{parse_inbound, MessageHandler};
use crate::record::{encode_listings, FileRecord};

/// Tracker side of the protocol: connect/add/list/quit against a [`Registry`].
#[derive(Debug, Default)]
pub struct Tracker {
    registry: Registry,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Answers one request from `ip`. `None` means nothing is sent back.
    pub fn respond(&mut self, ip: IpAddr, message: &Message) -> Option<Message> {
        match message.command {
            Command::Connect => {
                self.registry.connect(ip);
                info!("Peer {} authenticated", ip);
                Some(Message::new(Command::Accept))
            }
            Command::Quit => {
                self.registry.quit(ip);
                info!("Peer {} left, {} files still shared", ip, self.registry.len());
                None
            }
            Command::Add => Some(self.add(ip, message)),
            Command::List => Some(self.list(ip)),
            other => {
                warn!("Unsupported command {} from {}", other, ip);
                None
            }
        }
    }

    fn add(&mut self, ip: IpAddr, message: &Message) -> Message {
        if !self.registry.is_trusted(&ip) {
            return reject(RegistryError::Untrusted(ip));
        }

        // Names may start or end with spaces, only the size field is trimmed
        let record = match message.text().and_then(str::parse::<FileRecord>) {
            Ok(record) => record,
            Err(e) => {
                warn!("Bad add request from {}: {}", ip, e);
                return Message::error(e);
            }
        };

        info!(
            "Peer {} shares {} ({} bytes, hash {})",
            ip, record.name, record.size, record.hash
        );
        match self.registry.add(ip, record) {
            Ok(()) => Message::new(Command::Ok),
            Err(e) => reject(e),
        }
    }

    fn list(&self, ip: IpAddr) -> Message {
        match self.registry.list(ip) {
            Ok(listings) => {
                info!("Sending {} listings to {}", listings.len(), ip);
                Message::with_payload(Command::Ok, encode_listings(&listings))
            }
            Err(e) => reject(e),
        }
    }
}

fn reject(error: RegistryError) -> Message {
    warn!("{}", error);
    Message::error(error)
}

impl MessageHandler for Tracker {
    fn name(&self) -> &str {
        "tracker"
    }

    async fn handle(&mut self, from: SocketAddr, frame: Bytes) -> Result<Option<Message>> {
        let Some(message) = parse_inbound(from, frame) else {
            return Ok(None);
        };
        Ok(self.respond(from.ip().to_canonical(), &message))
    }
}
