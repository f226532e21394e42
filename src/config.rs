use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

pub const DEFAULT_TRACKER_PORT: u16 = 9000;

/// Every peer listens on the same well-known port unless told otherwise.
pub const DEFAULT_PEER_PORT: u16 = 12345;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Port the tracker accepts peer requests on
    pub listen_port: u16,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_TRACKER_PORT,
        }
    }
}

impl TrackerConfig {
    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Directory shared files are read from and downloads are written to
    pub storage_root: PathBuf,
    /// Address of the tracker
    pub tracker_addr: SocketAddr,
    /// Port this peer's listener binds
    pub listen_port: u16,
    /// Port other peers listen on; used both to request files and to push
    /// them back to requesters
    pub peer_port: u16,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("."),
            tracker_addr: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::LOCALHOST,
                DEFAULT_TRACKER_PORT,
            )),
            listen_port: DEFAULT_PEER_PORT,
            peer_port: DEFAULT_PEER_PORT,
        }
    }
}

impl PeerConfig {
    pub fn with_storage_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_root = path.into();
        self
    }

    pub fn with_tracker_addr(mut self, addr: SocketAddr) -> Self {
        self.tracker_addr = addr;
        self
    }

    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    pub fn with_peer_port(mut self, port: u16) -> Self {
        self.peer_port = port;
        self
    }
}
