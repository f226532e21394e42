mod handshake;
mod listener;
mod select;
mod session;
mod state;

pub use handshake::handshake;
pub use listener::PeerService;
pub use select::choose_owner;
pub use session::PeerSession;
pub use state::{DownloadResult, DownloadSlot, PendingDownload};
