use std::io;
use std::net::SocketAddr;

use crate::message::{Command, HEADER_SEARCH_WINDOW};

#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("no header delimiter within the first {} bytes", HEADER_SEARCH_WINDOW)]
    MalformedFrame,

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("invalid {command} payload: {reason}")]
    InvalidPayload { command: Command, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A tracker or peer answered, but not with what the request expected.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ResponseError {
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("unexpected response header {0}")]
    Unexpected(Command),

    #[error("connection closed without a response")]
    Missing,
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("invalid file name {0:?}")]
    InvalidName(String),

    #[error("file {0:?} not found in storage")]
    NotFound(String),

    #[error("storage I/O failed for {name:?}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum TransferError {
    #[error("a download of {0:?} is already in progress")]
    DownloadInProgress(String),

    #[error("no owners listed for {0:?}")]
    NoOwners(String),

    #[error("peer {0} refused the handshake")]
    HandshakeRefused(SocketAddr),

    #[error("hash mismatch for {name:?}: expected {expected}, got {actual}")]
    IntegrityFailure {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("owner could not serve the file: {0}")]
    Remote(String),

    #[error("download was abandoned before completion")]
    Cancelled,

    #[error(transparent)]
    Storage(#[from] StorageError),
}
