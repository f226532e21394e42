use core::fmt;

use tokio_util::bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::record::FileRecord;

mod codec;

pub use codec::MessageCodec;

/// The header is only searched for within this many leading bytes of a frame.
pub const HEADER_SEARCH_WINDOW: usize = 100;

const HEADER_DELIMITER: u8 = b'\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Accept,
    Add,
    /// Reserved, nothing sends it.
    Delete,
    List,
    Quit,
    Request,
    Error,
    Ok,
    File,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "connect",
            Command::Accept => "accept",
            Command::Add => "add",
            Command::Delete => "delete",
            Command::List => "list",
            Command::Quit => "quit",
            Command::Request => "request",
            Command::Error => "error",
            Command::Ok => "ok",
            Command::File => "file",
        }
    }

    /// Exact, case-sensitive header lookup.
    pub fn from_header(header: &str) -> Option<Self> {
        let command = match header {
            "connect" => Command::Connect,
            "accept" => Command::Accept,
            "add" => Command::Add,
            "delete" => Command::Delete,
            "list" => Command::List,
            "quit" => Command::Quit,
            "request" => Command::Request,
            "error" => Command::Error,
            "ok" => Command::Ok,
            "file" => Command::File,
            _ => return None,
        };
        Some(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One complete frame: `HEADER "\n" [PAYLOAD]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub command: Command,
    pub payload: Bytes,
}

impl Message {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            payload: Bytes::new(),
        }
    }

    pub fn with_payload(command: Command, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            payload: payload.into(),
        }
    }

    /// `error` carries a single detail line, so embedded newlines are flattened.
    pub fn error(reason: impl fmt::Display) -> Self {
        let reason = reason.to_string().replace(&['\r', '\n'][..], " ");
        Self::with_payload(Command::Error, reason)
    }

    pub fn add(record: &FileRecord) -> Self {
        Self::with_payload(Command::Add, record.to_string())
    }

    pub fn request(name: &str) -> Self {
        Self::with_payload(Command::Request, name.to_owned())
    }

    /// Splits a frame into header and payload.
    ///
    /// The payload starts right after the first newline found within
    /// [`HEADER_SEARCH_WINDOW`] bytes, so binary payloads may contain any byte.
    pub fn parse(frame: Bytes) -> Result<Self, ProtocolError> {
        let window = &frame[..frame.len().min(HEADER_SEARCH_WINDOW)];
        let header_length = window
            .iter()
            .position(|&byte| byte == HEADER_DELIMITER)
            .ok_or(ProtocolError::MalformedFrame)?;

        let header = String::from_utf8_lossy(&frame[..header_length]);
        let command = Command::from_header(&header)
            .ok_or_else(|| ProtocolError::UnknownCommand(header.into_owned()))?;

        Ok(Self {
            command,
            payload: frame.slice(header_length + 1..),
        })
    }

    pub fn encode_into(&self, dst: &mut BytesMut) {
        let header = self.command.as_str().as_bytes();
        dst.reserve(header.len() + 1 + self.payload.len());
        dst.put_slice(header);
        dst.put_u8(HEADER_DELIMITER);
        dst.put_slice(&self.payload);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::new();
        self.encode_into(&mut dst);
        dst.freeze()
    }

    /// Payload as UTF-8 text.
    pub fn text(&self) -> Result<&str, ProtocolError> {
        std::str::from_utf8(&self.payload).map_err(|_| ProtocolError::InvalidPayload {
            command: self.command,
            reason: "payload is not valid UTF-8".to_string(),
        })
    }
}
