use core::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::ProtocolError;
use crate::message::Command;

const FIELD_SEPARATOR: char = '\t';
const OWNER_SEPARATOR: char = '/';

/// Identity of a shared file. Two records describe the same file only if the
/// name, content hash and size all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileRecord {
    /// File name inside the owner's storage root.
    pub name: String,

    /// Lowercase hex digest of the file contents.
    pub hash: String,

    /// The length of the file, in bytes.
    pub size: u64,
}

impl FileRecord {
    pub fn new(name: impl Into<String>, hash: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            hash: hash.into(),
            size,
        }
    }
}

/// `name TAB hash TAB size`, the `add` payload.
impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.name,
            self.hash,
            self.size,
            sep = FIELD_SEPARATOR
        )
    }
}

impl FromStr for FileRecord {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(FIELD_SEPARATOR).collect();
        let [name, hash, size] = fields[..] else {
            return Err(invalid(
                Command::Add,
                format!("expected 3 tab separated fields, got {}", fields.len()),
            ));
        };

        if name.is_empty() || hash.is_empty() {
            return Err(invalid(Command::Add, "name and hash must not be empty"));
        }
        // Each record occupies exactly one line of a `list` response
        if [name, hash].iter().any(|field| field.contains(&['\n', '\r'][..])) {
            return Err(invalid(Command::Add, "name and hash must not contain line breaks"));
        }

        let size = size
            .trim()
            .parse::<u64>()
            .map_err(|e| invalid(Command::Add, format!("bad size {:?}: {}", size, e)))?;

        Ok(Self::new(name, hash, size))
    }
}

/// One line of a `list` response: a record and every peer currently holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub record: FileRecord,
    pub owners: Vec<IpAddr>,
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.record, FIELD_SEPARATOR)?;
        for (i, owner) in self.owners.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", OWNER_SEPARATOR)?;
            }
            write!(f, "{}", owner)?;
        }
        Ok(())
    }
}

impl FromStr for Listing {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (record, owners) = s
            .rsplit_once(FIELD_SEPARATOR)
            .ok_or_else(|| invalid(Command::List, format!("missing owners in {:?}", s)))?;

        let record = record
            .parse::<FileRecord>()
            .map_err(|e| invalid(Command::List, e.to_string()))?;

        let owners = owners
            .split(OWNER_SEPARATOR)
            .map(|owner| {
                owner
                    .trim()
                    .parse::<IpAddr>()
                    .map_err(|e| invalid(Command::List, format!("bad owner {:?}: {}", owner, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { record, owners })
    }
}

/// Body of a successful `list` response, one listing per line.
pub fn encode_listings(listings: &[Listing]) -> String {
    listings
        .iter()
        .map(Listing::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn parse_listings(payload: &str) -> Result<Vec<Listing>, ProtocolError> {
    payload
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::parse)
        .collect()
}

fn invalid(command: Command, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::InvalidPayload {
        command,
        reason: reason.into(),
    }
}
