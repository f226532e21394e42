use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::net::IpAddr;

use crate::record::{FileRecord, Listing};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{0} has not authenticated with the tracker")]
    Untrusted(IpAddr),
}

/// Which peers hold which files, and which peers are trusted.
///
/// Every record present has at least one owner; a record whose last owner
/// leaves is removed in the same step.
#[derive(Debug, Default)]
pub struct Registry {
    files: BTreeMap<FileRecord, BTreeSet<IpAddr>>,
    trusted: HashSet<IpAddr>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trusts every later connection from `ip` until it quits.
    pub fn connect(&mut self, ip: IpAddr) {
        self.trusted.insert(ip);
    }

    pub fn is_trusted(&self, ip: &IpAddr) -> bool {
        self.trusted.contains(ip)
    }

    pub fn add(&mut self, ip: IpAddr, record: FileRecord) -> Result<(), RegistryError> {
        self.ensure_trusted(ip)?;
        self.files.entry(record).or_default().insert(ip);
        Ok(())
    }

    /// Every record with its owners, ordered by record.
    pub fn list(&self, ip: IpAddr) -> Result<Vec<Listing>, RegistryError> {
        self.ensure_trusted(ip)?;
        Ok(self
            .files
            .iter()
            .map(|(record, owners)| Listing {
                record: record.clone(),
                owners: owners.iter().copied().collect(),
            })
            .collect())
    }

    /// Forgets `ip` entirely: trust and ownership.
    pub fn quit(&mut self, ip: IpAddr) {
        self.trusted.remove(&ip);
        self.files.retain(|_, owners| {
            owners.remove(&ip);
            !owners.is_empty()
        });
    }

    pub fn owners(&self, record: &FileRecord) -> Option<&BTreeSet<IpAddr>> {
        self.files.get(record)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn ensure_trusted(&self, ip: IpAddr) -> Result<(), RegistryError> {
        if self.is_trusted(&ip) {
            Ok(())
        } else {
            Err(RegistryError::Untrusted(ip))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, last))
    }

    fn report() -> FileRecord {
        FileRecord::new("report.pdf", "abc123", 2048)
    }

    fn assert_owner_sets_non_empty(registry: &Registry) {
        for owners in registry.files.values() {
            assert!(!owners.is_empty());
        }
    }

    #[test]
    fn test_untrusted_add_is_rejected_without_change() {
        let mut registry = Registry::new();
        assert_eq!(
            registry.add(ip(1), report()),
            Err(RegistryError::Untrusted(ip(1)))
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_untrusted_list_is_rejected() {
        let mut registry = Registry::new();
        registry.connect(ip(1));
        registry.add(ip(1), report()).unwrap();
        assert_eq!(registry.list(ip(2)), Err(RegistryError::Untrusted(ip(2))));
    }

    #[test]
    fn test_add_merges_owners_of_equal_records() {
        let mut registry = Registry::new();
        registry.connect(ip(1));
        registry.connect(ip(2));
        registry.add(ip(1), report()).unwrap();
        registry.add(ip(2), report()).unwrap();
        registry.add(ip(2), report()).unwrap();

        assert_eq!(registry.len(), 1);
        let owners: Vec<_> = registry.owners(&report()).unwrap().iter().copied().collect();
        assert_eq!(owners, vec![ip(1), ip(2)]);
    }

    #[test]
    fn test_records_differing_in_one_field_are_distinct() {
        let mut registry = Registry::new();
        registry.connect(ip(1));
        registry.add(ip(1), report()).unwrap();
        registry
            .add(ip(1), FileRecord::new("report.pdf", "abc123", 4096))
            .unwrap();
        registry
            .add(ip(1), FileRecord::new("report.pdf", "def456", 2048))
            .unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_list_reports_owners() {
        let mut registry = Registry::new();
        registry.connect(ip(1));
        registry.connect(ip(2));
        registry.add(ip(2), report()).unwrap();
        registry.add(ip(1), report()).unwrap();

        let listings = registry.list(ip(1)).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].record, report());
        assert_eq!(listings[0].owners, vec![ip(1), ip(2)]);
    }

    #[test]
    fn test_quit_removes_owner_and_empty_records() {
        let mut registry = Registry::new();
        registry.connect(ip(1));
        registry.connect(ip(2));
        let shared = report();
        let solo = FileRecord::new("solo.txt", "ffff", 1);
        registry.add(ip(1), shared.clone()).unwrap();
        registry.add(ip(2), shared.clone()).unwrap();
        registry.add(ip(1), solo.clone()).unwrap();

        registry.quit(ip(1));

        assert!(!registry.is_trusted(&ip(1)));
        assert!(registry.owners(&solo).is_none());
        let owners: Vec<_> = registry.owners(&shared).unwrap().iter().copied().collect();
        assert_eq!(owners, vec![ip(2)]);
        for owners in registry.files.values() {
            assert!(!owners.contains(&ip(1)));
        }
        assert_owner_sets_non_empty(&registry);

        registry.quit(ip(2));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_quit_requires_new_connect() {
        let mut registry = Registry::new();
        registry.connect(ip(1));
        registry.quit(ip(1));
        assert!(registry.add(ip(1), report()).is_err());

        registry.connect(ip(1));
        assert!(registry.add(ip(1), report()).is_ok());
    }

    #[test]
    fn test_quit_of_unknown_peer_is_harmless() {
        let mut registry = Registry::new();
        registry.connect(ip(1));
        registry.add(ip(1), report()).unwrap();
        registry.quit(ip(9));
        assert_eq!(registry.len(), 1);
        assert!(registry.is_trusted(&ip(1)));
    }
}
