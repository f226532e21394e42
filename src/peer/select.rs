use std::net::IpAddr;

use rand::seq::SliceRandom;
use rand::Rng;

/// Picks one owner uniformly at random. Called again for every fetch so load
/// spreads across owners.
pub fn choose_owner<R: Rng + ?Sized>(owners: &[IpAddr], rng: &mut R) -> Option<IpAddr> {
    owners.choose(rng).copied()
}
