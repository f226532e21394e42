use std::io;
use std::path::Path;

use sha1::{Digest, Sha1};
use tokio::io::AsyncReadExt;

const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Hex encoded SHA1 digest of an in-memory buffer.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Streams the file through the digest and returns `(hash, size)`.
pub async fn hash_file(path: impl AsRef<Path>) -> io::Result<(String, u64)> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];
    let mut size = 0u64;

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        size += read as u64;
    }

    Ok((hex::encode(hasher.finalize()), size))
}

/// Verifies that received data matches the advertised hash.
///
/// # Arguments
/// * `data` - The received file contents
/// * `expected_hash` - Hex digest taken from the tracker listing
///
/// # Returns
/// `true` if the hash matches, `false` otherwise
pub fn verify(data: &[u8], expected_hash: &str) -> bool {
    hash_bytes(data).eq_ignore_ascii_case(expected_hash.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC_SHA1: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";
    const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

    #[test]
    fn test_hash_bytes_known_vectors() {
        assert_eq!(hash_bytes(b"abc"), ABC_SHA1);
        assert_eq!(hash_bytes(b""), EMPTY_SHA1);
    }

    #[test]
    fn test_verify_valid() {
        assert!(verify(b"abc", ABC_SHA1));
        assert!(verify(b"abc", &ABC_SHA1.to_uppercase()));
    }

    #[test]
    fn test_verify_invalid() {
        assert!(!verify(b"abd", ABC_SHA1));
        assert!(!verify(b"abc", "abc123"));
    }

    #[tokio::test]
    async fn test_hash_file_matches_in_memory_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("large.bin");
        // Spans several read chunks
        let data: Vec<u8> = (0..READ_CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&path, &data).await.unwrap();

        let (hash, size) = hash_file(&path).await.unwrap();
        assert_eq!(hash, hash_bytes(&data));
        assert_eq!(size, data.len() as u64);
    }

    #[tokio::test]
    async fn test_hash_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(hash_file(dir.path().join("missing")).await.is_err());
    }
}
