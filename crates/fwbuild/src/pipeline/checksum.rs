//! Streaming SHA-256 over firmware images.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const ALGORITHM: &str = "sha256";

const CHUNK_SIZE: usize = 64 * 1024;

/// Size and digest of one file, taken from the same read pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub size: u64,
    /// Lowercase hex.
    pub sha256: String,
}

/// Lowercase hex SHA-256 of the file at `path`.
pub fn sha256_file(path: &Path) -> Result<String> {
    Ok(digest_file(path)?.sha256)
}

pub fn digest_file(path: &Path) -> Result<FileDigest> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut size: u64 = 0;
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok(FileDigest {
        size,
        sha256: hex::encode(hasher.finalize()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_known_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.bin");
        fs::write(&empty, b"").unwrap();
        assert_eq!(
            sha256_file(&empty).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        let abc = dir.path().join("abc.bin");
        fs::write(&abc, b"abc").unwrap();
        assert_eq!(
            sha256_file(&abc).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_multi_chunk_matches_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.bin");
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        let digest = digest_file(&path).unwrap();
        assert_eq!(digest.size, data.len() as u64);
        assert_eq!(digest.sha256, hex::encode(Sha256::digest(&data)));
        assert_eq!(digest, digest_file(&path).unwrap());
    }

    #[test]
    fn test_single_byte_change_changes_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.bin");
        let mut data = vec![0xA5u8; 120_000];
        fs::write(&path, &data).unwrap();
        let before = sha256_file(&path).unwrap();

        data[60_000] ^= 0x01;
        fs::write(&path, &data).unwrap();
        assert_ne!(before, sha256_file(&path).unwrap());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = sha256_file(&dir.path().join("missing.bin")).unwrap_err();
        assert!(err.to_string().contains("missing.bin"));
    }

    #[test]
    fn test_lowercase_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bin");
        fs::write(&path, b"firmware").unwrap();
        let hex = sha256_file(&path).unwrap();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }
}
