//! SHA-256 calculation for artifact verification.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use modelup_schema::Sha256Digest;
use sha2::{Digest, Sha256};

use crate::error::{UpdateError, UpdateResult};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the SHA-256 of a file by streaming it in fixed-size blocks.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> io::Result<Sha256Digest> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let count = file.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    let bytes: [u8; 32] = hasher.finalize().into();
    Ok(Sha256Digest::from_bytes(&bytes))
}

/// Hash a file on the blocking pool so large artifacts don't stall the runtime.
///
/// # Errors
///
/// Returns [`UpdateError::Io`] if the file cannot be read.
pub async fn sha256_file_async(path: &Path) -> UpdateResult<Sha256Digest> {
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || sha256_file(&owned))
        .await
        .map_err(|e| UpdateError::io("Checksum task failed for", path, io::Error::other(e)))?
        .map_err(|e| UpdateError::io("Failed to hash", path, e))
}

/// Hash an in-memory buffer.
pub fn sha256_bytes(data: &[u8]) -> Sha256Digest {
    let bytes: [u8; 32] = Sha256::digest(data).into();
    Sha256Digest::from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_sha256_file_known_value() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("test.txt");
        File::create(&file_path)
            .unwrap()
            .write_all(b"hello world")
            .unwrap();

        // SHA-256 of "hello world"
        assert_eq!(
            sha256_file(&file_path).unwrap().as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha256_empty_file() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("empty.bin");
        File::create(&file_path).unwrap();

        assert_eq!(
            sha256_file(&file_path).unwrap().as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_file_larger_than_buffer_matches_bytes() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("large.bin");
        let data = vec![0xABu8; 3 * BUFFER_SIZE + 17];
        std::fs::write(&file_path, &data).unwrap();

        assert_eq!(sha256_file(&file_path).unwrap(), sha256_bytes(&data));
    }

    #[tokio::test]
    async fn test_sha256_file_async_missing_file() {
        let result = sha256_file_async(Path::new("/nonexistent/model.bin")).await;
        assert!(matches!(result, Err(UpdateError::Io { .. })));
    }
}
