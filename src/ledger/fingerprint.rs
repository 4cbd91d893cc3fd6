//! Content fingerprints (SHA-256, lower hex)

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// Fingerprint of an in-memory buffer
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Fingerprint of a file's bytes, streamed
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
