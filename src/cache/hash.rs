//! Content hashing using blake3.

use std::path::Path;

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 16 hex chars are enough to tell artifacts apart in logs
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Hash an in-memory buffer.
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    ContentHash::new(*blake3::hash(bytes).as_bytes())
}

/// Hash a file's contents, `None` if it cannot be read.
pub async fn hash_file(path: &Path) -> Option<ContentHash> {
    tokio::fs::read(path).await.ok().map(|bytes| hash_bytes(&bytes))
}
