mod hashers;

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

pub use hashers::*;

pub const HASH_SIZE: usize = 32;

/// A 32-byte object id. Block hashes, transaction ids, account keys and state
/// tree roots all share this representation. Ordering is lexicographic over
/// the raw bytes, which is what the linearizer's tiebreak relies on.
#[derive(PartialEq, Eq, Clone, Copy, Hash, Default, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    pub const fn as_bytes(self) -> [u8; HASH_SIZE] {
        self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut inner = [0u8; HASH_SIZE];
        inner.copy_from_slice(bytes);
        Hash(inner)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Embeds the word into the trailing bytes, big endian, so numeric order
    /// and byte order agree for small values. Handy for tests and fixtures.
    pub fn from_u64(word: u64) -> Self {
        let mut inner = [0u8; HASH_SIZE];
        inner[HASH_SIZE - 8..].copy_from_slice(&word.to_be_bytes());
        Hash(inner)
    }

    /// To be used for test purposes only
    pub fn new_unique() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self::from_u64(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&faster_hex::hex_string(&self.0))
    }
}

impl FromStr for Hash {
    type Err = faster_hex::Error;

    fn from_str(hash_str: &str) -> Result<Self, Self::Err> {
        if hash_str.len() != HASH_SIZE * 2 {
            return Err(faster_hex::Error::InvalidLength(hash_str.len()));
        }
        let mut inner = [0u8; HASH_SIZE];
        faster_hex::hex_decode(hash_str.as_bytes(), &mut inner)?;
        Ok(Hash(inner))
    }
}

impl From<u64> for Hash {
    fn from(word: u64) -> Self {
        Self::from_u64(word)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let mut bytes = [0u8; HASH_SIZE];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (i * 7) as u8;
        }
        let hash = Hash::from_bytes(bytes);
        let encoded = hash.to_string();
        assert_eq!(encoded.len(), HASH_SIZE * 2);
        assert_eq!(Hash::from_str(&encoded).unwrap(), hash);

        // Odd, short and non-hex inputs are all rejected
        assert!(Hash::from_str(&encoded[1..]).is_err());
        assert!(Hash::from_str("ff00").is_err());
        assert!(Hash::from_str(&"zz".repeat(HASH_SIZE)).is_err());
    }

    #[test]
    fn test_zero_and_ordering() {
        assert!(Hash::default().is_zero());
        assert!(!Hash::from_u64(1).is_zero());
        // Byte order agrees with numeric order for word-embedded hashes
        assert!(Hash::from_u64(3) < Hash::from_u64(200));
        assert!(Hash::from_u64(255) < Hash::from_u64(256));
    }

    #[test]
    fn test_new_unique_never_repeats() {
        let a = Hash::new_unique();
        let b = Hash::new_unique();
        assert_ne!(a, b);
    }
}
