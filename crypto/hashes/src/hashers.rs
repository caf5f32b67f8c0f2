use crate::Hash;
use sha3::{Digest, Sha3_256};

/// An incremental SHA3-256 content hasher. All consensus object ids
/// (block hash, transaction id, state tree roots) are produced by it.
#[derive(Clone)]
pub struct ContentHasher(Sha3_256);

impl ContentHasher {
    pub fn new() -> Self {
        Self(Sha3_256::new())
    }

    pub fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self {
        self.0.update(data.as_ref());
        self
    }

    /// Writes a length-prefixed byte string, so that consecutive variable
    /// sized fields cannot be reinterpreted as each other.
    pub fn write_var_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.update((data.len() as u64).to_le_bytes()).update(data)
    }

    pub fn finalize(self) -> Hash {
        let bytes = self.0.finalize();
        Hash::from_slice(&bytes)
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

pub trait HasherExtensions {
    fn write_len(&mut self, len: usize) -> &mut Self;
    fn write_u8(&mut self, v: u8) -> &mut Self;
    fn write_u64(&mut self, v: u64) -> &mut Self;
    fn write_hash(&mut self, h: Hash) -> &mut Self;
    fn write_hashes(&mut self, hashes: &[Hash]) -> &mut Self;
}

impl HasherExtensions for ContentHasher {
    #[inline(always)]
    fn write_len(&mut self, len: usize) -> &mut Self {
        self.update((len as u64).to_le_bytes())
    }

    #[inline(always)]
    fn write_u8(&mut self, v: u8) -> &mut Self {
        self.update([v])
    }

    #[inline(always)]
    fn write_u64(&mut self, v: u64) -> &mut Self {
        self.update(v.to_le_bytes())
    }

    #[inline(always)]
    fn write_hash(&mut self, h: Hash) -> &mut Self {
        self.update(h)
    }

    #[inline(always)]
    fn write_hashes(&mut self, hashes: &[Hash]) -> &mut Self {
        self.write_len(hashes.len());
        for h in hashes {
            self.update(h);
        }
        self
    }
}

/// One-shot convenience over [`ContentHasher`]
pub fn hash_of(data: &[u8]) -> Hash {
    let mut hasher = ContentHasher::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hasher_determinism() {
        let mut a = ContentHasher::new();
        a.write_u64(42).write_hash(Hash::from_u64(7));
        let mut b = ContentHasher::new();
        b.write_u64(42).write_hash(Hash::from_u64(7));
        assert_eq!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_var_bytes_framing() {
        // ["ab", "c"] and ["a", "bc"] must not collide
        let mut a = ContentHasher::new();
        a.write_var_bytes(b"ab").write_var_bytes(b"c");
        let mut b = ContentHasher::new();
        b.write_var_bytes(b"a").write_var_bytes(b"bc");
        assert_ne!(a.finalize(), b.finalize());
    }
}
