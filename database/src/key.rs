use std::{
    fmt::{Debug, Display},
    str,
};

/// Separates the bucket prefix from the record key inside a composed path
const SEP: u8 = b'/';

/// A fully composed DB path: `<prefix>/<key>`. Buckets share one rocksdb
/// instance, so every store access goes through a prefixed key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DbKey {
    path: Vec<u8>,
    key_start: usize,
}

impl DbKey {
    pub fn new<TKey>(prefix: &[u8], key: TKey) -> Self
    where
        TKey: AsRef<[u8]>,
    {
        let key = key.as_ref();
        let mut path = Vec::with_capacity(prefix.len() + 1 + key.len());
        path.extend_from_slice(prefix);
        path.push(SEP);
        path.extend_from_slice(key);
        Self { path, key_start: prefix.len() + 1 }
    }

    pub fn prefix_only(prefix: &[u8]) -> Self {
        Self::new(prefix, [])
    }
}

impl AsRef<[u8]> for DbKey {
    fn as_ref(&self) -> &[u8] {
        &self.path
    }
}

impl Display for DbKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (prefix, key) = self.path.split_at(self.key_start);
        // Prefixes are ASCII bucket names in practice; anything else gets hexed.
        // Keys are binary (hashes, indexes) and always print as hex.
        match str::from_utf8(prefix) {
            Ok(name) => f.write_str(name)?,
            Err(_) => {
                f.write_str(&faster_hex::hex_string(&prefix[..prefix.len() - 1]))?;
                f.write_str("/")?;
            }
        }
        f.write_str(&faster_hex::hex_string(key))
    }
}

impl Debug for DbKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vertex_hashes::Hash;

    #[test]
    fn test_path_layout() {
        let key = DbKey::new(b"topo-records", [0xABu8, 0xCD]);
        assert_eq!(key.as_ref(), b"topo-records/\xAB\xCD");
        assert_eq!(DbKey::prefix_only(b"topo-records").as_ref(), b"topo-records/");
    }

    #[test]
    fn test_display_forms() {
        let readable = DbKey::new(b"block-records", Hash::from_u64(2));
        let shown = readable.to_string();
        assert!(shown.starts_with("block-records/"));
        assert!(shown.ends_with("02"));

        // A non-UTF-8 prefix degrades to hex rather than garbling the output
        let binary = DbKey::new(&[0xFE, 0xFF], Hash::from_u64(2));
        assert!(binary.to_string().starts_with("feff/"));
    }
}
