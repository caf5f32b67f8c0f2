use std::collections::BTreeMap;
use vertex_hashes::{ContentHasher, Hash};

/// An in-memory working copy of a named state tree, loaded from a snapshot.
/// Mutations stay local until the tree is handed back to [`StateStore::commit`].
#[derive(Clone, Debug)]
pub struct Tree {
    name: String,
    source_version: u64,
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    modified: bool,
}

impl Tree {
    pub(crate) fn new(name: String, source_version: u64, entries: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        Self { name, source_version, entries, modified: false }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn source_version(&self) -> u64 {
        self.source_version
    }

    pub(crate) fn entries(&self) -> &BTreeMap<Vec<u8>, Vec<u8>> {
        &self.entries
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(|v| v.as_slice())
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
        self.modified = true;
    }

    pub fn delete(&mut self, key: &[u8]) {
        if self.entries.remove(key).is_some() {
            self.modified = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// The authenticated root of the tree: a content hash over the sorted
    /// key/value pairs. `BTreeMap` iteration order makes this deterministic.
    pub fn hash(&self) -> Hash {
        let mut hasher = ContentHasher::new();
        hasher.write_var_bytes(self.name.as_bytes());
        for (k, v) in &self.entries {
            hasher.write_var_bytes(k).write_var_bytes(v);
        }
        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_hash_tracks_content() {
        let mut tree = Tree::new("balances".into(), 0, Default::default());
        let empty_hash = tree.hash();
        tree.put(b"alice".to_vec(), 100u64.to_le_bytes().to_vec());
        assert_ne!(tree.hash(), empty_hash);
        tree.delete(b"alice");
        assert_eq!(tree.hash(), empty_hash);
    }

    #[test]
    fn test_tree_hash_depends_on_name() {
        let a = Tree::new("a".into(), 0, Default::default());
        let b = Tree::new("b".into(), 0, Default::default());
        assert_ne!(a.hash(), b.hash());
    }
}
