use crate::{
    errors::{StateError, StateResult},
    tree::Tree,
};
use parking_lot::Mutex;
use rocksdb::WriteBatch;
use std::{
    collections::BTreeMap,
    sync::Arc,
};
use vertex_database::prelude::{BatchDbWriter, CachedDbAccess, CachedDbItem, StoreResultExtensions, DB};

/// Latest committed version (0 when the store is fresh)
const LATEST_KEY: &[u8] = b"state-latest";
/// Per-version index: tree name -> version whose commit last wrote that tree
const INDEX_PREFIX: &[u8] = b"state-index";
/// Tree contents keyed by (content version, tree name)
const DATA_PREFIX: &[u8] = b"state-data";

const INDEX_CACHE_SIZE: u64 = 512;
const DATA_CACHE_SIZE: u64 = 64;

type TreeIndex = BTreeMap<String, u64>;
type TreeEntries = Vec<(Vec<u8>, Vec<u8>)>;

#[derive(Clone, PartialEq, Eq, Hash)]
struct VersionKey([u8; 8]);

impl From<u64> for VersionKey {
    fn from(version: u64) -> Self {
        Self(version.to_be_bytes())
    }
}

impl AsRef<[u8]> for VersionKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct TreeDataKey(Vec<u8>);

impl TreeDataKey {
    fn new(version: u64, name: &str) -> Self {
        let mut bytes = Vec::with_capacity(8 + name.len());
        bytes.extend_from_slice(&version.to_be_bytes());
        bytes.extend_from_slice(name.as_bytes());
        Self(bytes)
    }
}

impl AsRef<[u8]> for TreeDataKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The versioned tree store. Snapshots are addressed by version; version 0
/// resolves to the latest snapshot (the empty snapshot on a fresh store).
#[derive(Clone)]
pub struct StateStore {
    db: Arc<DB>,
    latest: Arc<Mutex<CachedDbItem<u64>>>,
    index_access: CachedDbAccess<VersionKey, Arc<TreeIndex>>,
    data_access: CachedDbAccess<TreeDataKey, Arc<TreeEntries>>,
}

impl StateStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self {
            db: db.clone(),
            latest: Arc::new(Mutex::new(CachedDbItem::new(db.clone(), LATEST_KEY))),
            index_access: CachedDbAccess::new(db.clone(), INDEX_CACHE_SIZE, INDEX_PREFIX),
            data_access: CachedDbAccess::new(db, DATA_CACHE_SIZE, DATA_PREFIX),
        }
    }

    /// The highest version ever committed, 0 for a fresh store
    pub fn latest_version(&self) -> u64 {
        self.latest.lock().read().unwrap_option().unwrap_or(0)
    }

    /// Whether any snapshot has ever been committed
    pub fn is_initialized(&self) -> bool {
        self.latest_version() > 0
    }

    /// Loads the snapshot at `version`. Version 0 is an alias for the latest snapshot.
    pub fn load_snapshot(&self, version: u64) -> StateResult<Snapshot> {
        let latest = self.latest_version();
        let version = if version == 0 { latest } else { version };
        if version > latest {
            return Err(StateError::UnknownVersion(version));
        }
        let index = if version == 0 {
            Arc::new(TreeIndex::new()) // Fresh store, nothing committed yet
        } else {
            self.index_access.read(version.into())?
        };
        Ok(Snapshot { version, index, data_access: self.data_access.clone() })
    }

    /// Atomically commits the given trees, all of which must have been loaded from
    /// the same snapshot `v`. Returns the new snapshot version `v + 1`.
    ///
    /// Tying the committed version to the source version (rather than to a global
    /// counter) makes replay deterministic: re-executing a slot after a rewind or a
    /// reorg rewrites the same version it produced the first time.
    pub fn commit(&self, trees: Vec<Tree>) -> StateResult<u64> {
        let source_version = match trees.first() {
            Some(tree) => tree.source_version(),
            None => return Err(StateError::EmptyCommit),
        };
        if let Some(tree) = trees.iter().find(|t| t.source_version() != source_version) {
            return Err(StateError::MixedSourceVersions(source_version, tree.source_version()));
        }

        let mut latest = self.latest.lock();
        let new_version = source_version + 1;

        let mut index: TreeIndex = if source_version == 0 {
            TreeIndex::new()
        } else {
            (*self.index_access.read(source_version.into())?).clone()
        };

        let mut batch = WriteBatch::default();
        for tree in &trees {
            let entries: TreeEntries = tree.entries().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            self.data_access.write(BatchDbWriter::new(&mut batch), TreeDataKey::new(new_version, tree.name()), Arc::new(entries))?;
            index.insert(tree.name().to_string(), new_version);
        }
        self.index_access.write(BatchDbWriter::new(&mut batch), new_version.into(), Arc::new(index))?;

        let current_latest = latest.read().unwrap_option().unwrap_or(0);
        if new_version > current_latest {
            latest.write(BatchDbWriter::new(&mut batch), &new_version)?;
        }
        self.db.write(batch).map_err(vertex_database::prelude::StoreError::from)?;
        Ok(new_version)
    }

}

/// A read-only view of the store at a fixed version
pub struct Snapshot {
    version: u64,
    index: Arc<TreeIndex>,
    data_access: CachedDbAccess<TreeDataKey, Arc<TreeEntries>>,
}

impl Snapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Fetches the named tree as of this snapshot. A name this snapshot has never
    /// seen yields a fresh empty tree (so new contracts can simply start writing).
    pub fn get_tree(&self, name: &str) -> StateResult<Tree> {
        match self.index.get(name) {
            Some(&content_version) => {
                let entries = self.data_access.read(TreeDataKey::new(content_version, name))?;
                Ok(Tree::new(name.to_string(), self.version, entries.iter().cloned().collect()))
            }
            None => Ok(Tree::new(name.to_string(), self.version, BTreeMap::new())),
        }
    }

    pub fn has_tree(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vertex_database::prelude::create_temp_db;

    #[test]
    fn test_commit_chain() {
        let (_lifetime, db) = create_temp_db();
        let store = StateStore::new(db);
        assert!(!store.is_initialized());

        let ss = store.load_snapshot(0).unwrap();
        assert_eq!(ss.version(), 0);
        let mut balances = ss.get_tree("balances").unwrap();
        balances.put(b"alice".to_vec(), vec![1]);
        let v1 = store.commit(vec![balances]).unwrap();
        assert_eq!(v1, 1);
        assert_eq!(store.latest_version(), 1);

        // Version 0 aliases latest
        let ss = store.load_snapshot(0).unwrap();
        assert_eq!(ss.version(), 1);
        let balances = ss.get_tree("balances").unwrap();
        assert_eq!(balances.get(b"alice"), Some(&[1u8][..]));

        // Trees not part of a commit keep their previous content
        let mut other = ss.get_tree("scmeta").unwrap();
        other.put(b"k".to_vec(), vec![9]);
        let v2 = store.commit(vec![other]).unwrap();
        assert_eq!(v2, 2);
        let ss2 = store.load_snapshot(2).unwrap();
        assert_eq!(ss2.get_tree("balances").unwrap().get(b"alice"), Some(&[1u8][..]));
        assert_eq!(ss2.get_tree("scmeta").unwrap().get(b"k"), Some(&[9u8][..]));
    }

    #[test]
    fn test_replay_rewrites_same_version() {
        let (_lifetime, db) = create_temp_db();
        let store = StateStore::new(db);

        let ss = store.load_snapshot(0).unwrap();
        let mut t = ss.get_tree("balances").unwrap();
        t.put(b"a".to_vec(), vec![1]);
        assert_eq!(store.commit(vec![t]).unwrap(), 1);

        let ss1 = store.load_snapshot(1).unwrap();
        let mut t = ss1.get_tree("balances").unwrap();
        t.put(b"b".to_vec(), vec![2]);
        assert_eq!(store.commit(vec![t]).unwrap(), 2);

        // Re-commit off snapshot 1 (a reorged slot): same version, new content
        let ss1 = store.load_snapshot(1).unwrap();
        let mut t = ss1.get_tree("balances").unwrap();
        t.put(b"c".to_vec(), vec![3]);
        assert_eq!(store.commit(vec![t]).unwrap(), 2);
        let ss2 = store.load_snapshot(2).unwrap();
        let balances = ss2.get_tree("balances").unwrap();
        assert!(balances.get(b"c").is_some());
        assert!(balances.get(b"b").is_none());

        // Snapshots below the rewrite point remain intact
        let ss1 = store.load_snapshot(1).unwrap();
        assert_eq!(ss1.get_tree("balances").unwrap().len(), 1);
    }

    #[test]
    fn test_mixed_sources_rejected() {
        let (_lifetime, db) = create_temp_db();
        let store = StateStore::new(db);
        let ss = store.load_snapshot(0).unwrap();
        let mut t = ss.get_tree("a").unwrap();
        t.put(b"x".to_vec(), vec![1]);
        store.commit(vec![t]).unwrap();

        let t0 = store.load_snapshot(0).unwrap().get_tree("a").unwrap();
        let ss0 = Snapshot { version: 0, index: Arc::new(TreeIndex::new()), data_access: store.data_access.clone() };
        let t1 = ss0.get_tree("b").unwrap();
        assert!(matches!(store.commit(vec![t0, t1]), Err(StateError::MixedSourceVersions(_, _))));
        assert!(matches!(store.commit(vec![]), Err(StateError::EmptyCommit)));
    }
}
