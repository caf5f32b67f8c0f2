use crate::prelude::{open_db, DB};
use std::sync::Arc;
use tempfile::TempDir;

/// Keeps the temp directory alive for as long as the DB is in use.
/// Dropping it deletes the directory and everything under it.
pub struct TempDbLifetime {
    _tempdir: TempDir,
}

/// Creates a DB within a temp directory under `<OS SPECIFIC TEMP DIR>/vertex-rocksdb`.
/// Callers must keep the `TempDbLifetime` guard for as long as they wish the DB to exist.
pub fn create_temp_db() -> (TempDbLifetime, Arc<DB>) {
    let global_tempdir = std::env::temp_dir();
    let vertex_tempdir = global_tempdir.join("vertex-rocksdb");
    std::fs::create_dir_all(vertex_tempdir.as_path()).expect("creating the temp dir parents should succeed");
    let db_tempdir = tempfile::tempdir_in(vertex_tempdir.as_path()).expect("creating a temp dir should succeed");
    let db = open_db(db_tempdir.path()).expect("opening a fresh rocksdb should succeed");
    (TempDbLifetime { _tempdir: db_tempdir }, db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::{CachedDbAccess, DirectDbWriter};
    use vertex_hashes::Hash;

    #[test]
    fn test_access_roundtrip() {
        let (_lifetime, db) = create_temp_db();
        let access: CachedDbAccess<Hash, u64> = CachedDbAccess::new(db.clone(), 4, b"test".to_vec());
        access.write(DirectDbWriter::new(&db), 7.into(), 42).unwrap();
        assert_eq!(access.read(7.into()).unwrap(), 42);
        assert!(access.has(7.into()).unwrap());
        assert!(access.read(8.into()).is_err());
        access.delete(DirectDbWriter::new(&db), 7.into()).unwrap();
        assert!(!access.has(7.into()).unwrap());
    }
}
