use std::{path::Path, sync::Arc};

pub type DB = rocksdb::DB;

/// Opens (or creates) a rocksdb instance at the given path.
pub fn open_db<P: AsRef<Path>>(path: P) -> Result<Arc<DB>, rocksdb::Error> {
    let mut opts = rocksdb::Options::default();
    opts.create_if_missing(true);
    Ok(Arc::new(DB::open(&opts, path)?))
}
