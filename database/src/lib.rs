mod access;
mod cache;
mod db;
mod errors;
mod item;
mod key;
mod utils;
mod writer;

pub mod prelude {
    pub use super::access::CachedDbAccess;
    pub use super::cache::Cache;
    pub use super::db::{open_db, DB};
    pub use super::errors::{StoreError, StoreResult, StoreResultExtensions};
    pub use super::item::CachedDbItem;
    pub use super::key::DbKey;
    pub use super::utils::{create_temp_db, TempDbLifetime};
    pub use super::writer::{BatchDbWriter, DbWriter, DirectDbWriter};
}
