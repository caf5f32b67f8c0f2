use thiserror::Error;
use vertex_database::prelude::StoreError;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("no snapshot exists for version {0}")]
    UnknownVersion(u64),

    #[error("cannot commit an empty tree set")]
    EmptyCommit,

    #[error("all committed trees must originate from the same snapshot: got versions {0} and {1}")]
    MixedSourceVersions(u64, u64),
}

pub type StateResult<T> = std::result::Result<T, StateError>;
