use thiserror::Error;
use vertex_hashes::Hash;

/// Block rejection reasons surfaced by `add_block`. Everything here is a
/// user-caused rejection: chain state is untouched when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("block already exists in chain")]
    AlreadyExists,

    #[error("block past is missing or exceeds the tip limit: {0:?}")]
    PastMissing(Vec<Hash>),

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("block timestamp {0} is too far into the future, maximum allowed is {1}")]
    FutureTimestamp(u64, u64),

    #[error("block timestamp {0} is less than a parent timestamp {1}")]
    InvalidTimestamp(u64, u64),

    #[error("mini block has invalid PoW")]
    InvalidPow,

    #[error("block size {0} is bigger than max permitted {1}")]
    InvalidSize(u64, u64),

    #[error("block transaction verification failed")]
    InvalidTx,

    #[error("double spend within block")]
    TxDoubleSpend,

    #[error("no divergence point found between the chain histories")]
    DivergenceNotFound,

    #[error("unexpected condition while processing the block")]
    Panic,
}

pub type BlockProcessResult<T> = std::result::Result<T, RuleError>;
