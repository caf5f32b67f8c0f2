use crate::tx::TransactionId;
use thiserror::Error;
use vertex_hashes::Hash;

/// Rejection reasons for a single transaction, produced by nonce/proof
/// verification and by the mempool admission checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxRuleError {
    #[error("transaction carries no payloads")]
    NoPayloads,

    #[error("coinbase or premine transactions cannot be carried as block payloads")]
    NotMineable,

    #[error("transaction {0} is too large: {1} bytes where the limit is {2}")]
    TooBig(TransactionId, u64, u64),

    #[error("TX rejected, fee too low: provided fee {0} where calculated fee is {1}")]
    FeeTooLow(u64, u64),

    #[error("duplicate proof nonce within transaction")]
    DuplicateNonceInTx,

    #[error("proof nonce {0} was already consumed by a recent block")]
    NonceAlreadyConsumed(Hash),

    #[error("transaction height claim {0} is ahead of tip height {1}")]
    HeightAhead(u64, u64),

    #[error("transaction height claim {0} expired: tip height is {1}")]
    Expired(u64, u64),

    #[error("address already registered")]
    AlreadyRegistered,

    #[error("transaction spends from an account another transaction in the block already spends from")]
    ConflictInBlock,

    #[error("zero-amount registration carries payloads")]
    MalformedRegistration,

    #[error("transaction already in mempool")]
    DuplicateInPool,

    #[error("transaction already mined in some block")]
    AlreadyMined,

    #[error("registration for address is already pending")]
    RegistrationPending,

    #[error("transaction rejected by pool")]
    PoolRejected,
}

pub type TxResult<T> = std::result::Result<T, TxRuleError>;
