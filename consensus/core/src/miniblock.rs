use crate::hashing;
use serde::{Deserialize, Serialize};
use vertex_hashes::{ContentHasher, Hash, HasherExtensions};

/// A proof-of-work artifact mined on top of a block-in-progress. A full block
/// aggregates one or more mini blocks; their PoW is checked by an external
/// verifier while the consensus core checks only their linkage to the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniBlock {
    pub version: u8,
    pub height: u64,
    pub timestamp: u64,
    /// Hash of the miner key this mini block rewards
    pub key_hash: Hash,
    /// Commits the mini block to the past (tips) of the block carrying it
    pub past_digest: Hash,
    pub nonce: u64,
}

impl MiniBlock {
    pub fn hash(&self) -> Hash {
        hashing::miniblock_hash(self)
    }
}

/// The digest every mini block of a block must commit to
pub fn past_digest(tips: &[Hash]) -> Hash {
    let mut hasher = ContentHasher::new();
    hasher.write_hashes(tips);
    hasher.finalize()
}
