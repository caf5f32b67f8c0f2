use serde::{Deserialize, Serialize};
use vertex_hashes::Hash;

/// An account is addressed by the hash of its public key. Key material and the
/// encryption of balances are handled by external crypto collaborators; the
/// consensus core only moves plaintext records between state trees.
pub type AccountKey = Hash;

/// The balance-tree record of a registered account
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub balance: u64,
    pub registered_height: u64,
}

/// The SC_META record of a deployed contract. `data_hash` is refreshed on every
/// commit that touched the contract's data tree, interlinking the tree roots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScMetaRecord {
    pub data_hash: Hash,
    pub code_hash: Hash,
}

/// Key of a contract's metadata record within the SC_META tree
pub fn sc_meta_key(scid: Hash) -> [u8; 32] {
    scid.as_bytes()
}

/// A contract's data tree is named by the raw SCID bytes (hex, so tree names stay printable)
pub fn sc_tree_name(scid: Hash) -> String {
    scid.to_string()
}
