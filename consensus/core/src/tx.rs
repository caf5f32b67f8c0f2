use crate::{account::AccountKey, hashing};
use serde::{Deserialize, Serialize};
use vertex_hashes::Hash;

/// Represents the ID of a Vertex transaction
pub type TransactionId = Hash;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    /// Genesis-only allocation of the premine
    Premine,
    /// Registers a new account key in the balance tree
    Registration,
    /// The per-block miner reward transaction
    Coinbase,
    /// Ordinary payment
    Normal,
    /// Payment that destroys part of the moved value
    Burn,
    /// Smart-contract invocation or deployment
    Sc,
}

impl TransactionType {
    pub(crate) fn tag(&self) -> u8 {
        match self {
            TransactionType::Premine => 0,
            TransactionType::Registration => 1,
            TransactionType::Coinbase => 2,
            TransactionType::Normal => 3,
            TransactionType::Burn => 4,
            TransactionType::Sc => 5,
        }
    }
}

/// A premine allocation entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub account: AccountKey,
    pub amount: u64,
}

/// Operations a smart-contract payload can carry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScOp {
    /// Deploys contract code; the new SCID is the id of the carrying transaction
    Install { code: Vec<u8> },
    /// Writes a key in the contract's data tree
    Store { key: Vec<u8>, value: Vec<u8> },
    /// Removes a key from the contract's data tree
    Delete { key: Vec<u8> },
    /// Moves value from the payload source into the contract balance
    Deposit { amount: u64 },
}

/// A single transfer within a transaction. `scid` zero means an ordinary payment;
/// otherwise the payload addresses that contract's data tree. The proof `nonce`
/// is unique per payload and is what the double-spend rules track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub scid: Hash,
    pub nonce: Hash,
    pub source: AccountKey,
    pub destination: AccountKey,
    pub amount: u64,
    pub burn: u64,
    pub fee: u64,
    pub sc_ops: Vec<ScOp>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u8,
    pub tx_type: TransactionType,
    /// Chain height last seen by the composer, bounds the validity window
    pub height: u64,
    /// Registrant account for REGISTRATION, reward account for COINBASE/PREMINE
    pub miner_address: AccountKey,
    /// Premine allocations, PREMINE only
    pub allocations: Vec<Allocation>,
    pub payloads: Vec<Payload>,
}

impl Transaction {
    pub fn id(&self) -> TransactionId {
        hashing::tx_id(self)
    }

    pub fn is_premine(&self) -> bool {
        matches!(self.tx_type, TransactionType::Premine)
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(self.tx_type, TransactionType::Coinbase)
    }

    pub fn is_registration(&self) -> bool {
        matches!(self.tx_type, TransactionType::Registration)
    }

    /// Whether this type is allowed to travel through the mempool
    pub fn is_mineable(&self) -> bool {
        matches!(self.tx_type, TransactionType::Normal | TransactionType::Burn | TransactionType::Sc)
    }

    /// Whether the double-spend rules track this transaction's payload nonces
    pub fn carries_nonces(&self) -> bool {
        self.is_mineable()
    }

    pub fn fees(&self) -> u64 {
        self.payloads.iter().map(|p| p.fee).sum()
    }

    pub fn serialized_size(&self) -> u64 {
        bincode::serialized_size(self).expect("serde serialization of a transaction cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(nonce: u64) -> Transaction {
        Transaction {
            version: 1,
            tx_type: TransactionType::Normal,
            height: 5,
            miner_address: Default::default(),
            allocations: vec![],
            payloads: vec![Payload {
                scid: Default::default(),
                nonce: nonce.into(),
                source: 1.into(),
                destination: 2.into(),
                amount: 10,
                burn: 0,
                fee: 3,
                sc_ops: vec![],
            }],
        }
    }

    #[test]
    fn test_tx_id_changes_with_content() {
        let a = payment(1);
        let b = payment(2);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), payment(1).id());
    }

    #[test]
    fn test_fees_sum_over_payloads() {
        let mut tx = payment(1);
        tx.payloads.push(tx.payloads[0].clone());
        tx.payloads[1].nonce = 9.into();
        tx.payloads[1].fee = 4;
        assert_eq!(tx.fees(), 7);
    }
}
