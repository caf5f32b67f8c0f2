use crate::{
    model::stores::{block_store::BlockStoreReader, block_store::DbBlockStore, transactions::DbTransactionsStore},
    processes::dag::DagIndex,
};
use std::{
    collections::HashSet,
    sync::Arc,
};
use vertex_consensus_core::{
    account::AccountKey,
    errors::{TxResult, TxRuleError},
    tx::{Transaction, TransactionType},
    verifier::ProofVerifier,
    BlockHashSet, ForkVersion,
};
use vertex_hashes::Hash;

/// The default proof verifier: checks everything about a transaction that does
/// not require key material. Ring confidentiality and zero-knowledge proofs
/// are verified by an external implementation of [`ProofVerifier`] in
/// production deployments.
pub struct StructuralProofVerifier;

impl ProofVerifier for StructuralProofVerifier {
    fn verify_transaction(&self, tx: &Transaction, _hf_version: ForkVersion) -> TxResult<()> {
        match tx.tx_type {
            TransactionType::Premine | TransactionType::Coinbase => Err(TxRuleError::NotMineable),
            TransactionType::Registration => {
                if !tx.payloads.is_empty() || tx.miner_address.is_zero() {
                    return Err(TxRuleError::MalformedRegistration);
                }
                Ok(())
            }
            TransactionType::Normal | TransactionType::Burn | TransactionType::Sc => {
                if tx.payloads.is_empty() {
                    return Err(TxRuleError::NoPayloads);
                }
                let mut nonces: HashSet<Hash> = HashSet::with_capacity(tx.payloads.len());
                for payload in &tx.payloads {
                    if !nonces.insert(payload.nonce) {
                        return Err(TxRuleError::DuplicateNonceInTx);
                    }
                }
                Ok(())
            }
        }
    }
}

/// Per-transaction validation against the chain: height-claim window, nonce
/// replay across the blocks reachable from the tips, fee schedule, and the
/// delegated cryptographic verification.
pub struct TransactionValidator {
    dag: DagIndex,
    block_store: Arc<DbBlockStore>,
    tx_store: Arc<DbTransactionsStore>,
    proof_verifier: Arc<dyn ProofVerifier>,
    tx_validity_height: u64,
    fee_per_byte: u64,
}

impl TransactionValidator {
    pub fn new(
        dag: DagIndex,
        block_store: Arc<DbBlockStore>,
        tx_store: Arc<DbTransactionsStore>,
        proof_verifier: Arc<dyn ProofVerifier>,
        tx_validity_height: u64,
        fee_per_byte: u64,
    ) -> Self {
        Self { dag, block_store, tx_store, proof_verifier, tx_validity_height, fee_per_byte }
    }

    /// The fee a transaction of the given serialized size must provide
    pub fn calculate_tx_fee(&self, _hf_version: ForkVersion, size: u64) -> u64 {
        size * self.fee_per_byte
    }

    /// Full verification of a mempool-eligible transaction
    pub fn verify_transaction(&self, tx: &Transaction, hf_version: ForkVersion) -> TxResult<()> {
        if !tx.is_mineable() && !tx.is_registration() {
            return Err(TxRuleError::NotMineable);
        }
        self.proof_verifier.verify_transaction(tx, hf_version)
    }

    /// Verifies the transaction's height claim against the tips and its proof
    /// nonces against every block reachable from the tips within the nonce
    /// window. Registrations carry no nonces and pass trivially.
    pub fn verify_nonce_against_tips(&self, tx: &Transaction, tips: &[Hash], _hf_version: ForkVersion) -> TxResult<()> {
        if !tx.carries_nonces() {
            return Ok(());
        }

        let mut tip_height = 0;
        for tip in tips {
            tip_height = tip_height.max(self.dag.height_at(*tip).map_err(|_| TxRuleError::Expired(tx.height, 0))?);
        }
        if tx.height > tip_height {
            return Err(TxRuleError::HeightAhead(tx.height, tip_height));
        }
        if tip_height - tx.height > self.tx_validity_height {
            return Err(TxRuleError::Expired(tx.height, tip_height));
        }

        let nonces: HashSet<Hash> = tx.payloads.iter().map(|p| p.nonce).collect();
        let floor = tip_height.saturating_sub(2 * self.tx_validity_height);

        // Backward walk over every block reachable from the tips down to the
        // window floor, comparing the stored payload nonces
        let mut visited: BlockHashSet = tips.iter().copied().collect();
        let mut stack: Vec<Hash> = tips.to_vec();
        while let Some(hash) = stack.pop() {
            let block = match self.block_store.get(hash) {
                Ok(block) => block,
                Err(_) => continue, // Unstored past is below the pruning horizon
            };
            if block.height < floor {
                continue;
            }
            for txid in &block.tx_hashes {
                if let Ok(mined) = self.tx_store.get(*txid) {
                    if let Some(payload) = mined.payloads.iter().find(|p| nonces.contains(&p.nonce)) {
                        return Err(TxRuleError::NonceAlreadyConsumed(payload.nonce));
                    }
                }
            }
            for parent in &block.tips {
                if visited.insert(*parent) {
                    stack.push(*parent);
                }
            }
        }
        Ok(())
    }
}

/// Cross-transaction sanity accumulator for a block body: no two transactions
/// may spend from the same source account, mirroring the one-tx-per-account
/// nonce semantics of the balance proofs.
#[derive(Default)]
pub struct BlockBodyAccumulator {
    sources: HashSet<AccountKey>,
}

impl BlockBodyAccumulator {
    pub fn check(&self, tx: &Transaction) -> TxResult<()> {
        if tx.payloads.iter().any(|p| self.sources.contains(&p.source)) {
            return Err(TxRuleError::ConflictInBlock);
        }
        Ok(())
    }

    pub fn record(&mut self, tx: &Transaction) {
        self.sources.extend(tx.payloads.iter().map(|p| p.source));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vertex_consensus_core::tx::Payload;

    fn payment(source: u64, nonce: u64) -> Transaction {
        Transaction {
            version: 1,
            tx_type: TransactionType::Normal,
            height: 0,
            miner_address: Default::default(),
            allocations: vec![],
            payloads: vec![Payload {
                scid: Default::default(),
                nonce: nonce.into(),
                source: source.into(),
                destination: 2.into(),
                amount: 1,
                burn: 0,
                fee: 1,
                sc_ops: vec![],
            }],
        }
    }

    #[test]
    fn test_structural_verifier() {
        let verifier = StructuralProofVerifier;
        assert!(verifier.verify_transaction(&payment(1, 1), 1).is_ok());

        let mut dup = payment(1, 1);
        dup.payloads.push(dup.payloads[0].clone());
        assert_eq!(verifier.verify_transaction(&dup, 1), Err(TxRuleError::DuplicateNonceInTx));

        let mut empty = payment(1, 1);
        empty.payloads.clear();
        assert_eq!(verifier.verify_transaction(&empty, 1), Err(TxRuleError::NoPayloads));

        let mut coinbase = payment(1, 1);
        coinbase.tx_type = TransactionType::Coinbase;
        assert_eq!(verifier.verify_transaction(&coinbase, 1), Err(TxRuleError::NotMineable));
    }

    #[test]
    fn test_body_accumulator_rejects_shared_source() {
        let mut acc = BlockBodyAccumulator::default();
        let a = payment(1, 1);
        let b = payment(1, 2);
        let c = payment(3, 3);

        acc.check(&a).unwrap();
        acc.record(&a);
        assert_eq!(acc.check(&b), Err(TxRuleError::ConflictInBlock));
        acc.check(&c).unwrap();
    }
}
