//! End-to-end chain scenarios driven through the public `Consensus` API.

use std::time::Duration;
use vertex_consensus::{
    consensus::{test_consensus::TestConsensus, Consensus},
    errors::RuleError,
};
use vertex_consensus_core::{
    block::CompleteBlock,
    config::{params::SIMNET_PARAMS, Config},
    errors::TxRuleError,
};
use vertex_core::{log::try_init_logger, time::unix_now};
use vertex_database::prelude::create_temp_db;
use vertex_hashes::Hash;

#[test]
fn test_genesis_seeding_and_reload() {
    try_init_logger("info");
    let (_lifetime, db) = create_temp_db();

    let consensus = Consensus::with_defaults(Config::new(SIMNET_PARAMS).with_simulator(), db.clone()).unwrap();
    let genesis_hash = consensus.get_topo_record(0).unwrap().block_id;
    assert_eq!(consensus.get_height(), 0);
    assert_eq!(consensus.get_tips(), vec![genesis_hash]);
    assert_eq!(consensus.get_topo_record(0).unwrap().height, 0);
    assert_eq!(consensus.get_topo_count(), 1);
    assert!(consensus.is_address_registered(SIMNET_PARAMS.dev_address));
    consensus.shutdown();
    drop(consensus);

    // A second start must not re-seed: the chain loads from disk
    let consensus = Consensus::with_defaults(Config::new(SIMNET_PARAMS).with_simulator(), db).unwrap();
    assert_eq!(consensus.get_topo_count(), 1);
    assert_eq!(consensus.get_height(), 0);
    assert_eq!(consensus.get_tips(), vec![genesis_hash]);
    consensus.shutdown();
}

#[test]
fn test_straight_line_growth() {
    try_init_logger("info");
    let tc = TestConsensus::new();

    let mut prev_timestamp = 0;
    for expected_height in 1..=10 {
        let hash = tc.add_empty_block().unwrap();
        // P1: every accepted block sits one above its single tip
        assert_eq!(tc.get_block_height(hash).unwrap(), expected_height);
        // P8: timestamps are monotone along tip edges
        let timestamp = tc.get_block(hash).unwrap().timestamp;
        assert!(timestamp >= prev_timestamp);
        prev_timestamp = timestamp;
    }

    assert_eq!(tc.get_height(), 10);
    assert_eq!(tc.get_tips().len(), 1);
    assert_eq!(tc.get_topo_count(), 11);

    // P2: per-slot state versions are strictly monotonic
    let mut last_version = 0;
    for slot in 0..tc.get_topo_count() {
        let record = tc.get_topo_record(slot).unwrap();
        assert!(record.state_version > last_version, "slot {slot} version {} not above {last_version}", record.state_version);
        last_version = record.state_version;
    }
}

#[test]
fn test_two_tip_merge_and_side_block() {
    try_init_logger("info");
    let tc = TestConsensus::new();

    for _ in 0..4 {
        tc.add_empty_block().unwrap();
    }
    let parent = tc.get_top_id();
    assert_eq!(tc.get_block_height(parent).unwrap(), 4);

    // Two siblings race at height 5
    let a = tc.add_block_at(vec![parent], vec![]).unwrap();
    let b = tc.add_block_at(vec![parent], vec![]).unwrap();
    assert_eq!(tc.get_height(), 5);
    assert_eq!(tc.get_tips().len(), 2);
    // The second sibling did not extend the height, so it has no slot yet
    assert!(tc.is_block_topological_order(a));
    assert!(!tc.is_block_topological_order(b));

    // The merge block orders both and is itself no side block
    let c = tc.add_block_at(vec![a, b], vec![]).unwrap();
    assert_eq!(tc.get_height(), 6);
    assert_eq!(tc.get_tips(), vec![c]);
    assert!(!tc.is_side_block(c));
    assert!(tc.is_block_topological_order(a));
    assert!(tc.is_block_topological_order(b));

    // P3/P7: exactly one of the two siblings lost the race, per the record rule
    let side = if tc.is_side_block(a) { a } else { b };
    let main = if side == a { b } else { a };
    assert!(tc.is_side_block(side));
    assert!(!tc.is_side_block(main));
    let side_slot = tc
        .consensus()
        .get_topo_record(tc.get_topo_count() - 2)
        .map(|record| if record.block_id == side { tc.get_topo_count() - 2 } else { tc.get_topo_count() - 3 })
        .unwrap();
    let side_record = tc.get_topo_record(side_slot).unwrap();
    let prev_record = tc.get_topo_record(side_slot - 1).unwrap();
    assert_eq!(side_record.block_id, side);
    assert_eq!(side_record.height, prev_record.height);

    // The side-block commit advances the version but leaves balances untouched
    assert_eq!(side_record.state_version, prev_record.state_version + 1);
    assert_eq!(
        tc.balance_tree_hash_at(side_record.state_version).unwrap(),
        tc.balance_tree_hash_at(prev_record.state_version).unwrap(),
    );

    // P4: no hash appears in two slots
    let mut seen = std::collections::HashSet::new();
    for slot in 0..tc.get_topo_count() {
        assert!(seen.insert(tc.get_topo_record(slot).unwrap().block_id));
    }
}

#[test]
fn test_future_timestamp_rejected() {
    try_init_logger("info");
    let tc = TestConsensus::new();
    tc.add_empty_block().unwrap();

    let template = tc.build_block(vec![tc.get_top_id()], vec![]);
    let mut block = (*template.block).clone();
    block.timestamp = unix_now() + 10_000;

    let height_before = tc.get_height();
    let count_before = tc.get_topo_count();
    let result = tc.consensus().add_block(CompleteBlock::new(block, vec![]));
    assert!(matches!(result, Err(RuleError::FutureTimestamp(_, _))));
    assert_eq!(tc.get_height(), height_before);
    assert_eq!(tc.get_topo_count(), count_before);
}

#[test]
fn test_duplicate_nonce_within_block_rejected() {
    try_init_logger("info");
    let tc = TestConsensus::new();
    tc.add_empty_block().unwrap();
    let dev = tc.dev_address();

    let tx1 = tc.transfer_tx(dev, dev, 10, 500, tc.get_height());
    let mut tx2 = tc.transfer_tx(dev, dev, 20, 500, tc.get_height());
    tx2.payloads[0].nonce = tx1.payloads[0].nonce;
    assert_ne!(tx1.id(), tx2.id());

    let height_before = tc.get_height();
    let result = tc.add_block_at(vec![tc.get_top_id()], vec![tx1, tx2]);
    assert_eq!(result, Err(RuleError::TxDoubleSpend));
    assert_eq!(tc.get_height(), height_before);
}

#[test]
fn test_transactions_apply_to_balances() {
    try_init_logger("info");
    let tc = TestConsensus::new();
    let dev = tc.dev_address();
    let alice = Hash::from_u64(0xa11ce);

    tc.add_empty_block().unwrap();
    tc.add_block_at(vec![tc.get_top_id()], vec![tc.registration_tx(alice, tc.get_height())]).unwrap();
    assert!(tc.is_address_registered(alice));
    assert_eq!(tc.get_balance(alice), Some(0));

    let dev_before = tc.get_balance(dev).unwrap();
    let transfer = tc.transfer_tx(dev, alice, 1_000, 500, tc.get_height());
    tc.add_block_at(vec![tc.get_top_id()], vec![transfer]).unwrap();

    assert_eq!(tc.get_balance(alice), Some(1_000));
    // Dev pays amount + fee but earns the coinbase (reward + fees) back
    let expected = dev_before - 1_000 - 500 + tc.params().base_reward + 500;
    assert_eq!(tc.get_balance(dev), Some(expected));
}

#[test]
fn test_sc_install_updates_meta() {
    try_init_logger("info");
    let tc = TestConsensus::new();
    let dev = tc.dev_address();
    tc.add_empty_block().unwrap();

    let install = tc.sc_install_tx(dev, b"contract-code-v1".to_vec(), 500, tc.get_height());
    let scid = install.id();
    tc.add_block_at(vec![tc.get_top_id()], vec![install]).unwrap();

    // The tx landed in a non-side block and is therefore effective
    let validity = tc.is_tx_valid(scid);
    assert!(validity.is_valid());
    assert!(!tc.is_tx_orphan(scid));
    assert!(validity.invalid_in.is_empty());
}

#[test]
fn test_mempool_admission() {
    try_init_logger("info");
    let tc = TestConsensus::new();
    let dev = tc.dev_address();
    tc.add_empty_block().unwrap();

    // Underpaying the fee schedule is rejected with a diagnosable error
    let cheap = tc.transfer_tx(dev, dev, 10, 0, tc.get_height());
    assert!(matches!(tc.add_transaction_to_pool(cheap), Err(TxRuleError::FeeTooLow(_, _))));

    let paying = tc.transfer_tx(dev, dev, 10, 1_000, tc.get_height());
    tc.add_transaction_to_pool(paying.clone()).unwrap();
    assert_eq!(tc.add_transaction_to_pool(paying.clone()), Err(TxRuleError::DuplicateInPool));

    // Once mined, resubmission reports the tx as already mined
    tc.add_block_at(vec![tc.get_top_id()], vec![paying.clone()]).unwrap();
    assert_eq!(tc.add_transaction_to_pool(paying.clone()), Err(TxRuleError::AlreadyMined));

    // And its nonce can never be consumed again
    let mut replay = tc.transfer_tx(dev, dev, 10, 1_000, tc.get_height());
    replay.payloads[0].nonce = paying.payloads[0].nonce;
    assert!(matches!(tc.add_transaction_to_pool(replay), Err(TxRuleError::NonceAlreadyConsumed(_))));

    // Registrations route to the regpool; registered addresses are refused
    assert_eq!(
        tc.add_transaction_to_pool(tc.registration_tx(dev, tc.get_height())),
        Err(TxRuleError::AlreadyRegistered)
    );
    let bob = Hash::from_u64(0xb0b);
    tc.add_transaction_to_pool(tc.registration_tx(bob, tc.get_height())).unwrap();
    assert_eq!(
        tc.add_transaction_to_pool(tc.registration_tx(bob, tc.get_height())),
        Err(TxRuleError::RegistrationPending)
    );
}

#[test]
fn test_idempotent_add_block() {
    try_init_logger("info");
    let tc = TestConsensus::new();

    let cbl = tc.build_block(vec![tc.get_top_id()], vec![]);
    tc.consensus().add_block(cbl.clone()).unwrap();

    let height = tc.get_height();
    let count = tc.get_topo_count();
    let version = tc.get_topo_record(count - 1).unwrap().state_version;

    // P5: re-adding is rejected and mutates nothing
    assert_eq!(tc.consensus().add_block(cbl), Err(RuleError::AlreadyExists));
    assert_eq!(tc.get_height(), height);
    assert_eq!(tc.get_topo_count(), count);
    assert_eq!(tc.get_topo_record(count - 1).unwrap().state_version, version);
}

#[test]
fn test_replay_determinism() {
    try_init_logger("info");
    // P6: the same ordered add_block sequence yields byte-identical state
    let build = || {
        let tc = TestConsensus::new();
        let alice = Hash::from_u64(0xa11ce);
        tc.add_empty_block().unwrap();
        tc.add_block_at(vec![tc.get_top_id()], vec![tc.registration_tx(alice, tc.get_height())]).unwrap();
        let transfer = tc.transfer_tx(tc.dev_address(), alice, 777, 500, tc.get_height());
        tc.add_block_at(vec![tc.get_top_id()], vec![transfer]).unwrap();
        tc
    };

    let first = build();
    let second = build();
    assert_eq!(first.get_topo_count(), second.get_topo_count());
    for slot in 0..first.get_topo_count() {
        let a = first.get_topo_record(slot).unwrap();
        let b = second.get_topo_record(slot).unwrap();
        assert_eq!(a.state_version, b.state_version);
        assert_eq!(a.height, b.height);
        assert_eq!(first.balance_tree_hash_at(a.state_version), second.balance_tree_hash_at(b.state_version));
    }
}

#[test]
fn test_rewind_to_sync_anchor() {
    try_init_logger("info");
    let tc = TestConsensus::new();

    let mut hashes = vec![tc.genesis_hash()];
    for _ in 0..50 {
        hashes.push(tc.add_empty_block().unwrap());
    }
    assert_eq!(tc.get_height(), 50);

    let stable_limit = tc.params().stable_limit;
    let record_after_rewind_base = tc.get_topo_record(43).unwrap();

    assert!(tc.rewind_chain(5));

    // The rewind extended past 5 slots until the new top is a sync block:
    // heights above chain_height - stable_limit are unstable and get unwound
    let expected_height = 50 - stable_limit;
    assert_eq!(tc.get_height(), expected_height);
    assert_eq!(tc.get_topo_count(), expected_height + 1);
    let top = tc.get_top_id();
    assert_eq!(top, hashes[expected_height as usize]);
    assert_eq!(tc.get_tips(), vec![top]);
    assert!(tc.is_sync_block(hashes[30]));

    // P9: re-adding the previously accepted next block reproduces its slot and
    // state version exactly
    let next = tc.get_block(hashes[expected_height as usize + 1]).unwrap();
    tc.consensus().add_block(CompleteBlock::new((*next).clone(), vec![])).unwrap();
    assert_eq!(tc.get_height(), expected_height + 1);
    assert_eq!(
        tc.get_topo_record(expected_height + 1).unwrap().state_version,
        record_after_rewind_base.state_version,
    );
}

#[test]
fn test_notifications_broadcast() {
    try_init_logger("info");
    let tc = TestConsensus::new();

    let block_seq = tc.notify_new_block.sequence();
    let height_seq = tc.notify_height_changed.sequence();
    tc.add_empty_block().unwrap();
    assert!(tc.notify_new_block.wait_beyond(block_seq, Duration::from_secs(1)) > block_seq);
    assert!(tc.notify_height_changed.wait_beyond(height_seq, Duration::from_secs(1)) > height_seq);

    // A losing sibling signals new-block but not height-changed
    let parent = tc.get_block(tc.get_top_id()).unwrap().tips[0];
    let block_seq = tc.notify_new_block.sequence();
    let height_seq = tc.notify_height_changed.sequence();
    tc.add_block_at(vec![parent], vec![]).unwrap();
    assert!(tc.notify_new_block.wait_beyond(block_seq, Duration::from_secs(1)) > block_seq);
    assert_eq!(tc.notify_height_changed.sequence(), height_seq);
}

#[test]
fn test_stale_and_malformed_blocks_rejected() {
    try_init_logger("info");
    let tc = TestConsensus::new();
    let mut hashes = vec![tc.genesis_hash()];
    for _ in 0..12 {
        hashes.push(tc.add_empty_block().unwrap());
    }

    // A block on a tip below the stable height is stale
    let result = tc.add_block_at(vec![hashes[2]], vec![]);
    assert!(matches!(result, Err(RuleError::InvalidBlock(_))));

    // Unknown parents are reported as missing past
    let result = tc.add_block_at(vec![], vec![]); // A second genesis
    assert_eq!(result, Err(RuleError::AlreadyExists));
    let template = tc.build_block(vec![tc.get_top_id()], vec![]);
    let mut block = (*template.block).clone();
    block.tips = vec![Hash::from_u64(0xdead)];
    let result = tc.consensus().add_block(CompleteBlock::new(block, vec![]));
    assert!(matches!(result, Err(RuleError::PastMissing(_))));

    // A declared height that disagrees with the resolved height is invalid
    let template = tc.build_block(vec![tc.get_top_id()], vec![]);
    let mut block = (*template.block).clone();
    block.height += 1;
    for mb in block.mini_blocks.iter_mut() {
        mb.height += 1;
    }
    let result = tc.consensus().add_block(CompleteBlock::new(block, vec![]));
    assert!(matches!(result, Err(RuleError::InvalidBlock(_))));
}

#[test]
fn test_mining_template_round_trip() {
    try_init_logger("info");
    let tc = TestConsensus::new();
    tc.add_empty_block().unwrap();

    let template = tc.generate_block_template(tc.dev_address());
    assert_eq!(template.block.height, tc.get_height() + 1);
    assert!(tc.get_mining_block(template.hash()).is_some());

    // Attach a mini block and submit the mined template
    let mut block = (*template.block).clone();
    block.mini_blocks.push(vertex_consensus_core::miniblock::MiniBlock {
        version: 1,
        height: block.height,
        timestamp: block.timestamp,
        key_hash: tc.dev_address(),
        past_digest: vertex_consensus_core::miniblock::past_digest(&block.tips),
        nonce: 42,
    });
    tc.consensus().add_block(CompleteBlock::new(block, vec![])).unwrap();
    assert_eq!(tc.get_height(), 2);
}
