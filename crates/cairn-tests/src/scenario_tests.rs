//! End-to-end scenarios: subsidies, transfers, mempool behavior, and the
//! block-acceptance error taxonomy.

use crate::generators::*;
use crate::harness::TestChain;
use cairn_consensus::ConsensusError;
use cairn_mempool::MempoolError;
use cairn_state::{State, StateError};
use cairn_types::{Block, CoinAddress, Hash256};
use std::time::{SystemTime, UNIX_EPOCH};

// ============ Subsidy and Transfer Scenarios ============

#[test]
fn empty_block_pays_the_miner() {
    let mut chain = TestChain::new();
    let kp = keypair(1);

    assert_eq!(chain.state.height(), 0);
    assert_eq!(chain.state.sorted_utxo_set().len(), 1);

    let block = chain.mine(vec![], address(&kp));
    let subsidy_id = block.subsidy_id();
    let change = chain.accept(block).unwrap();

    assert_eq!(chain.state.height(), 1);
    assert_eq!(change.applied_blocks.len(), 1);
    assert!(change.rewound_blocks.is_empty());
    assert_eq!(chain.state.sorted_utxo_set().len(), 2);

    let subsidy = chain.state.output(&subsidy_id).unwrap();
    assert_eq!(subsidy.value, chain.params.calculate_coinbase(1));
    assert_eq!(subsidy.spend_hash, address(&kp));
}

#[test]
fn transfer_spends_a_subsidy_through_the_mempool() {
    let mut chain = TestChain::new();
    let kp = keypair(1);
    let dest: CoinAddress = Hash256([0x01; 32]);

    let block1 = chain.mine(vec![], address(&kp));
    let source = block1.subsidy_id();
    chain.accept(block1).unwrap();
    let funded = chain.params.calculate_coinbase(1);

    // Everything but 10 to the destination, 10 to the miner.
    let t = transfer(&kp, source, funded, dest, funded - 10, 10);
    chain.state.accept_transaction(t).unwrap();
    assert_eq!(chain.state.transaction_pool_len(), 1);

    let pending = chain.state.transaction_pool_dump();
    chain.mine_and_accept(pending, address(&kp));

    // Confirmed transactions leave the pool.
    assert_eq!(chain.state.transaction_pool_len(), 0);

    // Genesis subsidy, the destination output, and the new subsidy.
    let utxos = chain.state.sorted_utxo_set();
    assert_eq!(utxos.len(), 3);

    let to_dest = chain.state.outputs_for(&dest);
    assert_eq!(to_dest.len(), 1);
    assert_eq!(to_dest[0].1.value, funded - 10);

    // The miner collected the fee on top of the coinbase.
    let block2 = chain.state.block_at_height(2).unwrap();
    let subsidy2 = chain.state.output(&block2.subsidy_id()).unwrap();
    assert_eq!(subsidy2.value, chain.params.calculate_coinbase(2) + 10);
}

// ============ Mempool Conflicts ============

#[test]
fn double_spend_is_rejected_and_pool_untouched() {
    let mut chain = TestChain::new();
    let kp = keypair(1);

    let block1 = chain.mine(vec![], address(&kp));
    let source = block1.subsidy_id();
    chain.accept(block1).unwrap();
    let funded = chain.params.calculate_coinbase(1);

    let incumbent = transfer(&kp, source, funded, Hash256([0x01; 32]), funded, 0);
    chain.state.accept_transaction(incumbent.clone()).unwrap();

    let rival = transfer(&kp, source, funded, Hash256([0x02; 32]), funded, 0);
    let err = chain.state.accept_transaction(rival).unwrap_err();
    assert_eq!(
        err,
        StateError::ConflictingTransaction(MempoolError::ConflictingSpend(source))
    );

    // The incumbent still stands, alone.
    assert_eq!(chain.state.transaction_pool_dump(), vec![incumbent]);
}

#[test]
fn chained_pool_transactions_are_refused() {
    let mut chain = TestChain::new();
    let kp = keypair(1);

    let block1 = chain.mine(vec![], address(&kp));
    let source = block1.subsidy_id();
    chain.accept(block1).unwrap();
    let funded = chain.params.calculate_coinbase(1);

    let first = transfer(&kp, source, funded, address(&kp), funded, 0);
    let chained_source = first.output_id(0);
    chain.state.accept_transaction(first).unwrap();

    // Spends an output that only exists in the pool: not accepted.
    let second = transfer(&kp, chained_source, funded, Hash256([0x03; 32]), funded, 0);
    let err = chain.state.accept_transaction(second).unwrap_err();
    assert_eq!(
        err,
        StateError::Consensus(ConsensusError::UnknownOutput(chained_source))
    );
}

// ============ Acceptance Error Taxonomy ============

#[test]
fn duplicate_blocks_are_reported_known() {
    let mut chain = TestChain::new();
    let kp = keypair(1);
    let block = chain.mine(vec![], address(&kp));
    chain.accept(block.clone()).unwrap();
    assert_eq!(chain.accept(block), Err(StateError::BlockKnown));
}

#[test]
fn orphans_are_filed_then_adopted() {
    // Mine two blocks on a builder chain, deliver them out of order to a
    // fresh node.
    let mut builder = TestChain::new();
    let kp = keypair(1);
    let b1 = builder.mine(vec![], address(&kp));
    builder.accept(b1.clone()).unwrap();
    let b2 = builder.mine(vec![], address(&kp));
    builder.accept(b2.clone()).unwrap();

    let fresh = State::new(chain_params());
    assert_eq!(fresh.accept_block(b2.clone()), Err(StateError::UnknownOrphan));
    // Second sighting is distinguishable: no new sync should fire.
    assert_eq!(fresh.accept_block(b2.clone()), Err(StateError::KnownOrphan));

    // The parent arrives; the orphan is adopted automatically.
    fresh.accept_block(b1).unwrap();
    assert_eq!(fresh.height(), 2);
    assert_eq!(fresh.current_block_id(), b2.id());
}

#[test]
fn future_blocks_are_queued_not_poisoned() {
    let chain = TestChain::new();
    let kp = keypair(1);

    let far_future = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + chain.params.future_threshold
        + 600;
    let mut block = Block {
        parent_id: chain.genesis_id(),
        nonce: 0,
        timestamp: far_future,
        miner_address: address(&kp),
        merkle_root: Hash256::ZERO,
        transactions: vec![],
    };
    while !block.meets_target(chain.params.root_target) {
        block.nonce += 1;
    }

    let err = chain.accept(block.clone()).unwrap_err();
    assert!(matches!(err, StateError::FutureBlock { .. }));
    // Queued, not bad: a resubmission reads as already known.
    assert_eq!(chain.accept(block), Err(StateError::BlockKnown));
    assert_eq!(chain.state.height(), 0);
}

#[test]
fn block_with_invalid_transaction_is_poisoned_with_descendants() {
    let mut chain = TestChain::new();
    let kp = keypair(1);

    // A transfer from an output that does not exist.
    let ghost = transfer(
        &kp,
        cairn_types::OutputId(Hash256([0xEE; 32])),
        100,
        Hash256([0x01; 32]),
        100,
        0,
    );
    let bad = chain.mine(vec![ghost], address(&kp));
    let bad_id = bad.id();
    let child = chain.mine_on(bad_id, vec![], address(&kp));

    let err = chain.accept(bad.clone()).unwrap_err();
    assert!(matches!(err, StateError::Consensus(_)));
    assert_eq!(chain.state.height(), 0);

    // The tree never reconsiders it, nor anything built on it.
    assert_eq!(chain.accept(bad), Err(StateError::BadBlock));
    assert_eq!(chain.accept(child), Err(StateError::BadBlock));
}

#[test]
fn tampered_merkle_root_rejected() {
    let mut chain = TestChain::new();
    let kp = keypair(1);
    let mut block = chain.mine(vec![], address(&kp));
    block.merkle_root = Hash256([0x77; 32]);
    while !block.meets_target(chain.params.root_target) {
        block.nonce += 1;
    }
    let err = chain.accept(block).unwrap_err();
    assert!(matches!(
        err,
        StateError::Consensus(ConsensusError::MerkleRootMismatch { .. })
    ));
}

fn chain_params() -> cairn_consensus::ChainParams {
    cairn_consensus::ChainParams::regtest()
}
