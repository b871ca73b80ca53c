//! Catch-up protocol scenarios.

use crate::generators::*;
use crate::harness::{LocalPeer, TestChain};
use cairn_state::State;
use cairn_sync::{build_block_locator, catch_up, send_blocks, SyncError, MAX_CATCH_UP_BLOCKS};

#[test]
fn locator_starts_recent_and_ends_at_genesis() {
    let mut chain = TestChain::new();
    let miner = address(&keypair(1));
    chain.mine_empty_blocks(20, miner);

    let locator = build_block_locator(&chain.state);
    assert_eq!(locator[0], chain.state.current_block_id());
    // 12 recents, no room left before running off the chain, then genesis.
    assert_eq!(locator[11], chain.state.block_at_height(9).unwrap().id());
    assert!(locator.contains(&chain.genesis_id()));
}

#[test]
fn send_blocks_reports_continuation() {
    let mut chain = TestChain::new();
    let miner = address(&keypair(1));
    chain.mine_empty_blocks(MAX_CATCH_UP_BLOCKS as u64 + 20, miner);

    let fresh = State::new(chain.params.clone());
    let locator = build_block_locator(&fresh);
    let range = send_blocks(&chain.state, &locator).unwrap();
    assert_eq!(range.blocks.len(), MAX_CATCH_UP_BLOCKS);
    assert!(range.more_available);
    // The batch starts at the matched block: genesis itself.
    assert_eq!(range.blocks[0].id(), chain.genesis_id());
}

#[test]
fn foreign_chains_do_not_match() {
    let mut chain = TestChain::new();
    let miner = address(&keypair(1));
    chain.mine_empty_blocks(3, miner);

    // A different genesis timestamp makes a different blockchain.
    let mut params = cairn_consensus::ChainParams::regtest();
    params.genesis_timestamp += 1;
    let foreign = State::new(params);
    let locator = build_block_locator(&foreign);
    assert_eq!(
        send_blocks(&chain.state, &locator),
        Err(SyncError::NoMatchingBlock)
    );
}

#[test]
fn lagging_node_catches_up_to_the_full_chain() {
    let mut server = TestChain::new();
    let miner = address(&keypair(1));
    server.mine_empty_blocks(250, miner);

    // The lagging node shares the first five blocks.
    let lagging = State::new(server.params.clone());
    for height in 1..=5 {
        let block = server.state.block_at_height(height).unwrap();
        lagging.accept_block(block).unwrap();
    }
    assert_eq!(lagging.height(), 5);

    let stats = catch_up(&lagging, &LocalPeer(&server.state)).unwrap();

    assert_eq!(lagging.height(), 250);
    assert_eq!(lagging.current_block_id(), server.state.current_block_id());
    assert_eq!(lagging.state_hash(), server.state.state_hash());
    assert_eq!(stats.applied, 245);
    assert!(stats.round_trips >= 3);

    // Every height agrees, not just the tip.
    for height in [0u64, 1, 100, 249, 250] {
        assert_eq!(
            lagging.block_at_height(height).unwrap().id(),
            server.state.block_at_height(height).unwrap().id()
        );
    }
}

#[test]
fn catch_up_carries_a_reorganization() {
    // The server's chain outweighs the lagging node's private fork, so
    // catching up must reorganize the lagging node.
    let mut server = TestChain::new();
    let miner = address(&keypair(1));
    let rival = address(&keypair(2));

    // Lagging node mines its own two blocks on a shared genesis.
    let lagging = State::new(server.params.clone());
    let l1 = server.mine_on(server.genesis_id(), vec![], rival);
    let l2 = server.mine_on(l1.id(), vec![], rival);
    for b in [&l1, &l2] {
        lagging.accept_block(b.clone()).unwrap();
    }
    // The server never hears about them; it mines five of its own.
    server.mine_empty_blocks(5, miner);

    catch_up(&lagging, &LocalPeer(&server.state)).unwrap();
    assert_eq!(lagging.height(), 5);
    assert_eq!(lagging.current_block_id(), server.state.current_block_id());
    assert_eq!(lagging.state_hash(), server.state.state_hash());
}
