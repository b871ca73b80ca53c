//! # cairn-sync
//!
//! Block synchronization for the cairn blockchain.
//!
//! This crate provides:
//! - Block-locator construction with exponential back-off
//! - The `send_blocks` responder a node serves to lagging peers
//! - The `catch_up` driver that pulls a peer's chain through the normal
//!   acceptance path
//!
//! The transport is abstracted behind [`SyncPeer`]; all network I/O
//! happens outside the engine's lock.

mod error;
mod protocol;
mod sync;

pub use error::{SyncError, SyncResult};
pub use protocol::{build_block_locator, send_blocks, BlockRange, BLOCK_LOCATOR_LEN};
pub use sync::{catch_up, CatchUpStats, SyncPeer};

/// Maximum blocks returned by one `send_blocks` call; longer chains signal
/// continuation instead.
pub const MAX_CATCH_UP_BLOCKS: usize = 100;
