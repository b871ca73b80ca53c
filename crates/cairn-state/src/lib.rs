//! # cairn-state
//!
//! The consensus engine of the cairn blockchain.
//!
//! This crate provides:
//! - The [`State`] container: block tree, UTXO set, open contracts, mempool
//! - Block acceptance with orphan handling and future-block retry
//! - Reversible apply/invert producing exact diff sequences
//! - Fork choice with the surpass threshold and atomic reorganization
//! - Bounded-queue subscriber notifications
//!
//! The engine is in-memory and single-threaded internally; one
//! reader-writer lock guards the whole state. Persistence, transport, and
//! mining live in layers above.

mod apply;
mod contracts;
mod diff;
mod error;
mod fork;
mod notify;
mod state;
mod tree;

pub use diff::{ConsensusChange, ContractDiff, OutputDiff};
pub use error::{StateError, StateResult};
pub use notify::SUBSCRIBER_QUEUE_DEPTH;
pub use state::State;
pub use tree::MissedStorageProof;
