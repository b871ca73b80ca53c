//! # cairn-mempool
//!
//! Transaction pool for the cairn blockchain.
//!
//! This crate provides:
//! - Pending-transaction storage anchored on each transaction's first input
//! - Spent-output and storage-proof conflict indices
//! - Conflict-aware insertion and block-driven removal
//!
//! The pool is a plain data structure: it lives inside the consensus
//! engine's write lock, so it carries no interior locking of its own.

mod error;
mod pool;

pub use error::{MempoolError, MempoolResult};
pub use pool::TransactionPool;
