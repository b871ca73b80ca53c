//! # cairn-tests
//!
//! Integration tests for the cairn node.
//!
//! This crate provides:
//! - A test harness with a nonce-grinding miner that can extend any fork
//! - Generators for keys, spends, contracts, files, and storage proofs
//! - Scenario tests covering transfers, forks, reorganizations, contract
//!   lifecycles, and peer catch-up
//! - Property-based tests for the codec and consensus arithmetic

pub mod generators;
pub mod harness;

#[cfg(test)]
mod scenario_tests;



#[cfg(test)]
mod sync_tests;

#[cfg(test)]
mod property_tests;

pub use generators::*;
pub use harness::*;
