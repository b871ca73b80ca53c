//! Error types for consensus validation.

use cairn_types::{BlockHeight, ContractId, Hash256, OutputId, Timestamp};
use thiserror::Error;

/// Consensus validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// Block ID does not meet the required difficulty target.
    #[error("block id does not meet the parent target")]
    TargetNotMet,

    /// Timestamp earlier than the median of the recent window.
    #[error("timestamp {block_time} precedes the earliest legal timestamp {earliest}")]
    EarlyTimestamp {
        block_time: Timestamp,
        earliest: Timestamp,
    },

    /// Timestamp too far ahead of the local clock. Not fatal: the block may
    /// become valid once the clock catches up.
    #[error("timestamp {block_time} is past the future limit {limit}")]
    FutureBlock {
        block_time: Timestamp,
        limit: Timestamp,
    },

    /// Encoded block larger than the protocol limit.
    #[error("block too large: {size} bytes, max {max}")]
    BlockTooLarge { size: usize, max: usize },

    /// Declared transaction Merkle root does not match the carried list.
    #[error("merkle root mismatch: declared {declared}, computed {computed}")]
    MerkleRootMismatch {
        declared: Hash256,
        computed: Hash256,
    },

    /// Transactions must spend something.
    #[error("transaction has no inputs")]
    NoInputs,

    /// Input references an output absent from the unspent set.
    #[error("input spends unknown output {0}")]
    UnknownOutput(OutputId),

    /// Input's spend conditions do not hash to the output's commitment.
    #[error("spend conditions do not match the hash committed by output {0}")]
    SpendConditionsMismatch(OutputId),

    /// Spend-conditions timelock has not expired.
    #[error("output {output} is locked until height {unlocks_at}, current height {height}")]
    InputTimelocked {
        output: OutputId,
        unlocks_at: BlockHeight,
        height: BlockHeight,
    },

    /// The same output appears twice among one transaction's inputs.
    #[error("output {0} spent twice in the same transaction")]
    RepeatedOutput(OutputId),

    /// Input and outgoing values must balance exactly.
    #[error("coin conservation violated: inputs {inputs}, outgoing {outgoing}")]
    Conservation { inputs: u128, outgoing: u128 },

    /// Contracts must begin after the height that admits them.
    #[error("contract starts at {start}, not past current height {height}")]
    ContractStartsInPast {
        start: BlockHeight,
        height: BlockHeight,
    },

    /// Contracts must run for at least one block.
    #[error("contract ends at {end}, not after its start {start}")]
    ContractEndsBeforeStart {
        start: BlockHeight,
        end: BlockHeight,
    },

    /// Challenge windows must span at least one block.
    #[error("contract challenge window is empty")]
    EmptyChallengeWindow,

    /// A contract over zero bytes has nothing to prove.
    #[error("contract covers an empty file")]
    EmptyContractFile,

    /// Storage proof references a contract that is not open.
    #[error("storage proof references unknown contract {0}")]
    UnknownContract(ContractId),

    /// A proof already landed in this contract's current window.
    #[error("contract {0} already satisfied its current window")]
    WindowAlreadySatisfied(ContractId),

    /// Proof height falls outside the contract's challenge span.
    #[error("storage proof for {contract} outside its window at height {height}")]
    ProofOutsideWindow {
        contract: ContractId,
        height: BlockHeight,
    },

    /// The block that seeds the segment challenge is not on the chain.
    #[error("no block at trigger height {0}")]
    MissingTriggerBlock(BlockHeight),

    /// Merkle branch does not verify against the committed file root.
    #[error("invalid storage proof for contract {0}")]
    InvalidStorageProof(ContractId),

    /// Signature names an input the transaction does not have.
    #[error("signature covers input {0} which is not in the transaction")]
    UnmatchedSignature(OutputId),

    /// Signature on an input that is already fully signed.
    #[error("frivolous extra signature for input {0}")]
    FrivolousSignature(OutputId),

    /// Signature's key index is outside the input's key list.
    #[error("key index {index} out of range for an input with {keys} keys")]
    KeyIndexOutOfRange { index: u64, keys: usize },

    /// One key may only sign once per input.
    #[error("public key {index} used twice while signing")]
    KeyReused { index: u64 },

    /// Signature timelock has not expired.
    #[error("signature locked until height {unlocks_at}, current height {height}")]
    SignatureTimelocked {
        unlocks_at: BlockHeight,
        height: BlockHeight,
    },

    /// Signature bytes do not verify under the named key.
    #[error("invalid signature")]
    InvalidSignature,

    /// An input ended signature processing short of its threshold.
    #[error("input {output} still needs {remaining} signatures")]
    MissingSignatures {
        output: OutputId,
        remaining: u64,
    },
}

/// Result type for consensus operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
