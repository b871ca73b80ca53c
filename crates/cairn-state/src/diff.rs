//! State diffs and the change notification delivered to subscribers.
//!
//! Every mutation the engine makes to the output or contract sets is
//! reported as a tagged diff. Replaying a diff sequence in reverse with
//! each variant flipped is an exact inverse, which is what makes
//! reorganizations safe to observe from outside.

use cairn_types::{Block, ContractId, OpenContract, Output, OutputId};

/// One change to the unspent-output set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputDiff {
    /// An output entered the unspent set.
    Created { id: OutputId, output: Output },
    /// An output left the unspent set.
    Removed { id: OutputId, output: Output },
}

impl OutputDiff {
    /// The diff that undoes this one.
    pub fn inverted(&self) -> OutputDiff {
        match self {
            OutputDiff::Created { id, output } => OutputDiff::Removed {
                id: *id,
                output: *output,
            },
            OutputDiff::Removed { id, output } => OutputDiff::Created {
                id: *id,
                output: *output,
            },
        }
    }

    /// The output ID this diff touches.
    pub fn id(&self) -> OutputId {
        match self {
            OutputDiff::Created { id, .. } | OutputDiff::Removed { id, .. } => *id,
        }
    }
}

/// One change to the open-contract set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractDiff {
    /// A contract began being enforced.
    Opened {
        id: ContractId,
        contract: OpenContract,
    },
    /// A contract stopped being enforced, with its final bookkeeping.
    Closed {
        id: ContractId,
        contract: OpenContract,
    },
}

/// What one accepted block changed, delivered to every subscriber after a
/// state transition. Orphans and duplicates produce no change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsensusChange {
    /// Blocks removed from the active chain, in descending height order.
    pub rewound_blocks: Vec<Block>,
    /// Blocks added to the active chain, in ascending height order.
    pub applied_blocks: Vec<Block>,
    /// Output mutations, in the exact order they were made.
    pub output_diffs: Vec<OutputDiff>,
    /// Contract mutations, in the exact order they were made.
    pub contract_diffs: Vec<ContractDiff>,
}

impl ConsensusChange {
    /// True when the accept was a no-op for the active chain.
    pub fn is_empty(&self) -> bool {
        self.rewound_blocks.is_empty()
            && self.applied_blocks.is_empty()
            && self.output_diffs.is_empty()
            && self.contract_diffs.is_empty()
    }
}

/// The diffs one block application or inversion produced, in order.
#[derive(Debug, Default)]
pub(crate) struct DiffSet {
    pub outputs: Vec<OutputDiff>,
    pub contracts: Vec<ContractDiff>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_types::hash_bytes;

    #[test]
    fn inversion_is_an_involution() {
        let diff = OutputDiff::Created {
            id: OutputId(hash_bytes(b"o")),
            output: Output {
                value: 5,
                spend_hash: hash_bytes(b"a"),
            },
        };
        assert_eq!(diff.inverted().inverted(), diff);
        assert!(matches!(diff.inverted(), OutputDiff::Removed { .. }));
    }
}
