//! Host-integration contract violations
//!
//! Ordinary analysis outcomes are diagnostics. These errors only describe
//! inputs the host should never produce; the unit being analyzed is aborted.

use crate::dataflow::BlockId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("block {0} does not exist in the control-flow graph")]
    UnknownBlock(BlockId),

    #[error("edge {from} -> {to} is missing from the other block's edge list")]
    UnmatchedEdge { from: BlockId, to: BlockId },

    #[error("exception region handled by block {handler} protects no blocks")]
    EmptyProtectedRegion { handler: BlockId },

    #[error("parameter slot {index} is out of range for `{method}` ({count} parameters)")]
    ParameterOutOfRange { method: String, index: u32, count: u32 },

    #[error("`{method}` has no implicit `this` parameter")]
    NoThisParameter { method: String },

    #[error("generic definition `{definition}` declares {expected} parameters but {actual} arguments were supplied")]
    GenericArityMismatch {
        definition: String,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
