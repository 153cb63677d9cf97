use claimguard_core::{BlockBox, BlockPos};
use thiserror::Error;

use crate::RegionId;

/// Errors returned by registry mutations that address a specific region or
/// validate a new claim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// No region is registered under this id.
    #[error("no region with id {0}")]
    UnknownRegion(RegionId),
    /// The requested box shares interior volume with an existing claim.
    #[error("claim {requested} overlaps existing claim {existing}")]
    Overlaps {
        /// Box the caller tried to claim.
        requested: BlockBox,
        /// First registered box found in the way.
        existing: BlockBox,
    },
    /// Another region already uses this minimum corner as its key.
    #[error("a region is already keyed at {0}")]
    CornerTaken(BlockPos),
    /// A fief must lie inside its parent region.
    #[error("fief {requested} is not inside parent {parent}")]
    OutsideParent {
        /// Box the caller tried to subdivide.
        requested: BlockBox,
        /// Bounds of the parent region.
        parent: BlockBox,
    },
    /// The operation only applies to fiefs.
    #[error("region {0} is not a fief")]
    NotAFief(RegionId),
}
