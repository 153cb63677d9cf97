//! Spatial protection registry for player claims.
//!
//! Claims are axis-aligned block boxes indexed by an augmented interval tree.
//! [`ProtectionRegistry`] owns the tree together with the owner and min-corner
//! lookups and answers the "may this actor do this here?" checks issued by
//! block interaction hooks.

mod error;
mod interval;
mod persist;
mod region;
mod registry;
mod store;

pub use error::ClaimError;
pub use interval::{IntervalTree, Iter as IntervalIter, PreOrder as IntervalPreOrder};
pub use persist::{
    identity_from_compound, identity_to_compound, read_regions, region_from_compound,
    region_to_compound, write_regions, LEGACY_CLAIMS_KEY, PROPERTIES_KEY,
};
pub use region::{Region, RegionId};
pub use registry::ProtectionRegistry;
pub use store::{export_json, import_json, ClaimStore, STORE_FILE_NAME};

pub use claimguard_core::{
    BlockBox, BlockPos, Border, Compound, Identity, Permission, Permissions, Tag,
};
