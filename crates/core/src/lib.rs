#![warn(missing_docs)]
//! Core primitives shared between the claim registry and the game-event layer.

pub mod bounds;
pub mod identity;
pub mod permission;
pub mod tag;

// Re-export commonly used types
pub use bounds::{BlockBox, BlockPos, Border};
pub use identity::Identity;
pub use permission::{ParsePermissionError, Permission, Permissions};
pub use tag::{Compound, Tag};
