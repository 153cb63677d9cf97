//! Deterministic fixtures for registry tests.

use claimguard_core::{BlockBox, BlockPos, Identity};
use uuid::Uuid;

/// A player identity whose id is derived from `name`, so the same name
/// always maps to the same id across test runs.
pub fn player(name: &str) -> Identity {
    let mut bytes = [0u8; 16];
    for (i, b) in name.bytes().enumerate() {
        bytes[i % 16] = bytes[i % 16].wrapping_mul(31).wrapping_add(b);
    }
    // Never hand out the nil id; that is the vacant owner.
    bytes[15] |= 1;
    Identity::new(Uuid::from_bytes(bytes), name)
}

/// Box spanned by two corners given as coordinates.
pub fn cube(x0: i32, y0: i32, z0: i32, x1: i32, y1: i32, z1: i32) -> BlockBox {
    BlockBox::new(BlockPos::new(x0, y0, z0), BlockPos::new(x1, y1, z1))
}
