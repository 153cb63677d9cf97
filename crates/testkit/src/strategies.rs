//! Proptest strategies for claim geometry and identities.

use claimguard_core::{BlockBox, BlockPos, Identity, Permission, Permissions};
use proptest::prelude::*;
use uuid::Uuid;

/// Edge length of the grid cells used by [`disjoint_boxes`].
pub const CELL: i32 = 20;

/// A position in a small world slice, so random boxes collide often.
pub fn arb_pos() -> impl Strategy<Value = BlockPos> {
    (-64i32..64, -16i32..48, -64i32..64).prop_map(|(x, y, z)| BlockPos::new(x, y, z))
}

/// A box with edges up to 24 blocks long.
pub fn arb_box() -> impl Strategy<Value = BlockBox> {
    (arb_pos(), 0i32..24, 0i32..24, 0i32..24).prop_map(|(min, dx, dy, dz)| {
        BlockBox::new(min, BlockPos::new(min.x + dx, min.y + dy, min.z + dz))
    })
}

/// Up to `max` boxes that neither overlap nor touch, each with its own
/// min corner.
///
/// Every box lives strictly inside its own grid cell of size [`CELL`].
pub fn disjoint_boxes(max: usize) -> impl Strategy<Value = Vec<BlockBox>> {
    let cells: Vec<(i32, i32, i32)> = (-2..2)
        .flat_map(|x| (-1..1).flat_map(move |y| (-2..2).map(move |z| (x, y, z))))
        .collect();
    let max = max.min(cells.len());
    proptest::sample::subsequence(cells, 0..=max).prop_flat_map(|picked| {
        picked
            .into_iter()
            .map(|(cx, cy, cz)| {
                (1i32..3, 1i32..3, 1i32..3, 0i32..16, 0i32..16, 0i32..16).prop_map(
                    move |(ox, oy, oz, sx, sy, sz)| {
                        let min = BlockPos::new(cx * CELL + ox, cy * CELL + oy, cz * CELL + oz);
                        BlockBox::new(min, BlockPos::new(min.x + sx, min.y + sy, min.z + sz))
                    },
                )
            })
            .collect::<Vec<_>>()
    })
}

/// Any single permission.
pub fn arb_permission() -> impl Strategy<Value = Permission> {
    proptest::sample::select(Permission::ALL.to_vec())
}

/// Any combination of permission bits.
pub fn arb_permissions() -> impl Strategy<Value = Permissions> {
    any::<u8>().prop_map(Permissions::from_bits_truncate)
}

/// A non-empty identity with a random id and a short name.
pub fn arb_identity() -> impl Strategy<Value = Identity> {
    (any::<u128>(), "[A-Za-z][A-Za-z0-9_]{0,11}").prop_map(|(bits, name)| {
        Identity::new(Uuid::from_u128(bits | 1), name)
    })
}
