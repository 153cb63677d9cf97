//! Block coordinates and axis-aligned block boxes.
//!
//! Claims are stored as integer cuboids in world block space. A box is closed
//! on both ends: `min` and `max` are both inside the box.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Block position in world space.
///
/// Ordering is lexical by `(x, y, z)`, which keeps map iteration stable.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockPos {
    /// East/west coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
    /// North/south coordinate.
    pub z: i32,
}

impl BlockPos {
    /// World origin.
    pub const ORIGIN: Self = Self::new(0, 0, 0);

    /// Create a position from its components.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Componentwise minimum.
    pub fn min(self, other: Self) -> Self {
        Self::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    /// Componentwise maximum.
    pub fn max(self, other: Self) -> Self {
        Self::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }

    /// Components as an `[x, y, z]` array.
    pub const fn to_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[i32; 3]> for BlockPos {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// How two boxes that only share a face are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Border {
    /// Closed intervals: touching faces count as overlap.
    Inclusive,
    /// Open intervals: boxes must share interior volume.
    Exclusive,
}

impl Border {
    /// Map the `include_border` toggle used by callers onto a border mode.
    pub const fn from_include(include_border: bool) -> Self {
        if include_border {
            Self::Inclusive
        } else {
            Self::Exclusive
        }
    }

    #[inline]
    fn spans_overlap(self, a_min: i32, a_max: i32, b_min: i32, b_max: i32) -> bool {
        match self {
            Self::Inclusive => a_min <= b_max && b_min <= a_max,
            Self::Exclusive => a_min < b_max && b_min < a_max,
        }
    }
}

/// Immutable axis-aligned box of blocks.
///
/// Construction normalizes the corners so that `min <= max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[BlockPos; 2]", into = "[BlockPos; 2]")]
pub struct BlockBox {
    min: BlockPos,
    max: BlockPos,
}

impl BlockBox {
    /// Create a box spanning two arbitrary corners.
    pub fn new(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Degenerate box covering a single block.
    pub const fn point(pos: BlockPos) -> Self {
        Self { min: pos, max: pos }
    }

    /// Minimum corner. This is the canonical key of a claim.
    pub const fn min(&self) -> BlockPos {
        self.min
    }

    /// Maximum corner.
    pub const fn max(&self) -> BlockPos {
        self.max
    }

    /// Extent of the box, `max - min` per axis.
    pub fn size(&self) -> BlockPos {
        BlockPos::new(
            self.max.x.saturating_sub(self.min.x),
            self.max.y.saturating_sub(self.min.y),
            self.max.z.saturating_sub(self.min.z),
        )
    }

    /// Returns true when `pos` lies inside the box (faces included).
    pub fn contains(&self, pos: BlockPos) -> bool {
        (self.min.x..=self.max.x).contains(&pos.x)
            && (self.min.y..=self.max.y).contains(&pos.y)
            && (self.min.z..=self.max.z).contains(&pos.z)
    }

    /// Returns true when `other` lies entirely inside this box.
    pub fn contains_box(&self, other: &BlockBox) -> bool {
        self.contains(other.min) && self.contains(other.max)
    }

    /// Overlap test along X only.
    pub fn overlaps_x(&self, other: &BlockBox, border: Border) -> bool {
        border.spans_overlap(self.min.x, self.max.x, other.min.x, other.max.x)
    }

    /// Overlap test on all three axes.
    ///
    /// Axes are checked in X, Z, Y order and the test stops at the first axis
    /// that does not overlap. Claims are wide and flat, so X and Z reject far
    /// more candidates than Y does.
    pub fn overlaps(&self, other: &BlockBox, border: Border) -> bool {
        self.overlaps_x(other, border)
            && border.spans_overlap(self.min.z, self.max.z, other.min.z, other.max.z)
            && border.spans_overlap(self.min.y, self.max.y, other.min.y, other.max.y)
    }
}

impl From<[BlockPos; 2]> for BlockBox {
    fn from([a, b]: [BlockPos; 2]) -> Self {
        Self::new(a, b)
    }
}

impl From<BlockBox> for [BlockPos; 2] {
    fn from(value: BlockBox) -> Self {
        [value.min, value.max]
    }
}

impl fmt::Display for BlockBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.min, self.max)
    }
}
