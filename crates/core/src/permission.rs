//! Interaction categories a region owner can open up to everyone.
//!
//! The game-event layer maps each hook (block break, door click, chest open, ...)
//! onto one [`Permission`] and asks the registry whether the actor is allowed.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

bitflags::bitflags! {
    /// Per-region permission bits. A set bit means "anyone may do this here".
    ///
    /// Bit 7 is reserved; it is kept as-is when loaded from disk.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Permissions: u8 {
        /// Breaking blocks.
        const BLOCK_BREAK = 0b0000_0001;
        /// Placing single blocks.
        const BLOCK_PLACE = 0b0000_0010;
        /// Placing multi-block structures (doors, beds).
        const MULTI_BLOCK_PLACE = 0b0000_0100;
        /// Using tools on blocks (hoes, axes stripping logs, buckets).
        const TOOL_USE = 0b0000_1000;
        /// Generic block interaction (buttons, levers).
        const INTERACT = 0b0001_0000;
        /// Opening doors, trapdoors and gates.
        const DOOR_INTERACT = 0b0010_0000;
        /// Opening containers.
        const INVENTORY_INTERACT = 0b0100_0000;
    }
}

/// A single interaction category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Permission {
    /// Breaking blocks.
    BlockBreak,
    /// Placing single blocks.
    BlockPlace,
    /// Placing multi-block structures.
    MultiBlockPlace,
    /// Using tools on blocks.
    ToolUse,
    /// Generic block interaction.
    Interact,
    /// Opening doors, trapdoors and gates.
    DoorInteract,
    /// Opening containers.
    InventoryInteract,
}

impl Permission {
    /// Every permission in bit order.
    pub const ALL: [Permission; 7] = [
        Permission::BlockBreak,
        Permission::BlockPlace,
        Permission::MultiBlockPlace,
        Permission::ToolUse,
        Permission::Interact,
        Permission::DoorInteract,
        Permission::InventoryInteract,
    ];

    /// The flag backing this permission.
    pub const fn flag(self) -> Permissions {
        match self {
            Self::BlockBreak => Permissions::BLOCK_BREAK,
            Self::BlockPlace => Permissions::BLOCK_PLACE,
            Self::MultiBlockPlace => Permissions::MULTI_BLOCK_PLACE,
            Self::ToolUse => Permissions::TOOL_USE,
            Self::Interact => Permissions::INTERACT,
            Self::DoorInteract => Permissions::DOOR_INTERACT,
            Self::InventoryInteract => Permissions::INVENTORY_INTERACT,
        }
    }

    /// Canonical string key used in configs and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BlockBreak => "block_break",
            Self::BlockPlace => "block_place",
            Self::MultiBlockPlace => "multi_block_place",
            Self::ToolUse => "tool_use",
            Self::Interact => "interact",
            Self::DoorInteract => "door_interact",
            Self::InventoryInteract => "inventory_interact",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown permission name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown permission `{0}`")]
pub struct ParsePermissionError(pub String);

impl FromStr for Permission {
    type Err = ParsePermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|permission| permission.as_str() == key)
            .ok_or_else(|| ParsePermissionError(s.to_string()))
    }
}

impl From<Permission> for Permissions {
    fn from(permission: Permission) -> Self {
        permission.flag()
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Permissions::empty(), |acc, p| acc | p.flag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_distinct_and_leave_the_top_bit_free() {
        let all: Permissions = Permission::ALL.into_iter().collect();
        assert_eq!(all.bits(), 0b0111_1111);
        assert_eq!(all, Permissions::all());
    }

    #[test]
    fn parses_names_leniently() {
        assert_eq!("block_break".parse::<Permission>(), Ok(Permission::BlockBreak));
        assert_eq!(
            "Door-Interact".parse::<Permission>(),
            Ok(Permission::DoorInteract)
        );
        assert!("fly".parse::<Permission>().is_err());
    }

    #[test]
    fn reserved_bit_survives_retain() {
        let raw = Permissions::from_bits_retain(0b1000_0001);
        assert!(raw.contains(Permissions::BLOCK_BREAK));
        assert_eq!(raw.bits(), 0b1000_0001);
    }
}
