//! Region records <-> persistence container.
//!
//! Current saves hold one flat list under [`PROPERTIES_KEY`]. Worlds written by
//! older builds instead carry [`LEGACY_CLAIMS_KEY`]: the interval tree itself,
//! serialized node by node with nested `left`/`right` children. That layout is
//! only ever read; [`read_regions`] flattens it and drops the field.
//!
//! Decoding is lenient per field. A missing or mistyped field falls back to
//! its default and a corrupt entry never prevents the rest of the list from
//! loading.

use claimguard_core::{BlockBox, BlockPos, Compound, Identity, Permissions, Tag};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::region::Region;

/// Field holding the flat region list.
pub const PROPERTIES_KEY: &str = "properties";

/// Field holding the old recursive tree layout.
pub const LEGACY_CLAIMS_KEY: &str = "claims";

/// Encode an identity as `{id, name}`.
pub fn identity_to_compound(identity: &Identity) -> Compound {
    let mut tag = Compound::new();
    tag.insert("id", Tag::Uuid(identity.id));
    tag.insert("name", Tag::String(identity.name.clone()));
    tag
}

/// Decode an identity, accepting the legacy `uuid` key for the id.
pub fn identity_from_compound(tag: &Compound) -> Identity {
    let id = tag
        .get_uuid("id")
        .or_else(|| tag.get_uuid("uuid"))
        .unwrap_or_else(Uuid::nil);
    let name = tag.get_str("name").unwrap_or_default().to_string();
    Identity { id, name }
}

fn identity_list(identities: &[Identity]) -> Tag {
    Tag::List(
        identities
            .iter()
            .map(|identity| Tag::Compound(identity_to_compound(identity)))
            .collect(),
    )
}

/// Encode one region.
pub fn region_to_compound(region: &Region) -> Compound {
    let mut tag = Compound::new();
    tag.insert("id", Tag::Uuid(region.id));
    tag.put_pos("min", region.bounds.min());
    tag.put_pos("max", region.bounds.max());
    tag.insert("owner", Tag::Compound(identity_to_compound(&region.owner)));
    tag.insert("lord", Tag::Compound(identity_to_compound(&region.lord)));
    tag.insert("whitelist", identity_list(&region.whitelist));
    tag.insert("permissions", Tag::Byte(region.permissions.bits()));
    tag.insert("fiefdom", Tag::Bool(region.is_fief()));
    if let Some(parent) = region.parent {
        tag.insert("parent", Tag::Uuid(parent));
    }
    if !region.children.is_empty() {
        tag.insert(
            "children",
            Tag::List(region.children.iter().copied().map(Tag::Uuid).collect()),
        );
    }
    if !region.names.is_empty() {
        let names = region
            .names
            .iter()
            .map(|(viewer, name)| {
                let mut entry = Compound::new();
                entry.insert("viewer", Tag::Uuid(*viewer));
                entry.insert("name", Tag::String(name.clone()));
                Tag::Compound(entry)
            })
            .collect();
        tag.insert("names", Tag::List(names));
    }
    tag.insert("create_time", Tag::Long(region.create_time));
    tag
}

/// Decode one region, substituting defaults for anything missing.
pub fn region_from_compound(tag: &Compound) -> Region {
    let id = tag.get_uuid("id").unwrap_or_else(|| {
        let fresh = Uuid::new_v4();
        warn!(%fresh, "persisted region has no id; assigning a new one");
        fresh
    });

    let min = tag.get_pos("min").unwrap_or(BlockPos::ORIGIN);
    let max = tag.get_pos("max").unwrap_or(min);
    if !tag.contains_key("min") || !tag.contains_key("max") {
        warn!(%id, "persisted region has no bounds; using an empty box at {min}");
    }

    let owner = tag
        .get_compound("owner")
        .map(identity_from_compound)
        .unwrap_or_default();
    let lord = tag
        .get_compound("lord")
        .map(identity_from_compound)
        .unwrap_or_else(|| owner.clone());

    let whitelist = tag
        .get_list("whitelist")
        .unwrap_or_default()
        .iter()
        .filter_map(Tag::as_compound)
        .map(identity_from_compound)
        .collect();

    let parent = tag.get_uuid("parent");
    if tag.get_bool("fiefdom").unwrap_or(false) && parent.is_none() {
        warn!(%id, "region is flagged as a fief but has no parent; loading it as a domain");
    }

    let children = tag
        .get_list("children")
        .unwrap_or_default()
        .iter()
        .filter_map(Tag::as_uuid)
        .collect();

    let names = tag
        .get_list("names")
        .unwrap_or_default()
        .iter()
        .filter_map(Tag::as_compound)
        .filter_map(|entry| Some((entry.get_uuid("viewer")?, entry.get_str("name")?.to_string())))
        .collect();

    Region {
        id,
        bounds: BlockBox::new(min, max),
        owner,
        whitelist,
        permissions: Permissions::from_bits_retain(tag.get_byte("permissions").unwrap_or(0)),
        lord,
        parent,
        children,
        names,
        create_time: tag.get_long("create_time").unwrap_or(0),
    }
}

/// Write `regions` as the flat list under [`PROPERTIES_KEY`].
pub fn write_regions<'a, I>(container: &mut Compound, regions: I)
where
    I: IntoIterator<Item = &'a Region>,
{
    let list = regions
        .into_iter()
        .map(|region| Tag::Compound(region_to_compound(region)))
        .collect();
    container.insert(PROPERTIES_KEY, Tag::List(list));
}

/// Read every region stored in `container`.
///
/// Prefers the flat list. When only the legacy tree is present it is walked
/// once, flattened, and removed from the container so the next save writes
/// the current layout.
pub fn read_regions(container: &mut Compound) -> Vec<Region> {
    if let Some(list) = container.get_list(PROPERTIES_KEY) {
        let regions: Vec<Region> = list
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry.as_compound() {
                Some(tag) => Some(region_from_compound(tag)),
                None => {
                    warn!(index, "skipping persisted region that is not a compound");
                    None
                }
            })
            .collect();
        if container.remove(LEGACY_CLAIMS_KEY).is_some() {
            debug!("discarded stale legacy claim tree next to current region list");
        }
        return regions;
    }

    match container.remove(LEGACY_CLAIMS_KEY) {
        Some(legacy) => {
            let regions = migrate_legacy_tree(&legacy);
            tracing::info!(count = regions.len(), "migrated legacy claim tree");
            regions
        }
        None => Vec::new(),
    }
}

/// Flatten the old node-per-claim tree in pre-order.
///
/// Replaying inserts in pre-order rebuilds the same tree shape the old save
/// described. Accepts either a single root node or a list of roots.
fn migrate_legacy_tree(legacy: &Tag) -> Vec<Region> {
    let mut pending: Vec<&Compound> = match legacy {
        Tag::Compound(root) => vec![root],
        Tag::List(roots) => roots.iter().rev().filter_map(Tag::as_compound).collect(),
        other => {
            warn!(?other, "legacy claim field has an unexpected shape; ignoring it");
            return Vec::new();
        }
    };

    let mut regions = Vec::new();
    while let Some(node) = pending.pop() {
        regions.push(legacy_node_to_region(node));
        // Right first so the left subtree is popped (and emitted) first.
        for side in ["right", "left"] {
            if let Some(child) = node.get_compound(side) {
                pending.push(child);
            }
        }
    }
    regions
}

fn legacy_node_to_region(node: &Compound) -> Region {
    let first = node.get_pos("coords1").unwrap_or(BlockPos::ORIGIN);
    let second = node.get_pos("coords2").unwrap_or(first);
    let owner = node
        .get_compound("data")
        .map(identity_from_compound)
        .unwrap_or_default();
    let mut region = Region::new(BlockBox::new(first, second), owner);
    // The old layout never recorded when a claim was made.
    region.create_time = 0;
    region
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimguard_core::Permission;

    fn legacy_node(a: [i32; 3], b: [i32; 3], owner: &Identity) -> Compound {
        let mut data = Compound::new();
        data.insert("uuid", Tag::String(owner.id.to_string()));
        data.insert("name", Tag::String(owner.name.clone()));

        let mut node = Compound::new();
        node.insert("coords1", Tag::IntArray(a.to_vec()));
        node.insert("coords2", Tag::IntArray(b.to_vec()));
        node.insert("min", Tag::Int(a[0].min(b[0])));
        node.insert("max", Tag::Int(a[0].max(b[0])));
        node.insert("data", Tag::Compound(data));
        node
    }

    #[test]
    fn region_survives_encoding() {
        let owner = Identity::new(Uuid::new_v4(), "Alex");
        let mut region = Region::new(
            BlockBox::new(BlockPos::new(-5, 60, 3), BlockPos::new(5, 70, 13)),
            owner,
        );
        region.set_permission(Permission::DoorInteract, true);
        region.whitelist_add(Identity::new(Uuid::new_v4(), "Sam"));
        region.children.push(Uuid::new_v4());
        region.set_display_name(Uuid::new_v4(), "Keep");

        let decoded = region_from_compound(&region_to_compound(&region));
        assert_eq!(decoded, region);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let mut tag = Compound::new();
        tag.insert("id", Tag::Uuid(Uuid::new_v4()));
        tag.insert("owner", Tag::String("not a compound".into()));

        let region = region_from_compound(&tag);
        assert_eq!(region.bounds, BlockBox::point(BlockPos::ORIGIN));
        assert!(region.owner.is_empty());
        assert!(region.whitelist.is_empty());
        assert!(region.permissions.is_empty());
    }

    #[test]
    fn corrupt_entry_does_not_block_the_rest() {
        let good = Region::new(
            BlockBox::new(BlockPos::new(0, 0, 0), BlockPos::new(4, 4, 4)),
            Identity::new(Uuid::new_v4(), "Alex"),
        );
        let mut container = Compound::new();
        container.insert(
            PROPERTIES_KEY,
            Tag::List(vec![
                Tag::Long(42),
                Tag::Compound(region_to_compound(&good)),
            ]),
        );

        let regions = read_regions(&mut container);
        assert_eq!(regions, vec![good]);
    }

    #[test]
    fn legacy_tree_is_flattened_in_pre_order_and_dropped() {
        let alex = Identity::new(Uuid::new_v4(), "Alex");
        let sam = Identity::new(Uuid::new_v4(), "Sam");

        let mut root = legacy_node([50, 60, 0], [60, 70, 10], &alex);
        let mut left = legacy_node([0, 60, 0], [10, 70, 10], &sam);
        left.insert("left", Tag::Compound(legacy_node([-30, 60, 0], [-20, 70, 10], &sam)));
        root.insert("left", Tag::Compound(left));
        root.insert("right", Tag::Compound(legacy_node([90, 60, 0], [80, 70, 10], &alex)));

        let mut container = Compound::new();
        container.insert(LEGACY_CLAIMS_KEY, Tag::List(vec![Tag::Compound(root)]));

        let regions = read_regions(&mut container);
        assert!(!container.contains_key(LEGACY_CLAIMS_KEY));

        let mins: Vec<i32> = regions.iter().map(|r| r.bounds.min().x).collect();
        assert_eq!(mins, vec![50, 0, -30, 80]);
        assert_eq!(regions[0].owner, alex);
        assert_eq!(regions[1].owner, sam);
        assert_eq!(regions[3].bounds.max(), BlockPos::new(90, 70, 10));
        assert!(regions.iter().all(Region::is_domain));
    }

    #[test]
    fn flat_list_wins_over_legacy_tree() {
        let alex = Identity::new(Uuid::new_v4(), "Alex");
        let region = Region::new(
            BlockBox::new(BlockPos::new(0, 0, 0), BlockPos::new(1, 1, 1)),
            alex.clone(),
        );
        let mut container = Compound::new();
        write_regions(&mut container, [&region]);
        container.insert(
            LEGACY_CLAIMS_KEY,
            Tag::Compound(legacy_node([5, 5, 5], [9, 9, 9], &alex)),
        );

        let regions = read_regions(&mut container);
        assert_eq!(regions, vec![region]);
        assert!(!container.contains_key(LEGACY_CLAIMS_KEY));
    }
}
