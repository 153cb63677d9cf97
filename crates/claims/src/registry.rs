//! The protection registry facade.
//!
//! One [`ProtectionRegistry`] exists per loaded world. It is created on world
//! load, filled from the save, handed by reference to whatever needs it and
//! cleared on unload.
//!
//! Region records live in a single arena keyed by [`RegionId`]. The interval
//! tree, the owner index and the min-corner index only store ids, so there is
//! exactly one copy of each owner, whitelist and permission set.
//!
//! All state sits behind one `RwLock`: overlap queries share the read side,
//! every mutation (including save and load) takes the write side for its full
//! duration, so no caller ever observes a half-linked tree or indexes that
//! disagree with it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use claimguard_core::{BlockBox, BlockPos, Border, Compound, Identity, Permission, Permissions};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::ClaimError;
use crate::interval::IntervalTree;
use crate::persist::{read_regions, write_regions};
use crate::region::{Region, RegionId};

#[derive(Debug, Default)]
struct RegistryState {
    tree: IntervalTree<RegionId>,
    regions: HashMap<RegionId, Region>,
    by_owner: HashMap<Uuid, Vec<RegionId>>,
    by_min_corner: BTreeMap<BlockPos, RegionId>,
}

impl RegistryState {
    fn insert(&mut self, region: Region) {
        let id = region.id;
        if let Some(previous) = self.by_min_corner.insert(region.bounds.min(), id) {
            if previous != id {
                warn!(
                    corner = %region.bounds.min(),
                    %previous,
                    new = %id,
                    "min corner already registered; older region no longer reachable by corner"
                );
            }
        }
        self.by_owner.entry(region.owner.id).or_default().push(id);
        self.tree.insert(region.bounds, id);
        self.regions.insert(id, region);
    }

    fn unindex_owner(&mut self, owner: Uuid, id: RegionId) {
        if let Some(ids) = self.by_owner.get_mut(&owner) {
            ids.retain(|candidate| *candidate != id);
            if ids.is_empty() {
                self.by_owner.remove(&owner);
            }
        }
    }

    /// Remove a region and every fief below it from all indexes.
    fn detach(&mut self, id: RegionId, removed: &mut Vec<Region>) {
        let Some(region) = self.regions.remove(&id) else {
            return;
        };
        if let Some(parent) = region.parent.and_then(|parent| self.regions.get_mut(&parent)) {
            parent.children.retain(|child| *child != id);
        }
        self.tree.remove_entry(&region.bounds, &id);
        if self.by_min_corner.get(&region.bounds.min()) == Some(&id) {
            self.by_min_corner.remove(&region.bounds.min());
        }
        self.unindex_owner(region.owner.id, id);

        let children = region.children.clone();
        removed.push(region);
        for child in children {
            self.detach(child, removed);
        }
    }

    fn region_mut(&mut self, id: RegionId) -> Result<&mut Region, ClaimError> {
        self.regions
            .get_mut(&id)
            .ok_or(ClaimError::UnknownRegion(id))
    }

    fn first_region_at(&self, query: &BlockBox, border: Border) -> Option<&Region> {
        let (_, id) = self.tree.first_overlapping(query, border)?;
        self.regions.get(id)
    }

    fn check_free(&self, bounds: &BlockBox) -> Result<(), ClaimError> {
        if let Some((existing, _)) = self.tree.first_overlapping(bounds, Border::Exclusive) {
            return Err(ClaimError::Overlaps {
                requested: *bounds,
                existing: *existing,
            });
        }
        if self.by_min_corner.contains_key(&bounds.min()) {
            return Err(ClaimError::CornerTaken(bounds.min()));
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.tree.clear();
        self.regions.clear();
        self.by_owner.clear();
        self.by_min_corner.clear();
    }
}

/// Spatial index of claimed regions plus the permission checks built on it.
#[derive(Debug, Default)]
pub struct ProtectionRegistry {
    state: RwLock<RegistryState>,
    default_permissions: Permissions,
}

impl ProtectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry whose new claims start with `permissions` set.
    pub fn with_default_permissions(permissions: Permissions) -> Self {
        Self {
            state: RwLock::default(),
            default_permissions: permissions,
        }
    }

    /// Permissions applied to newly created claims.
    pub fn default_permissions(&self) -> Permissions {
        self.default_permissions
    }

    // Every mutation finishes before its guard drops, so the state behind a
    // poisoned lock is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(|poisoned| {
            warn!("protection registry lock was poisoned; continuing");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(|poisoned| {
            warn!("protection registry lock was poisoned; continuing");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Number of registered regions.
    pub fn len(&self) -> usize {
        self.read().regions.len()
    }

    /// Returns true when nothing is claimed.
    pub fn is_empty(&self) -> bool {
        self.read().regions.is_empty()
    }

    /// Depth of the spatial index. The tree is unbalanced, so this grows
    /// linearly when claims are added in sorted X order.
    pub fn tree_depth(&self) -> usize {
        self.read().tree.depth()
    }

    /// Register a new claim owned by `owner`.
    ///
    /// The caller must first make sure the box is free (see
    /// [`is_protected_range`](Self::is_protected_range) or use
    /// [`try_add_protection`](Self::try_add_protection)). Reusing a min corner
    /// re-points the corner index at the new region while the old one stays in
    /// the tree.
    pub fn add_protection(&self, bounds: BlockBox, owner: Identity) -> Region {
        let mut region = Region::new(bounds, owner);
        region.permissions = self.default_permissions;
        debug!(id = %region.id, %bounds, owner = %region.owner, "adding protection");
        self.write().insert(region.clone());
        region
    }

    /// Register a new claim if it shares no interior volume with an existing
    /// one and its min corner is unused. Flush placement is allowed.
    pub fn try_add_protection(
        &self,
        bounds: BlockBox,
        owner: Identity,
    ) -> Result<Region, ClaimError> {
        let mut state = self.write();
        state.check_free(&bounds)?;
        let mut region = Region::new(bounds, owner);
        region.permissions = self.default_permissions;
        debug!(id = %region.id, %bounds, owner = %region.owner, "adding protection");
        state.insert(region.clone());
        Ok(region)
    }

    /// Carve a vacant fief out of `parent`.
    ///
    /// The fief must lie inside the parent, must not overlap another fief of
    /// the same parent and must not reuse a min corner.
    pub fn add_fief(&self, parent: RegionId, bounds: BlockBox) -> Result<Region, ClaimError> {
        let mut state = self.write();
        let parent_region = state
            .regions
            .get(&parent)
            .ok_or(ClaimError::UnknownRegion(parent))?;
        if !parent_region.bounds.contains_box(&bounds) {
            return Err(ClaimError::OutsideParent {
                requested: bounds,
                parent: parent_region.bounds,
            });
        }
        for sibling in &parent_region.children {
            if let Some(sibling) = state.regions.get(sibling) {
                if sibling.bounds.overlaps(&bounds, Border::Exclusive) {
                    return Err(ClaimError::Overlaps {
                        requested: bounds,
                        existing: sibling.bounds,
                    });
                }
            }
        }
        if state.by_min_corner.contains_key(&bounds.min()) {
            return Err(ClaimError::CornerTaken(bounds.min()));
        }

        let fief = Region::new_fief(bounds, parent_region);
        debug!(id = %fief.id, %parent, %bounds, "adding fief");
        state.region_mut(parent)?.children.push(fief.id);
        state.insert(fief.clone());
        Ok(fief)
    }

    /// Hand a fief to a new owner (or back to vacancy with the empty identity).
    pub fn assign_fief(&self, fief: RegionId, owner: Identity) -> Result<(), ClaimError> {
        let mut state = self.write();
        let region = state.region_mut(fief)?;
        if !region.is_fief() {
            return Err(ClaimError::NotAFief(fief));
        }
        let previous = std::mem::replace(&mut region.owner, owner.clone());
        state.unindex_owner(previous.id, fief);
        state.by_owner.entry(owner.id).or_default().push(fief);
        debug!(%fief, from = %previous, to = %owner, "assigned fief");
        Ok(())
    }

    /// Remove every region sharing interior volume with `bounds` (plus any
    /// region with exactly these bounds). Fiefs go with their parent.
    pub fn remove_protection(&self, bounds: BlockBox) -> Vec<Region> {
        let mut state = self.write();
        let ids: Vec<RegionId> = state
            .tree
            .overlapping(&bounds, Border::Exclusive)
            .into_iter()
            .map(|(_, id)| *id)
            .collect();
        let mut removed = Vec::new();
        for id in ids {
            state.detach(id, &mut removed);
        }
        if removed.is_empty() {
            debug!(%bounds, "no protection to remove");
        }
        removed
    }

    /// Like [`remove_protection`](Self::remove_protection) but only touches
    /// regions owned by `owner`.
    pub fn remove_protection_owned(&self, bounds: BlockBox, owner: Uuid) -> Vec<Region> {
        let mut state = self.write();
        let RegistryState { tree, regions, .. } = &mut *state;
        let hits = tree.remove_overlapping_where(&bounds, Border::Exclusive, |id| {
            regions
                .get(id)
                .is_some_and(|region| region.owner.id == owner)
        });
        let mut removed = Vec::new();
        for (_, id) in hits {
            state.detach(id, &mut removed);
        }
        if removed.is_empty() {
            warn!(%bounds, %owner, "owner-scoped removal matched no region");
        }
        removed
    }

    /// Remove every region owned by `owner`, e.g. when wiping player data.
    pub fn remove_protections_of(&self, owner: Uuid) -> Vec<Region> {
        let mut state = self.write();
        let RegistryState { tree, regions, .. } = &mut *state;
        let hits = tree.remove_all_where(|_, id| {
            regions
                .get(id)
                .is_some_and(|region| region.owner.id == owner)
        });
        let mut removed = Vec::new();
        for (_, id) in hits {
            state.detach(id, &mut removed);
        }
        if removed.is_empty() {
            warn!(%owner, "owner has no protections to remove");
        } else {
            info!(%owner, count = removed.len(), "removed all protections of owner");
        }
        removed
    }

    /// Whether any region covers `pos` (faces included).
    pub fn is_protected(&self, pos: BlockPos) -> bool {
        self.read()
            .tree
            .first_overlapping(&BlockBox::point(pos), Border::Inclusive)
            .is_some()
    }

    /// Whether any region touches the box spanned by two corners.
    pub fn is_protected_range(&self, a: BlockPos, b: BlockPos) -> bool {
        self.read()
            .tree
            .first_overlapping(&BlockBox::new(a, b), Border::Inclusive)
            .is_some()
    }

    /// Whether `actor` is blocked from doing `permission` at `pos`.
    ///
    /// Only the first region found at `pos` is evaluated. Where regions nest
    /// (a domain and its fiefs) the answer depends on which one the tree
    /// reaches first.
    pub fn is_protected_against(&self, pos: BlockPos, actor: Uuid, permission: Permission) -> bool {
        let state = self.read();
        match state.first_region_at(&BlockBox::point(pos), Border::Inclusive) {
            Some(region) => !region.allows(&actor, permission),
            None => false,
        }
    }

    /// Every region owned by `owner`.
    pub fn protections_of(&self, owner: Uuid) -> Vec<Region> {
        let state = self.read();
        state
            .by_owner
            .get(&owner)
            .into_iter()
            .flatten()
            .filter_map(|id| state.regions.get(id))
            .cloned()
            .collect()
    }

    /// Raw overlap query returning the matching boxes.
    pub fn overlapping_boxes(
        &self,
        a: BlockPos,
        b: BlockPos,
        find_fast: bool,
        include_border: bool,
    ) -> Vec<BlockBox> {
        self.read()
            .tree
            .query(&BlockBox::new(a, b), find_fast, include_border)
            .into_iter()
            .map(|(bounds, _)| *bounds)
            .collect()
    }

    /// Region keyed at this min corner.
    pub fn region_at_min_corner(&self, pos: BlockPos) -> Option<Region> {
        let state = self.read();
        let id = state.by_min_corner.get(&pos)?;
        state.regions.get(id).cloned()
    }

    /// Region by id.
    pub fn region(&self, id: RegionId) -> Option<Region> {
        self.read().regions.get(&id).cloned()
    }

    /// Linear scan over all corner-indexed regions.
    pub fn find_by<F>(&self, mut predicate: F) -> Vec<Region>
    where
        F: FnMut(&Region) -> bool,
    {
        let state = self.read();
        state
            .by_min_corner
            .values()
            .filter_map(|id| state.regions.get(id))
            .filter(|&region| predicate(region))
            .cloned()
            .collect()
    }

    /// Every region in tree order.
    pub fn list(&self) -> Vec<Region> {
        let state = self.read();
        state
            .tree
            .iter()
            .filter_map(|(_, id)| state.regions.get(id))
            .cloned()
            .collect()
    }

    /// One diagnostic line per region, in tree order.
    pub fn to_string_list(&self) -> Vec<String> {
        self.list()
            .iter()
            .map(|region| {
                let kind = if region.is_fief() { "fief" } else { "domain" };
                format!(
                    "{} [{}] owner={} id={} perms={:#04x} whitelist={}",
                    region.bounds,
                    kind,
                    region.owner,
                    region.id,
                    region.permissions.bits(),
                    region.whitelist.len()
                )
            })
            .collect()
    }

    /// Set or clear one public permission bit on a region.
    pub fn set_permission(
        &self,
        id: RegionId,
        permission: Permission,
        value: bool,
    ) -> Result<(), ClaimError> {
        self.write().region_mut(id)?.set_permission(permission, value);
        Ok(())
    }

    /// Append to a region's whitelist. Returns false if already listed.
    pub fn add_to_whitelist(&self, id: RegionId, identity: Identity) -> Result<bool, ClaimError> {
        Ok(self.write().region_mut(id)?.whitelist_add(identity))
    }

    /// Drop the first whitelist entry with this display name.
    pub fn remove_from_whitelist_by_name(
        &self,
        id: RegionId,
        name: &str,
    ) -> Result<bool, ClaimError> {
        Ok(self.write().region_mut(id)?.whitelist_remove_by_name(name))
    }

    /// Name a region for one viewer.
    pub fn set_display_name(
        &self,
        id: RegionId,
        viewer: Uuid,
        name: impl Into<String>,
    ) -> Result<(), ClaimError> {
        self.write().region_mut(id)?.set_display_name(viewer, name);
        Ok(())
    }

    /// Forget every region (world unload).
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Write every region into `container` as a flat list.
    #[instrument(skip_all)]
    pub fn save(&self, container: &mut Compound) {
        let state = self.write();
        // Pre-order, so replaying the list on load rebuilds the same tree shape.
        let ordered = state
            .tree
            .pre_order()
            .filter_map(|(_, id)| state.regions.get(id));
        write_regions(container, ordered);
        debug!(count = state.regions.len(), "saved protections");
    }

    /// Replace the registry contents with the regions stored in `container`.
    ///
    /// A legacy tree field is migrated and removed from `container`. Returns the
    /// number of regions loaded.
    #[instrument(skip_all)]
    pub fn load(&self, container: &mut Compound) -> usize {
        let regions = read_regions(container);
        let mut state = self.write();
        state.clear();

        for region in regions {
            if state.regions.contains_key(&region.id) {
                warn!(id = %region.id, "duplicate region id in save; keeping the first");
                continue;
            }
            if state.by_min_corner.contains_key(&region.bounds.min()) {
                warn!(
                    id = %region.id,
                    corner = %region.bounds.min(),
                    "two saved regions share a min corner; skipping the later one"
                );
                continue;
            }
            state.insert(region);
        }

        // Drop links to regions that did not make it into the registry.
        let known: HashSet<RegionId> = state.regions.keys().copied().collect();
        for region in state.regions.values_mut() {
            if region.parent.is_some_and(|parent| !known.contains(&parent)) {
                warn!(id = %region.id, "parent region missing from save; promoting to domain");
                region.parent = None;
            }
            let before = region.children.len();
            region.children.retain(|child| known.contains(child));
            if region.children.len() != before {
                warn!(id = %region.id, "dropped links to missing fiefs");
            }
        }

        let count = state.regions.len();
        info!(count, "loaded protections");
        count
    }
}
