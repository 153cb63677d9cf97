//! Region records: a claimed box plus ownership, whitelist and permissions.

use std::collections::BTreeMap;

use claimguard_core::{BlockBox, Identity, Permission, Permissions};
use uuid::Uuid;

/// Stable id of a registered region.
pub type RegionId = Uuid;

/// A claimed region.
///
/// Top-level claims are *domains*. A domain can be subdivided into *fiefs*
/// which point back at it through `parent`; a fief starts out vacant (owned by
/// [`Identity::EMPTY`]) and records the domain owner as its `lord`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Registry-wide id.
    pub id: RegionId,
    /// Claimed blocks. `bounds.min()` is the coordinate key of the region.
    pub bounds: BlockBox,
    /// Current owner, or the empty identity for a vacant fief.
    pub owner: Identity,
    /// Players granted the owner's rights, in the order they were added.
    pub whitelist: Vec<Identity>,
    /// Interactions open to everyone.
    pub permissions: Permissions,
    /// Who granted the region. Equal to `owner` for domains.
    pub lord: Identity,
    /// Enclosing domain for fiefs.
    pub parent: Option<RegionId>,
    /// Fiefs carved out of this region.
    pub children: Vec<RegionId>,
    /// Display names chosen per viewer.
    pub names: BTreeMap<Uuid, String>,
    /// Creation time in unix milliseconds.
    pub create_time: i64,
}

impl Region {
    /// Create a domain owned by `owner` with a fresh id.
    pub fn new(bounds: BlockBox, owner: Identity) -> Self {
        Self {
            id: Uuid::new_v4(),
            bounds,
            lord: owner.clone(),
            owner,
            whitelist: Vec::new(),
            permissions: Permissions::empty(),
            parent: None,
            children: Vec::new(),
            names: BTreeMap::new(),
            create_time: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a vacant fief inside `parent`.
    pub fn new_fief(bounds: BlockBox, parent: &Region) -> Self {
        let mut fief = Self::new(bounds, Identity::EMPTY);
        fief.lord = parent.owner.clone();
        fief.parent = Some(parent.id);
        fief.permissions = parent.permissions;
        fief
    }

    /// Top-level region held by its own lord.
    pub fn is_domain(&self) -> bool {
        self.parent.is_none() && self.lord == self.owner
    }

    /// Subdivision of another region.
    pub fn is_fief(&self) -> bool {
        self.parent.is_some()
    }

    /// Nobody owns the region yet.
    pub fn is_vacant(&self) -> bool {
        self.owner.is_empty()
    }

    /// Whether the bit for `permission` is set.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(permission.flag())
    }

    /// Set or clear the bit for `permission`.
    pub fn set_permission(&mut self, permission: Permission, value: bool) {
        self.permissions.set(permission.flag(), value);
    }

    /// Whitelist membership, matched by id.
    pub fn is_whitelisted(&self, id: &Uuid) -> bool {
        self.whitelist.iter().any(|entry| entry.id == *id)
    }

    /// Append to the whitelist. Returns false if this exact identity is
    /// already listed.
    pub fn whitelist_add(&mut self, identity: Identity) -> bool {
        if self.whitelist.contains(&identity) {
            return false;
        }
        self.whitelist.push(identity);
        true
    }

    /// Remove the first whitelist entry carrying `name`.
    ///
    /// UI flows only know the display name, so this matches by name and not
    /// by id.
    pub fn whitelist_remove_by_name(&mut self, name: &str) -> bool {
        match self.whitelist.iter().position(|entry| entry.name == name) {
            Some(index) => {
                self.whitelist.remove(index);
                true
            }
            None => false,
        }
    }

    /// Display name `viewer` gave this region.
    pub fn display_name(&self, viewer: &Uuid) -> Option<&str> {
        self.names.get(viewer).map(String::as_str)
    }

    /// Name the region for `viewer`. An empty name clears it.
    pub fn set_display_name(&mut self, viewer: Uuid, name: impl Into<String>) {
        let name = name.into();
        if name.is_empty() {
            self.names.remove(&viewer);
        } else {
            self.names.insert(viewer, name);
        }
    }

    /// Authorization decision for one region.
    ///
    /// The owner may always act. A vacant region lets nobody act. Otherwise the
    /// actor needs either the public permission bit or a whitelist entry.
    pub fn allows(&self, actor: &Uuid, permission: Permission) -> bool {
        if self.is_vacant() {
            return false;
        }
        self.owner.id == *actor || self.has_permission(permission) || self.is_whitelisted(actor)
    }
}
