use crate::key::KeyTuple;
use crate::session::instance::InstanceId;
use crate::value::Value;
use crate::values::PropertyValues;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

///
/// EntityState
///
/// Lifecycle state of one tracked entry. Flat: no nested sub-states.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum EntityState {
    Added,
    Deleted,
    Detached,
    Modified,
    Unchanged,
}

impl EntityState {
    /// True for states the persistence collaborator has work to do for.
    #[must_use]
    pub const fn is_dirty(self) -> bool {
        matches!(self, Self::Added | Self::Deleted | Self::Modified)
    }

    #[must_use]
    pub const fn is_tracked(self) -> bool {
        !matches!(self, Self::Detached)
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Detached => "detached",
            Self::Modified => "modified",
            Self::Unchanged => "unchanged",
        };
        write!(f, "{label}")
    }
}

///
/// Entry
///
/// Crate-internal tracking record for one instance: lifecycle state, the
/// original snapshot, the dirty-property set, and the navigation state as
/// of the last fixup pass (the change detector's baseline).
///

#[derive(Debug)]
pub(crate) struct Entry {
    pub id: InstanceId,
    pub entity: &'static str,
    pub state: EntityState,
    pub original: PropertyValues,
    pub dirty: BTreeSet<&'static str>,
    pub nav_refs: BTreeMap<&'static str, Option<InstanceId>>,
    pub nav_collections: BTreeMap<&'static str, Vec<InstanceId>>,
}

impl Entry {
    pub(crate) fn new(
        id: InstanceId,
        entity: &'static str,
        state: EntityState,
        original: PropertyValues,
    ) -> Self {
        Self {
            id,
            entity,
            state,
            original,
            dirty: BTreeSet::new(),
            nav_refs: BTreeMap::new(),
            nav_collections: BTreeMap::new(),
        }
    }
}

///
/// EntryView
///
/// Point-in-time public snapshot of one entry, as handed to the
/// persistence collaborator by `entries()` / `entry()`.
///

#[derive(Clone, Debug)]
pub struct EntryView {
    pub id: InstanceId,
    pub entity: &'static str,
    pub state: EntityState,
    pub key: KeyTuple,
    pub has_conceptual_null: bool,
    /// Property names currently marked modified, in lexical order.
    pub dirty: Vec<&'static str>,
}

///
/// PropertyView
///
/// Current/original/modified view of a single property on one entry.
///

#[derive(Clone, Debug)]
pub struct PropertyView {
    pub name: String,
    pub current: Value,
    pub original: Value,
    pub is_modified: bool,
}
