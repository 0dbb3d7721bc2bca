mod cascade;
mod changes;
mod entry;
mod fixup;
mod graph;
mod guard;
mod instance;
mod reload;


use crate::error::TrackError;
use crate::key::KeyTuple;
use crate::model::ModelRegistry;
use crate::snapshot::SnapshotSource;
use crate::value::Value;
use crate::values::{PropertyValues, ValuesRole, ValuesSource};
use entry::Entry;
use guard::{OperationGuard, OperationScope};
use instance::InstanceArena;
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error as ThisError;

// re-exports
pub use entry::{EntityState, EntryView, PropertyView};
pub use graph::{TrackCandidate, TrackPolicy};
pub use instance::{Instance, InstanceId};

///
/// SessionError
///

#[derive(Debug, ThisError)]
pub enum SessionError {
    #[error("instance {id} is not materialized in this session")]
    UnknownInstance { id: InstanceId },

    #[error("instance {id} is not tracked")]
    NotTracked { id: InstanceId },

    #[error("an instance with root entity {entity} and key {key} is already tracked")]
    IdentityConflict {
        entity: &'static str,
        key: KeyTuple,
    },

    #[error("the unit of work is already in use; concurrent method invocation is not supported")]
    ConcurrentInvocation,

    #[error("property {property} on entity {entity} holds a conceptual null; no value can be written for it")]
    ConceptualNull {
        entity: &'static str,
        property: &'static str,
    },

    #[error("no snapshot source is attached to this session")]
    NoSnapshotSource,

    #[error("navigation {navigation} expects an instance of {expected}, got {found}")]
    WrongEntityForNavigation {
        navigation: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot track entity {entity} as {state} without a fully set key")]
    KeyNotSet {
        entity: &'static str,
        state: EntityState,
    },
}

///
/// CascadeTiming
///
/// When the delete/cascade resolver touches tracked dependents: as soon as
/// the principal transitions (default), or deferred until an explicit
/// `cascade_changes` sweep before save.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CascadeTiming {
    #[default]
    Immediate,
    OnAccept,
}

///
/// TrackerOptions
///

#[derive(Clone, Copy, Debug)]
pub struct TrackerOptions {
    /// Run change detection implicitly before `entries()` and
    /// `has_changes()` snapshots.
    pub auto_detect_changes: bool,
    pub cascade_timing: CascadeTiming,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            auto_detect_changes: true,
            cascade_timing: CascadeTiming::Immediate,
        }
    }
}

///
/// Session
///
/// The unit of work: owns the instance arena, one tracking entry per
/// tracked instance, and the identity map. Exclusively single-threaded;
/// every public operation enters the critical-section guard first.
///

pub struct Session {
    model: Arc<ModelRegistry>,
    options: TrackerOptions,
    arena: InstanceArena,
    entries: BTreeMap<InstanceId, Entry>,
    identity: BTreeMap<(&'static str, KeyTuple), InstanceId>,
    guard: OperationGuard,
    source: Option<Box<dyn SnapshotSource>>,
    deferred_cascades: Vec<InstanceId>,
}

impl Session {
    #[must_use]
    pub fn new(model: Arc<ModelRegistry>) -> Self {
        Self {
            model,
            options: TrackerOptions::default(),
            arena: InstanceArena::default(),
            entries: BTreeMap::new(),
            identity: BTreeMap::new(),
            guard: OperationGuard::default(),
            source: None,
            deferred_cascades: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: TrackerOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach the persistence collaborator's snapshot boundary.
    #[must_use]
    pub fn with_source(mut self, source: Box<dyn SnapshotSource>) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn model(&self) -> &Arc<ModelRegistry> {
        &self.model
    }

    #[must_use]
    pub const fn options(&self) -> TrackerOptions {
        self.options
    }

    //
    // Materialization
    //

    /// Materialize a fresh, untracked instance of `entity` in the arena.
    pub fn new_instance(&mut self, entity: &str) -> Result<InstanceId, TrackError> {
        let _scope = self.begin()?;
        let model = Arc::clone(self.model.entity(entity)?);
        Ok(self.arena.insert(Instance::new(&model)))
    }

    pub fn instance(&self, id: InstanceId) -> Result<&Instance, TrackError> {
        self.arena
            .get(id)
            .ok_or_else(|| SessionError::UnknownInstance { id }.into())
    }

    //
    // Scalar access
    //

    pub fn get_value(&self, id: InstanceId, property: &str) -> Result<Value, TrackError> {
        Ok(self.instance(id)?.values().get(property)?.clone())
    }

    /// Write one scalar slot. On a tracked entry this marks the property
    /// dirty and, for foreign-key properties, immediately re-runs fixup;
    /// key slots stay writable only while the entry is Added or the
    /// instance is untracked.
    pub fn set_value(
        &mut self,
        id: InstanceId,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<(), TrackError> {
        let _scope = self.begin()?;
        self.set_value_locked(id, property, value.into())
    }

    /// Copy same-named values from `source` into the current store,
    /// following the batch rules of `PropertyValues::set_values`.
    pub fn set_current_values<'a>(
        &mut self,
        id: InstanceId,
        source: impl Into<ValuesSource<'a>>,
    ) -> Result<(), TrackError> {
        let _scope = self.begin()?;

        let before: Vec<(String, Value)> = {
            let values = self.instance_values(id)?;
            values
                .properties()
                .map(|p| {
                    let value = values.get(p.name).expect("declared property").clone();
                    (p.name.to_string(), value)
                })
                .collect()
        };

        let instance = self
            .arena
            .get_mut(id)
            .ok_or(SessionError::UnknownInstance { id })?;
        instance.values_mut().set_values(source)?;

        // Re-run bookkeeping for every slot the batch actually changed.
        for (name, old) in before {
            let now = self.instance_values(id)?.get(&name)?.clone();
            if now != old {
                self.after_scalar_write(id, &name)?;
            }
        }
        Ok(())
    }

    /// Live handle to the current store. Writes through this handle are the
    /// raw FK-scalar mutation path; the change detector reconciles them on
    /// its next sweep.
    pub fn current_values(&self, id: InstanceId) -> Result<&PropertyValues, TrackError> {
        Ok(self.instance(id)?.values())
    }

    /// Mutable raw handle to the current store. No dirty marking and no
    /// fixup happen here; call `detect_changes` to reconcile.
    pub fn current_values_mut(&mut self, id: InstanceId) -> Result<&mut PropertyValues, TrackError> {
        let instance = self
            .arena
            .get_mut(id)
            .ok_or(SessionError::UnknownInstance { id })?;
        Ok(instance.values_mut())
    }

    pub fn original_values(&self, id: InstanceId) -> Result<&PropertyValues, TrackError> {
        Ok(&self.live_entry(id)?.original)
    }

    /// Write one original-value slot; null on a non-nullable slot fails
    /// immediately here, originals represent an already-persisted row.
    pub fn set_original_value(
        &mut self,
        id: InstanceId,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<(), TrackError> {
        let _scope = self.begin()?;
        let entry = self
            .entries
            .get_mut(&id)
            .filter(|e| e.state.is_tracked())
            .ok_or(SessionError::NotTracked { id })?;
        entry.original.set(property, value.into())?;
        self.refresh_dirty_mark(id, property)?;
        Ok(())
    }

    pub fn set_original_values<'a>(
        &mut self,
        id: InstanceId,
        source: impl Into<ValuesSource<'a>>,
    ) -> Result<(), TrackError> {
        let _scope = self.begin()?;
        let entry = self
            .entries
            .get_mut(&id)
            .filter(|e| e.state.is_tracked())
            .ok_or(SessionError::NotTracked { id })?;
        entry.original.set_values(source)?;

        let names: Vec<&'static str> = self.entry_model(id)?.properties().map(|p| p.name).collect();
        for name in names {
            self.refresh_dirty_mark(id, name)?;
        }
        Ok(())
    }

    /// Current/original/modified view of one property.
    pub fn property(&self, id: InstanceId, property: &str) -> Result<PropertyView, TrackError> {
        let entry = self.live_entry(id)?;
        let current = self.instance(id)?.values().get(property)?.clone();
        let original = entry.original.get(property)?.clone();
        Ok(PropertyView {
            name: property.to_string(),
            current,
            original,
            is_modified: entry.dirty.iter().any(|d| *d == property),
        })
    }

    /// Force or clear the per-property modified mark. Marking any property
    /// flips an Unchanged entry to Modified; clearing the last mark flips
    /// a Modified entry back to Unchanged.
    pub fn set_property_modified(
        &mut self,
        id: InstanceId,
        property: &str,
        modified: bool,
    ) -> Result<(), TrackError> {
        let _scope = self.begin()?;
        // Resolve through the store so an unknown name raises PropertyNotFound.
        let name = {
            self.instance_values(id)?.get(property)?;
            self.entry_model(id)?
                .property(property)
                .expect("store resolved the property")
                .name
        };

        let entry = self
            .entries
            .get_mut(&id)
            .filter(|e| e.state.is_tracked())
            .ok_or(SessionError::NotTracked { id })?;
        if modified {
            entry.dirty.insert(name);
            if entry.state == EntityState::Unchanged {
                entry.state = EntityState::Modified;
            }
        } else {
            entry.dirty.remove(name);
            if entry.state == EntityState::Modified && entry.dirty.is_empty() {
                entry.state = EntityState::Unchanged;
            }
        }
        Ok(())
    }

    pub fn has_conceptual_null(&self, id: InstanceId) -> Result<bool, TrackError> {
        Ok(self.instance(id)?.values().has_conceptual_null())
    }

    /// Save gate for the persistence collaborator: errors on the first
    /// pending conceptual null anywhere in the tracked graph.
    pub fn ensure_saveable(&self) -> Result<(), TrackError> {
        for entry in self.entries.values().filter(|e| e.state.is_tracked()) {
            let values = self
                .arena
                .get(entry.id)
                .expect("tracked entries always have an instance")
                .values();
            if let Some(property) = values.conceptual_null_properties().first().copied() {
                return Err(SessionError::ConceptualNull {
                    entity: entry.entity,
                    property,
                }
                .into());
            }
        }
        Ok(())
    }

    //
    // Navigation access
    //

    pub fn reference(&self, id: InstanceId, navigation: &str) -> Result<Option<InstanceId>, TrackError> {
        Ok(self.instance(id)?.reference(navigation))
    }

    pub fn collection(&self, id: InstanceId, navigation: &str) -> Result<Vec<InstanceId>, TrackError> {
        Ok(self.instance(id)?.collection(navigation).to_vec())
    }

    //
    // Entries and lifecycle
    //

    /// Snapshot of all live entries, in id order. Runs change detection
    /// first when `auto_detect_changes` is on.
    pub fn entries(&mut self) -> Result<Vec<EntryView>, TrackError> {
        let _scope = self.begin()?;
        if self.options.auto_detect_changes {
            self.detect_changes_locked()?;
        }
        let ids: Vec<InstanceId> = self
            .entries
            .values()
            .filter(|e| e.state.is_tracked())
            .map(|e| e.id)
            .collect();
        ids.into_iter().map(|id| self.entry_view(id)).collect()
    }

    pub fn entry_ids(&self) -> Vec<InstanceId> {
        self.entries
            .values()
            .filter(|e| e.state.is_tracked())
            .map(|e| e.id)
            .collect()
    }

    /// Entry view for one instance; untracked materialized instances
    /// report as Detached.
    pub fn entry(&self, id: InstanceId) -> Result<EntryView, TrackError> {
        self.instance(id)?;
        self.entry_view(id)
    }

    /// Idempotent per-instance tracking record: the same instance always
    /// yields the same entry while materialized.
    pub fn get_or_create_entry(&mut self, id: InstanceId) -> Result<EntryView, TrackError> {
        let _scope = self.begin()?;
        self.instance(id)?;
        if !self.entries.contains_key(&id) {
            let original = self.detached_original(id)?;
            let entity = self.instance(id)?.entity();
            self.entries
                .insert(id, Entry::new(id, entity, EntityState::Detached, original));
        }
        self.entry_view(id)
    }

    pub fn state(&self, id: InstanceId) -> Result<EntityState, TrackError> {
        self.instance(id)?;
        Ok(self
            .entries
            .get(&id)
            .map_or(EntityState::Detached, |e| e.state))
    }

    /// Explicit state seam: any transition is legal. Transitions into
    /// Deleted or Detached run the cascade resolver for relationships this
    /// instance is principal of; setting Modified marks every non-key
    /// property dirty; setting Unchanged clears the dirty set.
    pub fn set_state(&mut self, id: InstanceId, state: EntityState) -> Result<(), TrackError> {
        let _scope = self.begin()?;
        self.set_state_locked(id, state)
    }

    pub fn detach(&mut self, id: InstanceId) -> Result<(), TrackError> {
        self.set_state(id, EntityState::Detached)
    }

    /// True when any entry has pending work for the persistence
    /// collaborator.
    pub fn has_changes(&mut self) -> Result<bool, TrackError> {
        let _scope = self.begin()?;
        if self.options.auto_detect_changes {
            self.detect_changes_locked()?;
        }
        Ok(self.entries.values().any(|e| e.state.is_dirty()))
    }

    /// Post-save acknowledgment: Added and Modified entries become
    /// Unchanged with fresh original snapshots; Deleted entries are
    /// dropped from tracking.
    pub fn accept_all_changes(&mut self) -> Result<(), TrackError> {
        let _scope = self.begin()?;

        let ids: Vec<InstanceId> = self.entries.keys().copied().collect();
        for id in ids {
            let state = self.entries[&id].state;
            match state {
                EntityState::Added | EntityState::Modified => {
                    // Added entries may have received generated keys since
                    // tracking started; register them now.
                    let key = self.key_of(id)?;
                    if state == EntityState::Added && key.is_set() {
                        self.register_identity(id, &key)?;
                    }

                    let snapshot = {
                        let mut snapshot = self.instance(id)?.values().clone_values();
                        snapshot.set_role(ValuesRole::Original);
                        snapshot.clear_conceptual_nulls();
                        snapshot
                    };
                    let entry = self.entries.get_mut(&id).expect("iterated id");
                    entry.original = snapshot;
                    entry.dirty.clear();
                    entry.state = EntityState::Unchanged;
                }
                EntityState::Deleted => {
                    self.drop_entry(id);
                }
                EntityState::Detached | EntityState::Unchanged => {}
            }
        }
        Ok(())
    }

    /// Detach every entry and empty the identity map. Instances stay
    /// materialized in the arena.
    pub fn clear(&mut self) -> Result<(), TrackError> {
        let _scope = self.begin()?;
        let ids: Vec<InstanceId> = self.entries.keys().copied().collect();
        for id in ids {
            if let Some(instance) = self.arena.get_mut(id) {
                instance.values_mut().set_role(ValuesRole::Detached);
            }
        }
        self.entries.clear();
        self.identity.clear();
        self.deferred_cascades.clear();
        Ok(())
    }

    //
    // crate-internal plumbing
    //

    pub(crate) fn begin(&self) -> Result<OperationScope, SessionError> {
        self.guard
            .enter()
            .ok_or(SessionError::ConcurrentInvocation)
    }

    pub(crate) fn set_value_locked(
        &mut self,
        id: InstanceId,
        property: &str,
        value: Value,
    ) -> Result<(), TrackError> {
        let instance = self
            .arena
            .get_mut(id)
            .ok_or(SessionError::UnknownInstance { id })?;
        let entity = instance.entity();
        let is_key = self.model.entity(entity)?.is_key(property);
        let tracked_state = self
            .entries
            .get(&id)
            .filter(|e| e.state.is_tracked())
            .map(|e| e.state);

        match tracked_state {
            // Key generation stays open while the entry is Added; the
            // prospective identity is checked before the write lands.
            Some(EntityState::Added) if is_key => {
                let old_key = self.key_of(id)?;
                let mut key_values = Vec::new();
                for key_prop in self.model.entity(entity)?.key() {
                    let current = self.instance(id)?.values().get(key_prop)?.clone();
                    key_values.push(if *key_prop == property {
                        value.clone()
                    } else {
                        current
                    });
                }
                let key = KeyTuple::new(key_values);
                if key.is_set() {
                    self.check_identity_free(id, &key)?;
                }
                let instance = self.arena.get_mut(id).expect("checked above");
                instance.values_mut().write_unchecked(property, value)?;
                if old_key.is_set() && old_key != key {
                    let root = self.root_entity(entity)?;
                    let slot = (root, old_key);
                    if self.identity.get(&slot) == Some(&id) {
                        self.identity.remove(&slot);
                    }
                }
                if key.is_set() {
                    self.register_identity(id, &key)?;
                }
            }
            _ => {
                let instance = self.arena.get_mut(id).expect("checked above");
                instance.values_mut().set(property, value)?;
            }
        }

        self.after_scalar_write(id, property)
    }

    /// Dirty marking plus FK fixup after one scalar slot changed.
    pub(crate) fn after_scalar_write(
        &mut self,
        id: InstanceId,
        property: &str,
    ) -> Result<(), TrackError> {
        if self.live_entry(id).is_err() {
            return Ok(());
        }
        self.refresh_dirty_mark(id, property)?;
        self.fixup_fk_change(id, property)?;
        Ok(())
    }

    /// Recompute the dirty mark for one property from the current/original
    /// divergence, and nudge the entry state accordingly.
    pub(crate) fn refresh_dirty_mark(
        &mut self,
        id: InstanceId,
        property: &str,
    ) -> Result<(), TrackError> {
        let Some(entry) = self.entries.get(&id).filter(|e| e.state.is_tracked()) else {
            return Ok(());
        };
        if matches!(entry.state, EntityState::Added | EntityState::Deleted) {
            return Ok(());
        }

        let name = match self.entry_model(id)?.property(property) {
            Some(p) => p.name,
            None => return Ok(()),
        };
        let diverged = {
            let current = self.instance(id)?.values().get(name)?;
            let original = self.entries[&id].original.get(name)?;
            current != original
        };

        let entry = self.entries.get_mut(&id).expect("checked above");
        if diverged {
            entry.dirty.insert(name);
            if entry.state == EntityState::Unchanged {
                debug!(
                    "entry {id} ({entity}) flipped to modified by {name}",
                    entity = entry.entity
                );
                entry.state = EntityState::Modified;
            }
        } else {
            entry.dirty.remove(name);
        }
        Ok(())
    }

    pub(crate) fn set_state_locked(
        &mut self,
        id: InstanceId,
        state: EntityState,
    ) -> Result<(), TrackError> {
        self.instance(id)?;
        let current = self
            .entries
            .get(&id)
            .filter(|e| e.state.is_tracked())
            .map_or(EntityState::Detached, |e| e.state);

        if current == state {
            return Ok(());
        }
        debug!("entry {id}: {current} -> {state}");

        match state {
            EntityState::Detached => {
                self.schedule_cascade(id)?;
                self.drop_entry(id);
            }
            EntityState::Deleted => {
                if current == EntityState::Detached {
                    self.track_locked(id, EntityState::Deleted)?;
                } else {
                    self.entries.get_mut(&id).expect("tracked").state = EntityState::Deleted;
                }
                self.schedule_cascade(id)?;
            }
            _ if current == EntityState::Detached => {
                self.track_locked(id, state)?;
            }
            EntityState::Unchanged => {
                let entry = self.entries.get_mut(&id).expect("tracked");
                entry.state = EntityState::Unchanged;
                entry.dirty.clear();
                self.ensure_identity_registered(id)?;
            }
            EntityState::Modified => {
                let non_key: Vec<&'static str> = {
                    let model = self.entry_model(id)?;
                    model
                        .properties()
                        .filter(|p| !model.is_key(p.name))
                        .map(|p| p.name)
                        .collect()
                };
                let entry = self.entries.get_mut(&id).expect("tracked");
                entry.state = EntityState::Modified;
                entry.dirty = non_key.into_iter().collect();
                self.ensure_identity_registered(id)?;
            }
            EntityState::Added => {
                let entry = self.entries.get_mut(&id).expect("tracked");
                entry.state = EntityState::Added;
            }
        }
        Ok(())
    }

    /// Start tracking a materialized instance at `state`, enforcing key
    /// and identity invariants, then run delayed fixup against the rest of
    /// the tracked graph.
    pub(crate) fn track_locked(
        &mut self,
        id: InstanceId,
        state: EntityState,
    ) -> Result<(), TrackError> {
        let entity = self.instance(id)?.entity();
        let key = self.key_of(id)?;

        if !key.is_set() && state != EntityState::Added {
            return Err(SessionError::KeyNotSet { entity, state }.into());
        }
        if key.is_set() {
            self.check_identity_free(id, &key)?;
        }

        let instance = self.arena.get_mut(id).expect("checked above");
        instance.values_mut().set_role(ValuesRole::Current);
        let mut original = instance.values().clone_values();
        original.set_role(ValuesRole::Original);

        let mut entry = Entry::new(id, entity, state, original);
        if state == EntityState::Modified {
            // Tracking straight into Modified marks every non-key slot.
            let model = self.model.entity(entity)?;
            entry.dirty = model
                .properties()
                .filter(|p| !model.is_key(p.name))
                .map(|p| p.name)
                .collect();
        }
        self.entries.insert(id, entry);
        if key.is_set() {
            self.register_identity(id, &key)?;
        }
        debug!("tracking {id} ({entity}) as {state}");

        self.fixup_on_tracked(id)
    }

    pub(crate) fn live_entry(&self, id: InstanceId) -> Result<&Entry, SessionError> {
        self.entries
            .get(&id)
            .filter(|e| e.state.is_tracked())
            .ok_or(SessionError::NotTracked { id })
    }

    pub(crate) fn entry_view(&self, id: InstanceId) -> Result<EntryView, TrackError> {
        let instance = self.instance(id)?;
        let state = self
            .entries
            .get(&id)
            .map_or(EntityState::Detached, |e| e.state);
        Ok(EntryView {
            id,
            entity: instance.entity(),
            state,
            key: self.key_of(id)?,
            has_conceptual_null: instance.values().has_conceptual_null(),
            dirty: self
                .entries
                .get(&id)
                .map(|e| e.dirty.iter().copied().collect())
                .unwrap_or_default(),
        })
    }

    /// Primary-key tuple from the current values, in declared key order.
    pub(crate) fn key_of(&self, id: InstanceId) -> Result<KeyTuple, TrackError> {
        let instance = self.instance(id)?;
        let model = self.model.entity(instance.entity())?;
        let mut values = Vec::with_capacity(model.key().len());
        for key_prop in model.key() {
            values.push(instance.values().get(key_prop)?.clone());
        }
        Ok(KeyTuple::new(values))
    }

    pub(crate) fn root_entity(&self, entity: &str) -> Result<&'static str, TrackError> {
        Ok(self.model.entity(entity)?.root())
    }

    fn check_identity_free(&self, id: InstanceId, key: &KeyTuple) -> Result<(), TrackError> {
        let entity = self.instance(id)?.entity();
        let root = self.root_entity(entity)?;
        if let Some(existing) = self.identity.get(&(root, key.clone())) {
            if *existing != id {
                return Err(SessionError::IdentityConflict {
                    entity: root,
                    key: key.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn register_identity(&mut self, id: InstanceId, key: &KeyTuple) -> Result<(), TrackError> {
        let entity = self.instance(id)?.entity();
        let root = self.root_entity(entity)?;
        self.identity.insert((root, key.clone()), id);
        Ok(())
    }

    fn ensure_identity_registered(&mut self, id: InstanceId) -> Result<(), TrackError> {
        let key = self.key_of(id)?;
        if key.is_set() {
            self.check_identity_free(id, &key)?;
            self.register_identity(id, &key)?;
        }
        Ok(())
    }

    /// Remove the tracking record and identity registration; the instance
    /// itself stays materialized and its store becomes detached again.
    pub(crate) fn drop_entry(&mut self, id: InstanceId) {
        if let Ok(key) = self.key_of(id) {
            let root = self
                .instance(id)
                .ok()
                .and_then(|i| self.root_entity(i.entity()).ok());
            if let Some(root) = root {
                let slot = (root, key);
                if self.identity.get(&slot) == Some(&id) {
                    self.identity.remove(&slot);
                }
            }
        }
        self.entries.remove(&id);
        if let Some(instance) = self.arena.get_mut(id) {
            instance.values_mut().set_role(ValuesRole::Detached);
        }
    }

    pub(crate) fn entry_model(&self, id: InstanceId) -> Result<&Arc<crate::model::EntityModel>, TrackError> {
        let entity = self.instance(id)?.entity();
        Ok(self.model.entity(entity)?)
    }

    pub(crate) fn instance_values(&self, id: InstanceId) -> Result<&PropertyValues, TrackError> {
        Ok(self.instance(id)?.values())
    }

    fn detached_original(&self, id: InstanceId) -> Result<PropertyValues, TrackError> {
        let mut original = self.instance(id)?.values().clone_values();
        original.set_role(ValuesRole::Original);
        Ok(original)
    }

    /// Tracked principal whose `key_props` currently equal `key`, scoped to
    /// entities assignable to `principal`. Deleted principals no longer
    /// participate in resolution. Linear scan over live entries; the unit
    /// of work is in-memory and bounded.
    pub(crate) fn find_principal(
        &self,
        principal: &str,
        key_props: &[&'static str],
        key: &KeyTuple,
    ) -> Result<Option<InstanceId>, TrackError> {
        for entry in self
            .entries
            .values()
            .filter(|e| e.state.is_tracked() && e.state != EntityState::Deleted)
        {
            if !self.model.is_assignable(principal, entry.entity) {
                continue;
            }
            let values = self.instance_values(entry.id)?;
            let mut candidate = Vec::with_capacity(key_props.len());
            for prop in key_props {
                candidate.push(values.get(prop)?.clone());
            }
            let candidate = KeyTuple::new(candidate);
            if candidate.is_set() && candidate == *key {
                return Ok(Some(entry.id));
            }
        }
        Ok(None)
    }
}
