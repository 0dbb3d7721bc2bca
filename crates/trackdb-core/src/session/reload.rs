//! Snapshot-backed entry operations: database values and reload, sync and
//! async. The async forms apply the fetched snapshot strictly after the
//! await completes, so dropping an in-flight future (cancellation) leaves
//! all entry state exactly as it was before the call.

use crate::error::TrackError;
use crate::key::KeyTuple;
use crate::session::{EntityState, InstanceId, Session, SessionError};
use crate::snapshot::{SnapshotSource, StoredRow};
use crate::values::{PropertyValues, ValuesRole};
use log::debug;

impl Session {
    /// As-persisted values for one tracked entry, or `None` when the row
    /// no longer exists or its discriminator is neither the entry's
    /// declared entity nor one of its ancestors.
    pub fn database_values(&self, id: InstanceId) -> Result<Option<PropertyValues>, TrackError> {
        let _scope = self.begin()?;
        let (root, key) = self.fetch_target(id)?;
        let row = self.snapshot_source()?.fetch(&root, &key)?;
        self.row_to_values(id, row)
    }

    /// Async form of [`Self::database_values`]; suspension happens only at
    /// the source boundary.
    pub async fn database_values_async(
        &self,
        id: InstanceId,
    ) -> Result<Option<PropertyValues>, TrackError> {
        let _scope = self.begin()?;
        let (root, key) = self.fetch_target(id)?;
        let row = self.snapshot_source()?.fetch_async(&root, &key).await?;
        self.row_to_values(id, row)
    }

    /// Refetch the database snapshot. When the row is found, current and
    /// original values are both replaced by it and the state becomes
    /// Unchanged; when it is gone the entry is detached, except an Added
    /// entry, which has nothing to reload from and stays Added.
    pub fn reload(&mut self, id: InstanceId) -> Result<(), TrackError> {
        let _scope = self.begin()?;
        let (root, key) = self.fetch_target(id)?;
        let row = self.snapshot_source()?.fetch(&root, &key)?;
        let snapshot = self.row_to_values(id, row)?;
        self.apply_reload(id, snapshot)
    }

    /// Async form of [`Self::reload`].
    pub async fn reload_async(&mut self, id: InstanceId) -> Result<(), TrackError> {
        let _scope = self.begin()?;
        let (root, key) = self.fetch_target(id)?;
        let row = self.snapshot_source()?.fetch_async(&root, &key).await?;
        let snapshot = self.row_to_values(id, row)?;
        self.apply_reload(id, snapshot)
    }

    fn snapshot_source(&self) -> Result<&dyn SnapshotSource, SessionError> {
        self.source
            .as_deref()
            .ok_or(SessionError::NoSnapshotSource)
    }

    fn fetch_target(&self, id: InstanceId) -> Result<(String, KeyTuple), TrackError> {
        self.live_entry(id)?;
        let root = self.root_entity(self.instance(id)?.entity())?;
        let key = self.key_of(id)?;
        Ok((root.to_string(), key))
    }

    /// Project a fetched row onto the entry's declared entity model:
    /// discriminator-checked, missing columns null, extra columns ignored.
    fn row_to_values(
        &self,
        id: InstanceId,
        row: Option<StoredRow>,
    ) -> Result<Option<PropertyValues>, TrackError> {
        let Some(row) = row else {
            return Ok(None);
        };

        let model = self.entry_model(id)?;
        if !model.has_ancestor(&row.entity) {
            debug!(
                "row discriminator {stored} is unrelated to entity {declared}; treating as absent",
                stored = row.entity,
                declared = model.name
            );
            return Ok(None);
        }

        let mut values = PropertyValues::new(model.clone(), ValuesRole::Detached);
        for prop in model.properties() {
            if let Some(value) = row.values.get(prop.name) {
                values.write_unchecked(prop.name, value.clone())?;
            }
        }
        Ok(Some(values))
    }

    fn apply_reload(
        &mut self,
        id: InstanceId,
        snapshot: Option<PropertyValues>,
    ) -> Result<(), TrackError> {
        match snapshot {
            Some(snapshot) => {
                let names: Vec<&'static str> =
                    self.entry_model(id)?.properties().map(|p| p.name).collect();

                let instance = self
                    .arena
                    .get_mut(id)
                    .expect("tracked entries always have an instance");
                for name in &names {
                    let value = snapshot.get(name)?.clone();
                    instance.values_mut().write_unchecked(name, value)?;
                }
                instance.values_mut().clear_conceptual_nulls();

                let entry = self.entries.get_mut(&id).expect("live entry");
                let mut original = snapshot;
                original.set_role(ValuesRole::Original);
                entry.original = original;
                entry.dirty.clear();
                entry.state = EntityState::Unchanged;
                debug!("reloaded {id}: snapshot applied, state unchanged");
                Ok(())
            }
            None => {
                if self.state(id)? == EntityState::Added {
                    return Ok(());
                }
                debug!("reload {id}: row absent, detaching");
                self.set_state_locked(id, EntityState::Detached)
            }
        }
    }
}
