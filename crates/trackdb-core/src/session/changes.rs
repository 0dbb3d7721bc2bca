//! Change detection: compares current scalar/shadow values to the original
//! snapshot, reconciles navigation and FK deltas against the last fixup
//! state, and re-invokes fixup for each delta. Safe to call redundantly.

use crate::error::TrackError;
use crate::model::RelationModel;
use crate::session::{EntityState, InstanceId, Session};
use log::trace;
use std::sync::Arc;

impl Session {
    /// Sweep every Unchanged/Modified entry for scalar divergence and
    /// relationship deltas. Idempotent.
    pub fn detect_changes(&mut self) -> Result<(), TrackError> {
        let _scope = self.begin()?;
        self.detect_changes_locked()
    }

    pub(crate) fn detect_changes_locked(&mut self) -> Result<(), TrackError> {
        let ids: Vec<InstanceId> = self
            .entries
            .values()
            .filter(|e| matches!(e.state, EntityState::Unchanged | EntityState::Modified))
            .map(|e| e.id)
            .collect();

        for id in ids {
            self.detect_scalar_changes(id)?;
            self.detect_navigation_changes(id)?;
            self.detect_fk_changes(id)?;
            self.settle_state(id);
        }
        trace!("detect_changes swept {count} entries", count = self.entries.len());
        Ok(())
    }

    /// Mark every property whose current value diverges from the original
    /// snapshot. Marks are add-only: a property forced modified by the
    /// caller stays modified even when the values happen to match.
    fn detect_scalar_changes(&mut self, id: InstanceId) -> Result<(), TrackError> {
        let diverged: Vec<&'static str> = {
            let entry = self.live_entry(id)?;
            let current = self.instance_values(id)?;
            let mut diverged = Vec::new();
            for prop in current.properties() {
                if current.get(prop.name)? != entry.original.get(prop.name)? {
                    diverged.push(prop.name);
                }
            }
            diverged
        };

        if diverged.is_empty() {
            return Ok(());
        }
        let entry = self.entries.get_mut(&id).expect("live entry");
        for name in diverged {
            entry.dirty.insert(name);
        }
        if entry.state == EntityState::Unchanged {
            entry.state = EntityState::Modified;
        }
        Ok(())
    }

    /// Compare navigation slots to the last fixup snapshot and re-run
    /// fixup for each delta.
    fn detect_navigation_changes(&mut self, id: InstanceId) -> Result<(), TrackError> {
        let model = Arc::clone(self.model());
        let entity = self.instance(id)?.entity();

        // Dependent-side reference deltas.
        let ref_deltas: Vec<(&'static str, Option<InstanceId>)> = {
            let entry = self.live_entry(id)?;
            let instance = self.instance(id)?;
            let mut deltas = Vec::new();
            for (nav, target) in instance.reference_slots() {
                let known = entry.nav_refs.get(nav).copied().unwrap_or_default();
                if known != *target {
                    deltas.push((*nav, *target));
                }
            }
            deltas
        };
        for (nav, target) in ref_deltas {
            let rel = model.dependent_nav_relation(entity, nav)?;
            match target {
                Some(principal) => self.apply_link(rel, id, principal, true)?,
                None => self.apply_unlink(rel, id, None, true)?,
            }
        }

        // Principal-side collection deltas.
        let collection_deltas: Vec<(&'static str, Vec<InstanceId>, Vec<InstanceId>)> = {
            let entry = self.live_entry(id)?;
            let instance = self.instance(id)?;
            let mut deltas = Vec::new();
            for (nav, members) in instance.collection_slots() {
                let known = entry.nav_collections.get(nav).cloned().unwrap_or_default();
                let added: Vec<InstanceId> =
                    members.iter().filter(|m| !known.contains(m)).copied().collect();
                let removed: Vec<InstanceId> =
                    known.iter().filter(|m| !members.contains(m)).copied().collect();
                if !added.is_empty() || !removed.is_empty() {
                    deltas.push((*nav, added, removed));
                }
            }
            deltas
        };
        for (nav, added, removed) in collection_deltas {
            let rel = model.principal_nav_relation(entity, nav)?;
            for member in added {
                self.apply_link(rel, member, id, true)?;
            }
            for member in removed {
                self.apply_unlink(rel, member, Some(id), true)?;
            }
        }

        Ok(())
    }

    /// Reconcile raw FK writes made through the current-values handle: a
    /// dependent whose FK no longer matches its reference navigation is
    /// re-resolved by FK value (the raw write wins, per the direct-write
    /// mutation path).
    fn detect_fk_changes(&mut self, id: InstanceId) -> Result<(), TrackError> {
        let model = Arc::clone(self.model());
        let entity = self.instance(id)?.entity();
        let rels: Vec<&RelationModel> = model.relations_for_dependent(entity).collect();

        for rel in rels {
            if let Some(nav) = rel.dependent_nav {
                if !std::ptr::eq(model.dependent_nav_relation(entity, nav)?, rel) {
                    continue;
                }
            }

            let fk = self.fk_tuple(id, &rel.foreign_key)?;
            let consistent = match rel
                .dependent_nav
                .and_then(|nav| self.instance(id).ok().and_then(|i| i.reference(nav)))
            {
                Some(principal) => match &fk {
                    Some(fk) => self.values_tuple(principal, &rel.principal_key)? == *fk,
                    None => false,
                },
                None => match &fk {
                    Some(fk) => self
                        .find_principal(rel.principal, &rel.principal_key, fk)?
                        .is_none(),
                    None => true,
                },
            };

            if !consistent {
                for fk_prop in rel.foreign_key.clone() {
                    self.refresh_dirty_mark(id, fk_prop)?;
                }
                self.fixup_fk_change(id, rel.foreign_key[0])?;
            }
        }
        Ok(())
    }

    /// A Modified entry with an empty dirty set settles back to Unchanged.
    fn settle_state(&mut self, id: InstanceId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            if entry.state == EntityState::Modified && entry.dirty.is_empty() {
                entry.state = EntityState::Unchanged;
            }
        }
    }
}
