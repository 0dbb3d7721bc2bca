//! Navigation fixup: keeps reference navigations, collection navigations,
//! and FK scalars mutually consistent whichever of the three mutation paths
//! (dependent reference set, principal collection mutation, raw FK write)
//! encoded the change.

use crate::error::TrackError;
use crate::key::KeyTuple;
use crate::model::RelationModel;
use crate::session::{EntityState, InstanceId, Session, SessionError};
use log::trace;
use std::sync::Arc;

impl Session {
    /// Point the dependent-side reference navigation at a principal (or
    /// clear it). The whole relationship triple (reference, collection
    /// membership, FK scalars) is normalized in one pass.
    pub fn set_reference(
        &mut self,
        id: InstanceId,
        navigation: &str,
        target: Option<InstanceId>,
    ) -> Result<(), TrackError> {
        let _scope = self.begin()?;
        let model = Arc::clone(self.model());
        let entity = self.instance(id)?.entity();
        let rel = model.dependent_nav_relation(entity, navigation)?;

        match target {
            Some(principal) => {
                let principal_entity = self.instance(principal)?.entity();
                if !model.is_assignable(rel.principal, principal_entity) {
                    return Err(SessionError::WrongEntityForNavigation {
                        navigation: navigation.to_string(),
                        expected: rel.principal,
                        found: principal_entity,
                    }
                    .into());
                }
                self.apply_link(rel, id, principal, true)
            }
            None => self.apply_unlink(rel, id, None, true),
        }
    }

    /// Add a dependent to a principal-side collection navigation.
    pub fn collection_add(
        &mut self,
        id: InstanceId,
        navigation: &str,
        member: InstanceId,
    ) -> Result<(), TrackError> {
        let _scope = self.begin()?;
        let model = Arc::clone(self.model());
        let entity = self.instance(id)?.entity();
        let rel = model.principal_nav_relation(entity, navigation)?;

        let member_entity = self.instance(member)?.entity();
        if !model.is_assignable(rel.dependent, member_entity) {
            return Err(SessionError::WrongEntityForNavigation {
                navigation: navigation.to_string(),
                expected: rel.dependent,
                found: member_entity,
            }
            .into());
        }
        self.apply_link(rel, member, id, true)
    }

    /// Remove a dependent from a principal-side collection navigation,
    /// severing the relationship (FK nulled, subject to the conceptual-null
    /// deferral when the FK is non-nullable).
    pub fn collection_remove(
        &mut self,
        id: InstanceId,
        navigation: &str,
        member: InstanceId,
    ) -> Result<(), TrackError> {
        let _scope = self.begin()?;
        let model = Arc::clone(self.model());
        let entity = self.instance(id)?.entity();
        let rel = model.principal_nav_relation(entity, navigation)?;

        if !self.instance(id)?.collection(navigation).contains(&member) {
            return Ok(());
        }
        self.apply_unlink(rel, member, Some(id), true)
    }

    /// Normalize one relationship so that `dependent` belongs to
    /// `principal`: FK from the principal's key (when `write_fk`),
    /// reference navigation set, collection membership moved from any
    /// previous principal. Idempotent.
    pub(crate) fn apply_link(
        &mut self,
        rel: &RelationModel,
        dependent: InstanceId,
        principal: InstanceId,
        write_fk: bool,
    ) -> Result<(), TrackError> {
        self.instance(dependent)?;
        self.instance(principal)?;

        // Detach from a previous principal first.
        if let Some(nav) = rel.dependent_nav {
            let old = self.instance(dependent)?.reference(nav);
            if let Some(old) = old.filter(|old| *old != principal) {
                self.collection_slot_remove(rel, old, dependent);
            }
        }

        if write_fk {
            for (fk_prop, pk_prop) in rel.foreign_key.iter().zip(rel.principal_key.iter()) {
                let pk_value = self.instance_values(principal)?.get(pk_prop)?.clone();
                let current = self.instance_values(dependent)?.get(fk_prop)?.clone();
                if current != pk_value {
                    let instance = self
                        .arena
                        .get_mut(dependent)
                        .expect("materialized dependent");
                    instance.values_mut().write_unchecked(fk_prop, pk_value)?;
                    self.refresh_dirty_mark(dependent, fk_prop)?;
                }
            }
        }

        if let Some(nav) = rel.dependent_nav {
            let instance = self
                .arena
                .get_mut(dependent)
                .expect("materialized dependent");
            instance.set_reference_slot(nav, Some(principal));
            if let Some(entry) = self.entries.get_mut(&dependent) {
                entry.nav_refs.insert(nav, Some(principal));
            }
        }

        if let Some(nav) = rel.principal_nav {
            let instance = self
                .arena
                .get_mut(principal)
                .expect("materialized principal");
            instance.collection_insert(nav, dependent);
            if let Some(entry) = self.entries.get_mut(&principal) {
                let slot = entry.nav_collections.entry(nav).or_default();
                if !slot.contains(&dependent) {
                    slot.push(dependent);
                }
            }
        }

        trace!(
            "fixup link {relation}: {dependent} -> {principal}",
            relation = rel.name
        );
        Ok(())
    }

    /// Reverse of [`Self::apply_link`]: clear the reference navigation,
    /// leave the previous principal's collection, and (when `sever_fk`)
    /// null the FK scalars, marking the dependent modified.
    pub(crate) fn apply_unlink(
        &mut self,
        rel: &RelationModel,
        dependent: InstanceId,
        principal_hint: Option<InstanceId>,
        sever_fk: bool,
    ) -> Result<(), TrackError> {
        self.instance(dependent)?;

        let old_principal = principal_hint.or_else(|| {
            rel.dependent_nav
                .and_then(|nav| self.instance(dependent).ok().and_then(|i| i.reference(nav)))
        });

        if let Some(nav) = rel.dependent_nav {
            let instance = self
                .arena
                .get_mut(dependent)
                .expect("materialized dependent");
            instance.set_reference_slot(nav, None);
            if let Some(entry) = self.entries.get_mut(&dependent) {
                entry.nav_refs.insert(nav, None);
            }
        }

        if let Some(old) = old_principal {
            self.collection_slot_remove(rel, old, dependent);
        }

        if sever_fk {
            for fk_prop in rel.foreign_key.iter().copied() {
                let instance = self
                    .arena
                    .get_mut(dependent)
                    .expect("materialized dependent");
                instance.values_mut().sever(fk_prop)?;
                self.mark_severed(dependent, fk_prop);
            }
        }

        trace!(
            "fixup unlink {relation}: {dependent}",
            relation = rel.name
        );
        Ok(())
    }

    /// React to a direct FK scalar write: re-resolve the reference
    /// navigation against tracked principals. When the new value matches no
    /// tracked principal the navigation is cleared without error;
    /// resolution happens lazily if that principal is tracked later.
    pub(crate) fn fixup_fk_change(
        &mut self,
        id: InstanceId,
        property: &str,
    ) -> Result<(), TrackError> {
        let model = Arc::clone(self.model());
        let entity = self.instance(id)?.entity();
        let rels: Vec<&RelationModel> = model.relations_with_fk_property(entity, property).collect();

        for rel in rels {
            let principal = match self.fk_tuple(id, &rel.foreign_key)? {
                Some(fk) => self.find_principal(rel.principal, &rel.principal_key, &fk)?,
                None => None,
            };

            match principal {
                Some(principal) => self.apply_link(rel, id, principal, false)?,
                None => self.apply_unlink(rel, id, None, false)?,
            }
        }
        Ok(())
    }

    /// Delayed fixup when an instance starts being tracked: link it to the
    /// already-tracked graph from both its dependent and principal sides.
    pub(crate) fn fixup_on_tracked(&mut self, id: InstanceId) -> Result<(), TrackError> {
        let model = Arc::clone(self.model());
        let entity = self.instance(id)?.entity();

        // As dependent: honor a pre-wired reference navigation, otherwise
        // resolve the FK against tracked principals.
        let dependent_rels: Vec<&RelationModel> = model.relations_for_dependent(entity).collect();
        for rel in dependent_rels {
            if let Some(nav) = rel.dependent_nav {
                // A more-derived relation owns this navigation name.
                if !std::ptr::eq(model.dependent_nav_relation(entity, nav)?, rel) {
                    continue;
                }
                if let Some(target) = self.instance(id)?.reference(nav) {
                    self.apply_link(rel, id, target, true)?;
                    continue;
                }
            }

            if let Some(fk) = self.fk_tuple(id, &rel.foreign_key)? {
                if let Some(principal) = self.find_principal(rel.principal, &rel.principal_key, &fk)? {
                    self.apply_link(rel, id, principal, false)?;
                }
            }
        }

        // As principal: adopt pre-wired collection members, then sweep
        // tracked dependents that point at this instance by navigation or
        // by FK value.
        let principal_rels: Vec<&RelationModel> = model.relations_for_principal(entity).collect();
        for rel in principal_rels {
            if let Some(nav) = rel.principal_nav {
                if !std::ptr::eq(model.principal_nav_relation(entity, nav)?, rel) {
                    continue;
                }
                for member in self.instance(id)?.collection(nav).to_vec() {
                    let member_entity = self.instance(member)?.entity();
                    if model.is_assignable(rel.dependent, member_entity) {
                        self.apply_link(rel, member, id, true)?;
                    }
                }
            }

            let my_key = self.values_tuple(id, &rel.principal_key)?;
            for dep in self.entry_ids() {
                if dep == id || self.state(dep)? == EntityState::Deleted {
                    continue;
                }
                let dep_entity = self.instance(dep)?.entity();
                if !model.is_assignable(rel.dependent, dep_entity) {
                    continue;
                }

                let by_nav = rel
                    .dependent_nav
                    .is_some_and(|nav| self.instance(dep).is_ok_and(|i| i.reference(nav) == Some(id)));
                if by_nav {
                    self.apply_link(rel, dep, id, true)?;
                    continue;
                }

                if my_key.is_set() && self.fk_tuple(dep, &rel.foreign_key)?.as_ref() == Some(&my_key) {
                    self.apply_link(rel, dep, id, false)?;
                }
            }
        }

        Ok(())
    }

    pub(crate) fn values_tuple(
        &self,
        id: InstanceId,
        properties: &[&'static str],
    ) -> Result<KeyTuple, TrackError> {
        let values = self.instance_values(id)?;
        let mut tuple = Vec::with_capacity(properties.len());
        for prop in properties {
            tuple.push(values.get(prop)?.clone());
        }
        Ok(KeyTuple::new(tuple))
    }

    /// FK tuple usable for principal resolution: `None` when any component
    /// is null or carries a deferred conceptual null (the observed value is
    /// stale once a sever has been recorded).
    pub(crate) fn fk_tuple(
        &self,
        id: InstanceId,
        properties: &[&'static str],
    ) -> Result<Option<KeyTuple>, TrackError> {
        let values = self.instance_values(id)?;
        for prop in properties {
            if values.is_conceptually_null(prop)? {
                return Ok(None);
            }
        }
        let tuple = self.values_tuple(id, properties)?;
        Ok(tuple.is_set().then_some(tuple))
    }

    fn collection_slot_remove(
        &mut self,
        rel: &RelationModel,
        principal: InstanceId,
        dependent: InstanceId,
    ) {
        let Some(nav) = rel.principal_nav else {
            return;
        };
        if let Some(instance) = self.arena.get_mut(principal) {
            instance.collection_take_out(nav, dependent);
        }
        if let Some(entry) = self.entries.get_mut(&principal) {
            if let Some(slot) = entry.nav_collections.get_mut(nav) {
                slot.retain(|id| *id != dependent);
            }
        }
    }

    /// A severed FK is persisted work even when the slot only carries a
    /// deferred conceptual null, so the dirty mark is forced.
    fn mark_severed(&mut self, id: InstanceId, property: &'static str) {
        if let Some(entry) = self
            .entries
            .get_mut(&id)
            .filter(|e| e.state.is_tracked())
        {
            if !matches!(entry.state, EntityState::Added | EntityState::Deleted) {
                entry.dirty.insert(property);
                if entry.state == EntityState::Unchanged {
                    entry.state = EntityState::Modified;
                }
            }
        }
    }
}
