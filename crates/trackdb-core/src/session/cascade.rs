//! Delete/cascade resolution: the effect of removing a principal on its
//! currently tracked dependents, per relationship delete behavior.
//! Untracked dependents are never visited; this resolver only reasons
//! about the in-memory graph.

use crate::error::TrackError;
use crate::model::RelationModel;
use crate::session::{CascadeTiming, EntityState, InstanceId, Session};
use log::debug;
use std::collections::BTreeSet;
use std::sync::Arc;

impl Session {
    /// Apply deferred cascades scheduled while `CascadeTiming::OnAccept`
    /// is in effect. A no-op under immediate timing.
    pub fn cascade_changes(&mut self) -> Result<(), TrackError> {
        let _scope = self.begin()?;
        while let Some(id) = self.deferred_cascades.pop() {
            self.cascade_principal_removal(id)?;
        }
        Ok(())
    }

    /// Route one principal removal through the configured timing.
    pub(crate) fn schedule_cascade(&mut self, id: InstanceId) -> Result<(), TrackError> {
        match self.options().cascade_timing {
            CascadeTiming::Immediate => self.cascade_principal_removal(id),
            CascadeTiming::OnAccept => {
                self.deferred_cascades.push(id);
                Ok(())
            }
        }
    }

    pub(crate) fn cascade_principal_removal(&mut self, principal: InstanceId) -> Result<(), TrackError> {
        let model = Arc::clone(self.model());
        let entity = self.instance(principal)?.entity();
        let rels: Vec<&RelationModel> = model.relations_for_principal(entity).collect();

        for rel in rels {
            let dependents = self.tracked_dependents(rel, principal)?;
            if dependents.is_empty() {
                continue;
            }

            if rel.on_delete.cascades() {
                for dep in dependents {
                    if self.state(dep)? != EntityState::Deleted {
                        debug!(
                            "cascade {relation}: deleting dependent {dep}",
                            relation = rel.name
                        );
                        // Recurses: the dependent may itself be a principal.
                        self.set_state_locked(dep, EntityState::Deleted)?;
                    }
                }
            } else if rel.on_delete.severs() {
                for dep in dependents {
                    debug!(
                        "cascade {relation}: severing dependent {dep}",
                        relation = rel.name
                    );
                    self.apply_unlink(rel, dep, Some(principal), true)?;
                }
            }
            // Restrict / NoAction / ClientNoAction: dependents stay
            // untouched; rejecting an orphaned reference is the
            // persistence collaborator's call at save time.
        }
        Ok(())
    }

    /// Tracked dependents of `principal` under one relation: collection
    /// members, reference-navigation pointers, and FK matches, deduped.
    fn tracked_dependents(
        &self,
        rel: &RelationModel,
        principal: InstanceId,
    ) -> Result<Vec<InstanceId>, TrackError> {
        let mut found = BTreeSet::new();

        if let Some(nav) = rel.principal_nav {
            for member in self.instance(principal)?.collection(nav) {
                found.insert(*member);
            }
        }

        let my_key = self.values_tuple(principal, &rel.principal_key)?;
        for dep in self.entry_ids() {
            if dep == principal {
                continue;
            }
            let dep_entity = self.instance(dep)?.entity();
            if !self.model().is_assignable(rel.dependent, dep_entity) {
                continue;
            }

            if rel
                .dependent_nav
                .is_some_and(|nav| self.instance(dep).is_ok_and(|i| i.reference(nav) == Some(principal)))
            {
                found.insert(dep);
                continue;
            }
            if my_key.is_set() && self.fk_tuple(dep, &rel.foreign_key)?.as_ref() == Some(&my_key) {
                found.insert(dep);
            }
        }

        // Only tracked dependents are visited.
        Ok(found
            .into_iter()
            .filter(|dep| self.live_entry(*dep).is_ok())
            .collect())
    }
}
