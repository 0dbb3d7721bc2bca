//! Graph tracking: depth-first discovery over all reachable navigations,
//! visiting each distinct instance exactly once, with a caller-supplied
//! initial-state policy.

use crate::error::TrackError;
use crate::session::{EntityState, InstanceId, Session};
use log::debug;
use std::collections::BTreeSet;

///
/// TrackCandidate
///
/// What the initial-state policy sees for each newly discovered instance.
///

#[derive(Clone, Copy, Debug)]
pub struct TrackCandidate {
    pub id: InstanceId,
    pub entity: &'static str,
    /// True when the primary key is fully set.
    pub key_set: bool,
}

///
/// TrackPolicy
///
/// Built-in initial-state policies for graph discovery.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TrackPolicy {
    /// Key fully set ⇒ Unchanged, otherwise Added.
    #[default]
    Default,
    /// Every discovered instance is Added.
    AllAdded,
    /// Key fully set ⇒ Modified, otherwise Added.
    KeySetModified,
}

impl TrackPolicy {
    const fn state_for(self, candidate: &TrackCandidate) -> EntityState {
        match self {
            Self::Default => {
                if candidate.key_set {
                    EntityState::Unchanged
                } else {
                    EntityState::Added
                }
            }
            Self::AllAdded => EntityState::Added,
            Self::KeySetModified => {
                if candidate.key_set {
                    EntityState::Modified
                } else {
                    EntityState::Added
                }
            }
        }
    }
}

impl Session {
    /// Track every instance reachable from `root` using a built-in policy.
    pub fn track_graph(&mut self, root: InstanceId, policy: TrackPolicy) -> Result<(), TrackError> {
        self.track_graph_with(root, |candidate| policy.state_for(candidate))
    }

    /// Track every instance reachable from `root`. The policy runs once
    /// per newly discovered instance; already-tracked instances are
    /// traversed but not re-tracked, and a visited set keyed by surrogate
    /// identity makes cyclic graphs terminate.
    pub fn track_graph_with(
        &mut self,
        root: InstanceId,
        mut policy: impl FnMut(&TrackCandidate) -> EntityState,
    ) -> Result<(), TrackError> {
        let _scope = self.begin()?;

        let mut visited: BTreeSet<InstanceId> = BTreeSet::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let instance = self.instance(id)?;
            let entity = instance.entity();

            // Push reachable navigations before tracking so discovery
            // order does not depend on fixup side effects.
            let mut reachable: Vec<InstanceId> = instance
                .reference_slots()
                .values()
                .filter_map(|target| *target)
                .collect();
            for members in instance.collection_slots().values() {
                reachable.extend(members.iter().copied());
            }
            stack.extend(reachable);

            if self.live_entry(id).is_ok() {
                continue;
            }

            let candidate = TrackCandidate {
                id,
                entity,
                key_set: self.key_of(id)?.is_set(),
            };
            let state = policy(&candidate);
            if state.is_tracked() {
                debug!("track_graph: {id} ({entity}) discovered as {state}");
                self.track_locked(id, state)?;
            }
        }
        Ok(())
    }

    /// Track the graph rooted at `id` with every instance Added.
    pub fn add(&mut self, id: InstanceId) -> Result<(), TrackError> {
        self.track_graph(id, TrackPolicy::AllAdded)
    }

    /// Track the graph rooted at `id`: key set ⇒ Unchanged, else Added.
    pub fn attach(&mut self, id: InstanceId) -> Result<(), TrackError> {
        self.track_graph(id, TrackPolicy::Default)
    }

    /// Track the graph rooted at `id`: key set ⇒ Modified, else Added.
    pub fn update(&mut self, id: InstanceId) -> Result<(), TrackError> {
        self.track_graph(id, TrackPolicy::KeySetModified)
    }

    /// Mark `id` Deleted, attaching its graph first when untracked. An
    /// Added root is simply detached; there is nothing to delete from the
    /// store.
    pub fn remove(&mut self, id: InstanceId) -> Result<(), TrackError> {
        if self.state(id)? == EntityState::Detached {
            self.attach(id)?;
        }
        if self.state(id)? == EntityState::Added {
            self.set_state(id, EntityState::Detached)
        } else {
            self.set_state(id, EntityState::Deleted)
        }
    }
}
