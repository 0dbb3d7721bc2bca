use crate::model::EntityModel;
use crate::values::{PropertyValues, ValuesRole};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

///
/// InstanceId
///
/// Stable surrogate identity of one materialized instance. All graph edges
/// (references, collection membership) are ids into the session arena, so
/// cyclic and back-referencing graphs never create ownership cycles.
///

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[display("#{_0}")]
pub struct InstanceId(u64);

///
/// Instance
///
/// One materialized domain object: runtime entity name (the discriminator),
/// the scalar bag (the Current store once tracked), and navigation slots.
/// Collection slots are created lazily on first use.
///

#[derive(Debug)]
pub struct Instance {
    entity: &'static str,
    values: PropertyValues,
    refs: BTreeMap<&'static str, Option<InstanceId>>,
    collections: BTreeMap<&'static str, Vec<InstanceId>>,
}

impl Instance {
    #[must_use]
    pub fn new(model: &Arc<EntityModel>) -> Self {
        Self {
            entity: model.name,
            values: PropertyValues::new(Arc::clone(model), ValuesRole::Detached),
            refs: BTreeMap::new(),
            collections: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn entity(&self) -> &'static str {
        self.entity
    }

    #[must_use]
    pub const fn values(&self) -> &PropertyValues {
        &self.values
    }

    pub(crate) const fn values_mut(&mut self) -> &mut PropertyValues {
        &mut self.values
    }

    /// Reference-navigation slot; `None` when never set or cleared.
    #[must_use]
    pub fn reference(&self, navigation: &str) -> Option<InstanceId> {
        self.refs.get(navigation).copied().flatten()
    }

    /// Collection-navigation members, in insertion order.
    #[must_use]
    pub fn collection(&self, navigation: &str) -> &[InstanceId] {
        self.collections
            .get(navigation)
            .map_or(&[], Vec::as_slice)
    }

    pub(crate) fn set_reference_slot(
        &mut self,
        navigation: &'static str,
        target: Option<InstanceId>,
    ) {
        self.refs.insert(navigation, target);
    }

    pub(crate) fn collection_insert(&mut self, navigation: &'static str, member: InstanceId) {
        let slot = self.collections.entry(navigation).or_default();
        if !slot.contains(&member) {
            slot.push(member);
        }
    }

    pub(crate) fn collection_take_out(&mut self, navigation: &str, member: InstanceId) {
        if let Some(slot) = self.collections.get_mut(navigation) {
            slot.retain(|id| *id != member);
        }
    }

    pub(crate) fn reference_slots(&self) -> &BTreeMap<&'static str, Option<InstanceId>> {
        &self.refs
    }

    pub(crate) fn collection_slots(&self) -> &BTreeMap<&'static str, Vec<InstanceId>> {
        &self.collections
    }
}

impl PropertyValues {
    /// Materialize a disconnected instance of this store's declared entity.
    /// Shadow slots have no home on the object and are dropped; navigation
    /// slots start empty.
    #[must_use]
    pub fn to_object(&self) -> Instance {
        let mut instance = Instance::new(self.entity());
        for prop in self.properties().filter(|p| !p.shadow) {
            let value = self.get(prop.name).expect("declared property").clone();
            instance
                .values
                .write_unchecked(prop.name, value)
                .expect("same entity model");
        }
        instance
    }
}

///
/// InstanceArena
///
/// Session-owned storage for every materialized instance, tracked or not.
/// Ids are never reused within one session.
///

#[derive(Debug, Default)]
pub(crate) struct InstanceArena {
    instances: BTreeMap<InstanceId, Instance>,
    next: u64,
}

impl InstanceArena {
    pub(crate) fn insert(&mut self, instance: Instance) -> InstanceId {
        let id = InstanceId(self.next);
        self.next += 1;
        self.instances.insert(id, instance);
        id
    }

    pub(crate) fn get(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.instances.get_mut(&id)
    }
}
