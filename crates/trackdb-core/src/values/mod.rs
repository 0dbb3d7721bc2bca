#[cfg(test)]
mod tests;

use crate::model::{EntityModel, PropertyModel};
use crate::value::{Value, ValueKind};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error as ThisError;

///
/// ValuesError
///
/// Validation failures for property-store access. All variants are raised
/// synchronously at the call site; the only deferred condition in the
/// engine is the conceptual-null flag, which is not an error.
///

#[derive(Debug, ThisError)]
pub enum ValuesError {
    #[error("property {property} not found on entity {entity}")]
    PropertyNotFound { entity: &'static str, property: String },

    #[error("property {property} belongs to entity {owner}, not {entity}")]
    PropertyDoesNotBelong {
        entity: &'static str,
        owner: &'static str,
        property: &'static str,
    },

    #[error("property {property} is part of the key on entity {entity} and cannot be modified")]
    KeyReadOnly {
        entity: &'static str,
        property: String,
    },

    #[error("original value of non-nullable property {property} ({kind}) on entity {entity} cannot be null")]
    ValueCannotBeNull {
        entity: &'static str,
        property: String,
        kind: ValueKind,
    },

    #[error("value of kind {found} cannot be assigned to property {property} ({expected}) on entity {entity}")]
    InvalidCast {
        entity: &'static str,
        property: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

///
/// ValuesRole
///
/// Which view of the entry a store represents. Current and Original stores
/// freeze the key; Detached stores (clones, materialized snapshots) may
/// change it freely. Null writes to non-nullable slots defer on Current and
/// Detached stores and fail immediately on Original stores.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValuesRole {
    Current,
    Detached,
    Original,
}

///
/// PropertyValues
///
/// Name- and descriptor-indexed slot store for one entity: exactly one slot
/// per declared property (shadow slots included), in lexical name order.
///

#[derive(Clone, Debug)]
pub struct PropertyValues {
    entity: Arc<EntityModel>,
    role: ValuesRole,
    slots: Vec<Value>,
    conceptual_nulls: BTreeSet<usize>,
}

impl PropertyValues {
    #[must_use]
    pub fn new(entity: Arc<EntityModel>, role: ValuesRole) -> Self {
        let slots = vec![Value::Null; entity.property_count()];
        Self {
            entity,
            role,
            slots,
            conceptual_nulls: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn entity(&self) -> &Arc<EntityModel> {
        &self.entity
    }

    #[must_use]
    pub fn entity_name(&self) -> &'static str {
        self.entity.name
    }

    #[must_use]
    pub const fn role(&self) -> ValuesRole {
        self.role
    }

    /// Ordered, restartable property descriptor sequence.
    pub fn properties(&self) -> impl Iterator<Item = &PropertyModel> {
        self.entity.properties()
    }

    pub fn get(&self, property: &str) -> Result<&Value, ValuesError> {
        let index = self.index_of(property)?;
        Ok(&self.slots[index])
    }

    /// Descriptor-indexed read; the descriptor must come from this store's
    /// entity or one of its bases.
    pub fn get_at(&self, property: &PropertyModel) -> Result<&Value, ValuesError> {
        self.check_belongs(property)?;
        self.get(property.name)
    }

    pub fn set(&mut self, property: &str, value: Value) -> Result<(), ValuesError> {
        let index = self.index_of(property)?;
        self.set_index(index, value)
    }

    /// Descriptor-indexed write; same ownership rule as [`Self::get_at`].
    pub fn set_at(&mut self, property: &PropertyModel, value: Value) -> Result<(), ValuesError> {
        self.check_belongs(property)?;
        let index = self.index_of(property.name)?;
        self.set_index(index, value)
    }

    /// Fully independent copy; mutations on either side never propagate,
    /// and the clone may change key values.
    #[must_use]
    pub fn clone_values(&self) -> Self {
        let mut clone = self.clone();
        clone.role = ValuesRole::Detached;
        clone
    }

    /// Copy same-named property values from `source` into this store.
    /// Unmatched source members are ignored; changing a key value through
    /// this path fails with `KeyReadOnly` regardless of role.
    pub fn set_values<'a>(&mut self, source: impl Into<ValuesSource<'a>>) -> Result<(), ValuesError> {
        let source = source.into();
        let names: Vec<&'static str> = self.properties().map(|p| p.name).collect();

        // Validate the whole batch up front so a failing batch is a no-op.
        for name in &names {
            if let Some(value) = source.lookup(name) {
                let index = self.index_of(name)?;
                if self.entity.is_key(name) && self.slots[index] != *value {
                    return Err(ValuesError::KeyReadOnly {
                        entity: self.entity.name,
                        property: (*name).to_string(),
                    });
                }
                self.check_assignable(index, value)?;
            }
        }

        for name in &names {
            if let Some(value) = source.lookup(name) {
                if self.entity.is_key(name) {
                    continue;
                }
                let index = self.index_of(name)?;
                self.set_index(index, value.clone())?;
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn has_conceptual_null(&self) -> bool {
        !self.conceptual_nulls.is_empty()
    }

    /// True when the slot's last write was a deferred null. The observed
    /// value is stale in that case; resolution logic must treat the slot
    /// as unset.
    pub fn is_conceptually_null(&self, property: &str) -> Result<bool, ValuesError> {
        let index = self.index_of(property)?;
        Ok(self.conceptual_nulls.contains(&index))
    }

    /// Property names whose last write was a deferred null.
    #[must_use]
    pub fn conceptual_null_properties(&self) -> Vec<&'static str> {
        let properties: Vec<&PropertyModel> = self.properties().collect();
        self.conceptual_nulls
            .iter()
            .map(|index| properties[*index].name)
            .collect()
    }

    //
    // crate-internal surface
    //

    pub(crate) fn set_role(&mut self, role: ValuesRole) {
        self.role = role;
    }

    /// Write bypassing role checks; used for key generation on Added
    /// entries, fixup FK propagation, and reload. Clears any deferred null
    /// on the slot.
    pub(crate) fn write_unchecked(&mut self, property: &str, value: Value) -> Result<(), ValuesError> {
        let index = self.index_of(property)?;
        self.check_assignable_kind_only(index, &value)?;
        self.apply(index, value);
        Ok(())
    }

    /// Null a slot from the cascade resolver: a plain nullable write, or a
    /// deferred conceptual null when the slot is non-nullable.
    pub(crate) fn sever(&mut self, property: &str) -> Result<(), ValuesError> {
        let index = self.index_of(property)?;
        if self.prop_at(index).nullable {
            self.apply(index, Value::Null);
        } else {
            self.conceptual_nulls.insert(index);
        }
        Ok(())
    }

    pub(crate) fn clear_conceptual_nulls(&mut self) {
        self.conceptual_nulls.clear();
    }

    fn index_of(&self, property: &str) -> Result<usize, ValuesError> {
        self.entity
            .property_index(property)
            .ok_or_else(|| ValuesError::PropertyNotFound {
                entity: self.entity.name,
                property: property.to_string(),
            })
    }

    fn check_belongs(&self, property: &PropertyModel) -> Result<(), ValuesError> {
        if self.entity.has_ancestor(property.owner) && self.entity.property(property.name).is_some()
        {
            Ok(())
        } else {
            Err(ValuesError::PropertyDoesNotBelong {
                entity: self.entity.name,
                owner: property.owner,
                property: property.name,
            })
        }
    }

    fn set_index(&mut self, index: usize, value: Value) -> Result<(), ValuesError> {
        let prop = self.prop_at(index);

        if self.role != ValuesRole::Detached
            && self.entity.is_key(prop.name)
            && self.slots[index] != value
        {
            return Err(ValuesError::KeyReadOnly {
                entity: self.entity.name,
                property: prop.name.to_string(),
            });
        }

        self.check_assignable(index, &value)?;

        // Original stores were rejected above; on current/detached stores a
        // null write to a non-nullable slot defers and the observed value
        // stays as it was.
        if value.is_null() && !prop.nullable {
            self.conceptual_nulls.insert(index);
            return Ok(());
        }

        self.apply(index, value);
        Ok(())
    }

    fn prop_at(&self, index: usize) -> PropertyModel {
        *self
            .entity
            .properties()
            .nth(index)
            .expect("slot index maps to a declared property")
    }

    /// Type- and nullability-check a candidate write without applying it.
    fn check_assignable(&self, index: usize, value: &Value) -> Result<(), ValuesError> {
        let prop = self.prop_at(index);

        if value.is_null() && !prop.nullable && self.role == ValuesRole::Original {
            return Err(ValuesError::ValueCannotBeNull {
                entity: self.entity.name,
                property: prop.name.to_string(),
                kind: prop.kind,
            });
        }

        self.check_assignable_kind_only(index, value)
    }

    fn check_assignable_kind_only(&self, index: usize, value: &Value) -> Result<(), ValuesError> {
        let prop = self.prop_at(index);
        if let Some(found) = value.kind() {
            if found != prop.kind {
                return Err(ValuesError::InvalidCast {
                    entity: self.entity.name,
                    property: prop.name.to_string(),
                    expected: prop.kind,
                    found,
                });
            }
        }
        Ok(())
    }

    fn apply(&mut self, index: usize, value: Value) {
        self.slots[index] = value;
        self.conceptual_nulls.remove(&index);
    }
}

impl PartialEq for PropertyValues {
    fn eq(&self, other: &Self) -> bool {
        self.entity.name == other.entity.name && self.slots == other.slots
    }
}

impl Eq for PropertyValues {}

///
/// ValuesSource
///
/// Accepted inputs for [`PropertyValues::set_values`]: another store, or a
/// name→value mapping. Matching is by name against the target's own
/// declared properties.
///

pub enum ValuesSource<'a> {
    Store(&'a PropertyValues),
    Map(&'a BTreeMap<String, Value>),
}

impl ValuesSource<'_> {
    fn lookup(&self, property: &str) -> Option<&Value> {
        match self {
            Self::Store(values) => {
                let index = values.entity.property_index(property)?;
                Some(&values.slots[index])
            }
            Self::Map(map) => map.get(property),
        }
    }
}

impl<'a> From<&'a PropertyValues> for ValuesSource<'a> {
    fn from(values: &'a PropertyValues) -> Self {
        Self::Store(values)
    }
}

impl<'a> From<&'a BTreeMap<String, Value>> for ValuesSource<'a> {
    fn from(map: &'a BTreeMap<String, Value>) -> Self {
        Self::Map(map)
    }
}
