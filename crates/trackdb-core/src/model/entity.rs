use crate::value::ValueKind;

///
/// EntityModel
///
/// Finished runtime model for one entity: flattened property list (own and
/// inherited, including shadow slots), key property names, and the base
/// chain used for discriminator dispatch.
///

#[derive(Debug)]
pub struct EntityModel {
    /// Stable entity name; doubles as the type discriminator.
    pub name: &'static str,
    /// Base chain, most-derived first: `[self, parent, .., root]`.
    pub lineage: Vec<&'static str>,
    /// Flattened properties, sorted lexically by name.
    properties: Vec<PropertyModel>,
    /// Primary-key property names, in declared order.
    key: Vec<&'static str>,
}

impl EntityModel {
    pub(crate) const fn new(
        name: &'static str,
        lineage: Vec<&'static str>,
        properties: Vec<PropertyModel>,
        key: Vec<&'static str>,
    ) -> Self {
        Self {
            name,
            lineage,
            properties,
            key,
        }
    }

    /// Ordered property descriptors (lexical by name, restartable).
    pub fn properties(&self) -> impl Iterator<Item = &PropertyModel> {
        self.properties.iter()
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyModel> {
        self.property_index(name).map(|i| &self.properties[i])
    }

    #[must_use]
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties
            .binary_search_by(|p| p.name.cmp(name))
            .ok()
    }

    #[must_use]
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    #[must_use]
    pub fn key(&self) -> &[&'static str] {
        &self.key
    }

    #[must_use]
    pub fn is_key(&self, name: &str) -> bool {
        self.key.iter().any(|k| *k == name)
    }

    /// Root of the inheritance chain; the identity-map scope.
    #[must_use]
    pub fn root(&self) -> &'static str {
        self.lineage.last().copied().unwrap_or(self.name)
    }

    /// True when `ancestor` is this entity or one of its bases.
    #[must_use]
    pub fn has_ancestor(&self, ancestor: &str) -> bool {
        self.lineage.iter().any(|name| *name == ancestor)
    }

    /// Position of `ancestor` in the lineage; 0 is the entity itself.
    /// Used to pick the most-derived relationship match.
    #[must_use]
    pub fn lineage_depth(&self, ancestor: &str) -> Option<usize> {
        self.lineage.iter().position(|name| *name == ancestor)
    }
}

///
/// PropertyModel
///
/// One scalar slot declaration. `owner` is the declaring entity, which may
/// be a base of the entity whose store carries the slot; descriptor-indexed
/// access validates ownership against the store's lineage.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PropertyModel {
    pub owner: &'static str,
    pub name: &'static str,
    pub kind: ValueKind,
    pub nullable: bool,
    /// Tracked by the engine with no corresponding slot on the domain
    /// object materialized by `to_object`.
    pub shadow: bool,
}
