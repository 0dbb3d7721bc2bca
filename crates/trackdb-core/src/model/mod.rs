pub mod entity;
pub mod relation;


use crate::value::ValueKind;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error as ThisError;

// re-exports
pub use entity::{EntityModel, PropertyModel};
pub use relation::{DeleteBehavior, RelationModel};

///
/// ModelError
///
/// Builder-time and lookup failures for the metadata model. Everything here
/// is raised synchronously; a registry that builds successfully is valid
/// for the lifetime of the process.
///

#[derive(Debug, ThisError)]
pub enum ModelError {
    #[error("unknown entity: {name}")]
    UnknownEntity { name: String },

    #[error("duplicate entity: {name}")]
    DuplicateEntity { name: &'static str },

    #[error("entity {entity} declares unknown base: {base}")]
    UnknownBase {
        entity: &'static str,
        base: &'static str,
    },

    #[error("inheritance cycle through entity: {entity}")]
    BaseCycle { entity: &'static str },

    #[error("entity {entity} redeclares inherited property: {property}")]
    DuplicateProperty {
        entity: &'static str,
        property: &'static str,
    },

    #[error("entity {entity} has no primary key")]
    MissingKey { entity: &'static str },

    #[error("entity {entity} key references unknown property: {property}")]
    UnknownKeyProperty {
        entity: &'static str,
        property: &'static str,
    },

    #[error("entity {entity} key property must not be nullable: {property}")]
    NullableKeyProperty {
        entity: &'static str,
        property: &'static str,
    },

    #[error("duplicate relation: {name}")]
    DuplicateRelation { name: &'static str },

    #[error("relation {relation} references unknown foreign-key property {property} on {entity}")]
    UnknownForeignKeyProperty {
        relation: &'static str,
        entity: &'static str,
        property: &'static str,
    },

    #[error("relation {relation} foreign key arity {found} does not match principal key arity {expected}")]
    ForeignKeyArityMismatch {
        relation: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("relation {relation} foreign-key property {property} kind {found} does not match principal key kind {expected}")]
    ForeignKeyKindMismatch {
        relation: &'static str,
        property: &'static str,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("navigation {navigation} on entity {entity} collides with a declared property")]
    NavigationCollision {
        entity: &'static str,
        navigation: &'static str,
    },

    #[error("unknown navigation {navigation} on entity {entity}")]
    UnknownNavigation {
        entity: String,
        navigation: String,
    },
}

///
/// ModelRegistry
///
/// Read-only metadata consumed by the tracking engine: finished entity
/// models plus relationship declarations. Built once via [`ModelBuilder`].
///

#[derive(Debug)]
pub struct ModelRegistry {
    entities: BTreeMap<&'static str, Arc<EntityModel>>,
    relations: Vec<RelationModel>,
}

impl ModelRegistry {
    pub fn entity(&self, name: &str) -> Result<&Arc<EntityModel>, ModelError> {
        self.entities.get(name).ok_or_else(|| ModelError::UnknownEntity {
            name: name.to_string(),
        })
    }

    #[must_use]
    pub fn has_entity(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    #[must_use]
    pub fn relations(&self) -> &[RelationModel] {
        &self.relations
    }

    /// True when `derived` is `base` or carries it in its lineage.
    #[must_use]
    pub fn is_assignable(&self, base: &str, derived: &str) -> bool {
        self.entities
            .get(derived)
            .is_some_and(|e| e.has_ancestor(base))
    }

    /// Relations in which `entity` (or one of its bases) is the principal.
    pub fn relations_for_principal<'a>(
        &'a self,
        entity: &'a str,
    ) -> impl Iterator<Item = &'a RelationModel> {
        self.relations
            .iter()
            .filter(move |rel| self.is_assignable(rel.principal, entity))
    }

    /// Relations in which `entity` (or one of its bases) is the dependent.
    pub fn relations_for_dependent<'a>(
        &'a self,
        entity: &'a str,
    ) -> impl Iterator<Item = &'a RelationModel> {
        self.relations
            .iter()
            .filter(move |rel| self.is_assignable(rel.dependent, entity))
    }

    /// Resolve a dependent-side reference navigation for a runtime entity,
    /// picking the most-derived matching relation declaration.
    pub fn dependent_nav_relation(
        &self,
        entity: &str,
        navigation: &str,
    ) -> Result<&RelationModel, ModelError> {
        self.most_derived(entity, navigation, |rel| {
            (rel.dependent_nav == Some(navigation)).then_some(rel.dependent)
        })
    }

    /// Resolve a principal-side collection navigation for a runtime entity,
    /// picking the most-derived matching relation declaration.
    pub fn principal_nav_relation(
        &self,
        entity: &str,
        navigation: &str,
    ) -> Result<&RelationModel, ModelError> {
        self.most_derived(entity, navigation, |rel| {
            (rel.principal_nav == Some(navigation)).then_some(rel.principal)
        })
    }

    /// Relations whose foreign key contains `property` for this dependent.
    pub fn relations_with_fk_property<'a>(
        &'a self,
        entity: &'a str,
        property: &'a str,
    ) -> impl Iterator<Item = &'a RelationModel> {
        self.relations_for_dependent(entity)
            .filter(move |rel| rel.foreign_key.iter().any(|fk| *fk == property))
    }

    fn most_derived(
        &self,
        entity: &str,
        navigation: &str,
        side: impl Fn(&RelationModel) -> Option<&'static str>,
    ) -> Result<&RelationModel, ModelError> {
        let model = self.entity(entity)?;

        self.relations
            .iter()
            .filter_map(|rel| {
                let declared_on = side(rel)?;
                let depth = model.lineage_depth(declared_on)?;
                Some((depth, rel))
            })
            .min_by_key(|(depth, _)| *depth)
            .map(|(_, rel)| rel)
            .ok_or_else(|| ModelError::UnknownNavigation {
                entity: entity.to_string(),
                navigation: navigation.to_string(),
            })
    }
}

///
/// ModelBuilder
///
/// Declaration surface for entities and relations. `build` flattens
/// inheritance, sorts property slots, and validates every cross-reference
/// before handing out the immutable registry.
///

#[derive(Default)]
pub struct ModelBuilder {
    entities: Vec<EntityDecl>,
    relations: Vec<RelationDecl>,
}

impl ModelBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or continue) declaring an entity.
    pub fn entity(&mut self, name: &'static str) -> &mut EntityDecl {
        self.entities.push(EntityDecl::new(name));
        self.entities.last_mut().expect("just pushed")
    }

    /// Start declaring a relation.
    pub fn relation(&mut self, name: &'static str) -> &mut RelationDecl {
        self.relations.push(RelationDecl::new(name));
        self.relations.last_mut().expect("just pushed")
    }

    pub fn build(self) -> Result<ModelRegistry, ModelError> {
        let mut seen = BTreeSet::new();
        for decl in &self.entities {
            if !seen.insert(decl.name) {
                return Err(ModelError::DuplicateEntity { name: decl.name });
            }
        }

        let decls: BTreeMap<&'static str, &EntityDecl> =
            self.entities.iter().map(|d| (d.name, d)).collect();

        let mut entities = BTreeMap::new();
        for decl in &self.entities {
            let model = Self::flatten(decl, &decls)?;
            entities.insert(decl.name, Arc::new(model));
        }

        let relations = Self::finish_relations(self.relations, &entities)?;

        Ok(ModelRegistry {
            entities,
            relations,
        })
    }

    fn flatten(
        decl: &EntityDecl,
        decls: &BTreeMap<&'static str, &EntityDecl>,
    ) -> Result<EntityModel, ModelError> {
        // Walk the base chain root-ward, collecting lineage and properties.
        let mut lineage = vec![decl.name];
        let mut chain = vec![decl];
        let mut cursor = decl;
        while let Some(base) = cursor.base {
            let base_decl = decls.get(base).ok_or(ModelError::UnknownBase {
                entity: cursor.name,
                base,
            })?;
            if lineage.contains(&base) {
                return Err(ModelError::BaseCycle { entity: decl.name });
            }
            lineage.push(base);
            chain.push(base_decl);
            cursor = base_decl;
        }

        // Root-first so derived redeclarations are caught as duplicates.
        let mut properties: Vec<PropertyModel> = Vec::new();
        for link in chain.iter().rev() {
            for prop in &link.properties {
                if properties.iter().any(|p| p.name == prop.name) {
                    return Err(ModelError::DuplicateProperty {
                        entity: decl.name,
                        property: prop.name,
                    });
                }
                properties.push(*prop);
            }
        }
        properties.sort_by(|a, b| a.name.cmp(b.name));

        // Key is inherited from the closest declaring ancestor.
        let key = chain
            .iter()
            .find(|link| !link.key.is_empty())
            .map(|link| link.key.clone())
            .ok_or(ModelError::MissingKey { entity: decl.name })?;

        for key_prop in &key {
            let prop = properties
                .iter()
                .find(|p| p.name == *key_prop)
                .ok_or(ModelError::UnknownKeyProperty {
                    entity: decl.name,
                    property: key_prop,
                })?;
            if prop.nullable {
                return Err(ModelError::NullableKeyProperty {
                    entity: decl.name,
                    property: key_prop,
                });
            }
        }

        Ok(EntityModel::new(decl.name, lineage, properties, key))
    }

    fn finish_relations(
        decls: Vec<RelationDecl>,
        entities: &BTreeMap<&'static str, Arc<EntityModel>>,
    ) -> Result<Vec<RelationModel>, ModelError> {
        let mut seen = BTreeSet::new();
        let mut relations = Vec::with_capacity(decls.len());

        for decl in decls {
            if !seen.insert(decl.name) {
                return Err(ModelError::DuplicateRelation { name: decl.name });
            }

            let principal =
                entities
                    .get(decl.principal)
                    .ok_or_else(|| ModelError::UnknownEntity {
                        name: decl.principal.to_string(),
                    })?;
            let dependent =
                entities
                    .get(decl.dependent)
                    .ok_or_else(|| ModelError::UnknownEntity {
                        name: decl.dependent.to_string(),
                    })?;

            let principal_key = if decl.principal_key.is_empty() {
                principal.key().to_vec()
            } else {
                decl.principal_key
            };

            if decl.foreign_key.len() != principal_key.len() {
                return Err(ModelError::ForeignKeyArityMismatch {
                    relation: decl.name,
                    expected: principal_key.len(),
                    found: decl.foreign_key.len(),
                });
            }

            for (fk_name, pk_name) in decl.foreign_key.iter().zip(principal_key.iter()) {
                let fk_prop = dependent.property(fk_name).ok_or(
                    ModelError::UnknownForeignKeyProperty {
                        relation: decl.name,
                        entity: decl.dependent,
                        property: fk_name,
                    },
                )?;
                let pk_prop = principal.property(pk_name).ok_or(
                    ModelError::UnknownForeignKeyProperty {
                        relation: decl.name,
                        entity: decl.principal,
                        property: pk_name,
                    },
                )?;
                if fk_prop.kind != pk_prop.kind {
                    return Err(ModelError::ForeignKeyKindMismatch {
                        relation: decl.name,
                        property: fk_name,
                        expected: pk_prop.kind,
                        found: fk_prop.kind,
                    });
                }
            }

            if let Some(nav) = decl.dependent_nav {
                if dependent.property(nav).is_some() {
                    return Err(ModelError::NavigationCollision {
                        entity: decl.dependent,
                        navigation: nav,
                    });
                }
            }
            if let Some(nav) = decl.principal_nav {
                if principal.property(nav).is_some() {
                    return Err(ModelError::NavigationCollision {
                        entity: decl.principal,
                        navigation: nav,
                    });
                }
            }

            relations.push(RelationModel {
                name: decl.name,
                principal: decl.principal,
                dependent: decl.dependent,
                foreign_key: decl.foreign_key,
                principal_key,
                dependent_nav: decl.dependent_nav,
                principal_nav: decl.principal_nav,
                on_delete: decl.on_delete,
            });
        }

        Ok(relations)
    }
}

///
/// EntityDecl
///

pub struct EntityDecl {
    name: &'static str,
    base: Option<&'static str>,
    properties: Vec<PropertyModel>,
    key: Vec<&'static str>,
}

impl EntityDecl {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            base: None,
            properties: Vec::new(),
            key: Vec::new(),
        }
    }

    pub fn base(&mut self, base: &'static str) -> &mut Self {
        self.base = Some(base);
        self
    }

    pub fn key(&mut self, properties: &[&'static str]) -> &mut Self {
        self.key = properties.to_vec();
        self
    }

    /// Declare a required (non-nullable) scalar property.
    pub fn property(&mut self, name: &'static str, kind: ValueKind) -> &mut Self {
        self.push(name, kind, false, false)
    }

    /// Declare a nullable scalar property.
    pub fn nullable(&mut self, name: &'static str, kind: ValueKind) -> &mut Self {
        self.push(name, kind, true, false)
    }

    /// Declare a required shadow property.
    pub fn shadow(&mut self, name: &'static str, kind: ValueKind) -> &mut Self {
        self.push(name, kind, false, true)
    }

    /// Declare a nullable shadow property.
    pub fn nullable_shadow(&mut self, name: &'static str, kind: ValueKind) -> &mut Self {
        self.push(name, kind, true, true)
    }

    fn push(
        &mut self,
        name: &'static str,
        kind: ValueKind,
        nullable: bool,
        shadow: bool,
    ) -> &mut Self {
        self.properties.push(PropertyModel {
            owner: self.name,
            name,
            kind,
            nullable,
            shadow,
        });
        self
    }
}

///
/// RelationDecl
///

pub struct RelationDecl {
    name: &'static str,
    principal: &'static str,
    dependent: &'static str,
    foreign_key: Vec<&'static str>,
    principal_key: Vec<&'static str>,
    dependent_nav: Option<&'static str>,
    principal_nav: Option<&'static str>,
    on_delete: DeleteBehavior,
}

impl RelationDecl {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            principal: "",
            dependent: "",
            foreign_key: Vec::new(),
            principal_key: Vec::new(),
            dependent_nav: None,
            principal_nav: None,
            on_delete: DeleteBehavior::ClientSetNull,
        }
    }

    pub fn principal(&mut self, entity: &'static str) -> &mut Self {
        self.principal = entity;
        self
    }

    pub fn dependent(&mut self, entity: &'static str) -> &mut Self {
        self.dependent = entity;
        self
    }

    pub fn foreign_key(&mut self, properties: &[&'static str]) -> &mut Self {
        self.foreign_key = properties.to_vec();
        self
    }

    /// Override the principal-side key; defaults to the primary key.
    pub fn principal_key(&mut self, properties: &[&'static str]) -> &mut Self {
        self.principal_key = properties.to_vec();
        self
    }

    pub fn dependent_nav(&mut self, navigation: &'static str) -> &mut Self {
        self.dependent_nav = Some(navigation);
        self
    }

    pub fn principal_nav(&mut self, navigation: &'static str) -> &mut Self {
        self.principal_nav = Some(navigation);
        self
    }

    pub fn on_delete(&mut self, behavior: DeleteBehavior) -> &mut Self {
        self.on_delete = behavior;
        self
    }
}
