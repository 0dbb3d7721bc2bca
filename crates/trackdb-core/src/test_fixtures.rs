//! Shared test fixtures: a small facilities model exercising value stores
//! and shadow properties, and a catalog model exercising relationships,
//! inheritance overrides, and delete behaviors.

use crate::model::{DeleteBehavior, ModelBuilder, ModelRegistry};
use crate::session::{InstanceId, Session};
use crate::value::ValueKind;
use std::sync::Arc;
use ulid::Ulid;

/// Building/Office model: Ulid keys, a nullable scalar, a shadow slot, and
/// a non-nullable FK from Office to Building.
pub(crate) fn facilities_model(on_delete: DeleteBehavior) -> Arc<ModelRegistry> {
    let mut builder = ModelBuilder::new();

    builder
        .entity("Building")
        .key(&["BuildingId"])
        .property("BuildingId", ValueKind::Ulid)
        .property("Name", ValueKind::Text)
        .property("Value", ValueKind::Int)
        .nullable("PrincipalMailRoomId", ValueKind::Int)
        .nullable_shadow("AuditNote", ValueKind::Text);

    builder
        .entity("Office")
        .key(&["OfficeId"])
        .property("OfficeId", ValueKind::Ulid)
        .property("Number", ValueKind::Text)
        .property("BuildingId", ValueKind::Ulid);

    builder
        .relation("building_offices")
        .principal("Building")
        .dependent("Office")
        .foreign_key(&["BuildingId"])
        .dependent_nav("Building")
        .principal_nav("Offices")
        .on_delete(on_delete);

    Arc::new(builder.build().expect("valid facilities model"))
}

/// Category/Product model with a derived dependent: FeaturedProduct
/// overrides the `Category` navigation with its own FK property.
pub(crate) fn catalog_model(on_delete: DeleteBehavior) -> Arc<ModelRegistry> {
    let mut builder = ModelBuilder::new();

    builder
        .entity("Category")
        .key(&["Id"])
        .property("Id", ValueKind::Int)
        .property("Name", ValueKind::Text);

    builder
        .entity("Product")
        .key(&["Id"])
        .property("Id", ValueKind::Int)
        .property("Name", ValueKind::Text)
        .nullable("CategoryId", ValueKind::Int);

    builder
        .entity("FeaturedProduct")
        .base("Product")
        .nullable("PromoCategoryId", ValueKind::Int)
        .nullable("Promo", ValueKind::Text);

    builder
        .relation("category_products")
        .principal("Category")
        .dependent("Product")
        .foreign_key(&["CategoryId"])
        .dependent_nav("Category")
        .principal_nav("Products")
        .on_delete(on_delete);

    builder
        .relation("category_featured")
        .principal("Category")
        .dependent("FeaturedProduct")
        .foreign_key(&["PromoCategoryId"])
        .dependent_nav("Category")
        .principal_nav("Featured")
        .on_delete(DeleteBehavior::ClientSetNull);

    Arc::new(builder.build().expect("valid catalog model"))
}

pub(crate) fn building_one(session: &mut Session) -> InstanceId {
    let id = session.new_instance("Building").expect("known entity");
    session
        .set_value(id, "BuildingId", Ulid::from(0x01))
        .expect("key");
    session
        .set_value(id, "Name", "Building One")
        .expect("name");
    session
        .set_value(id, "Value", 1_500_000i64)
        .expect("value");
    id
}

pub(crate) fn office(session: &mut Session, key: u128, number: &str) -> InstanceId {
    let id = session.new_instance("Office").expect("known entity");
    session
        .set_value(id, "OfficeId", Ulid::from(key))
        .expect("key");
    session.set_value(id, "Number", number).expect("number");
    id
}

pub(crate) fn category(session: &mut Session, key: i64, name: &str) -> InstanceId {
    let id = session.new_instance("Category").expect("known entity");
    session.set_value(id, "Id", key).expect("key");
    session.set_value(id, "Name", name).expect("name");
    id
}

pub(crate) fn product(session: &mut Session, key: i64, name: &str) -> InstanceId {
    let id = session.new_instance("Product").expect("known entity");
    session.set_value(id, "Id", key).expect("key");
    session.set_value(id, "Name", name).expect("name");
    id
}

pub(crate) fn featured_product(session: &mut Session, key: i64, name: &str) -> InstanceId {
    let id = session.new_instance("FeaturedProduct").expect("known entity");
    session.set_value(id, "Id", key).expect("key");
    session.set_value(id, "Name", name).expect("name");
    id
}
