use crate::model::DeleteBehavior;
use crate::test_fixtures::{catalog_model, facilities_model};
use crate::value::{Value, ValueKind};
use crate::values::{PropertyValues, ValuesError, ValuesRole};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use ulid::Ulid;

fn building_values(role: ValuesRole) -> PropertyValues {
    let model = facilities_model(DeleteBehavior::ClientSetNull);
    let entity = Arc::clone(model.entity("Building").unwrap());
    let mut values = PropertyValues::new(entity, ValuesRole::Detached);
    values.set("BuildingId", Value::Ulid(Ulid::from(7))).unwrap();
    values.set("Name", Value::Text("Building One".to_string())).unwrap();
    values.set("Value", Value::Int(1_500_000)).unwrap();
    values.set_role(role);
    values
}

#[test]
fn unknown_property_name_is_not_found() {
    let values = building_values(ValuesRole::Current);
    assert!(matches!(
        values.get("Basement"),
        Err(ValuesError::PropertyNotFound { .. })
    ));
}

#[test]
fn descriptor_from_unrelated_entity_does_not_belong() {
    let values = building_values(ValuesRole::Current);
    let catalog = catalog_model(DeleteBehavior::ClientSetNull);
    // Product also declares a property called Name; the descriptor still
    // belongs to a different hierarchy.
    let foreign = *catalog.entity("Product").unwrap().property("Name").unwrap();
    assert!(matches!(
        values.get_at(&foreign),
        Err(ValuesError::PropertyDoesNotBelong { .. })
    ));
}

#[test]
fn descriptor_from_base_entity_works_on_derived_store() {
    let catalog = catalog_model(DeleteBehavior::ClientSetNull);
    let featured = Arc::clone(catalog.entity("FeaturedProduct").unwrap());
    let mut values = PropertyValues::new(featured, ValuesRole::Detached);
    values.set("Name", Value::Text("gadget".to_string())).unwrap();

    let base_descriptor = *catalog.entity("Product").unwrap().property("Name").unwrap();
    assert_eq!(
        values.get_at(&base_descriptor).unwrap(),
        &Value::Text("gadget".to_string())
    );
}

#[test]
fn key_slots_are_read_only_outside_detached_stores() {
    let mut values = building_values(ValuesRole::Current);
    let err = values
        .set("BuildingId", Value::Ulid(Ulid::from(8)))
        .unwrap_err();
    assert!(matches!(err, ValuesError::KeyReadOnly { .. }));

    // Re-writing the same key value is a no-op, not an error.
    values
        .set("BuildingId", Value::Ulid(Ulid::from(7)))
        .unwrap();
}

#[test]
fn current_null_on_non_nullable_defers_and_keeps_observed_value() {
    let mut values = building_values(ValuesRole::Current);

    values.set("Name", Value::Null).unwrap();
    assert!(values.has_conceptual_null());
    assert_eq!(values.conceptual_null_properties(), vec!["Name"]);
    assert_eq!(
        values.get("Name").unwrap(),
        &Value::Text("Building One".to_string())
    );

    // A real write clears the deferral.
    values
        .set("Name", Value::Text("Annex".to_string()))
        .unwrap();
    assert!(!values.has_conceptual_null());
}

#[test]
fn original_null_on_non_nullable_fails_immediately() {
    let mut values = building_values(ValuesRole::Original);
    let err = values.set("Name", Value::Null).unwrap_err();
    assert!(matches!(err, ValuesError::ValueCannotBeNull { .. }));
    assert_eq!(
        values.get("Name").unwrap(),
        &Value::Text("Building One".to_string())
    );
    assert!(!values.has_conceptual_null());
}

#[test]
fn nullable_slots_accept_null() {
    let mut values = building_values(ValuesRole::Current);
    values.set("PrincipalMailRoomId", Value::Int(12)).unwrap();
    values.set("PrincipalMailRoomId", Value::Null).unwrap();
    assert_eq!(values.get("PrincipalMailRoomId").unwrap(), &Value::Null);
    assert!(!values.has_conceptual_null());
}

#[test]
fn wrong_kind_is_an_invalid_cast() {
    let mut values = building_values(ValuesRole::Current);
    let err = values.set("Value", Value::Text("lots".to_string())).unwrap_err();
    assert!(matches!(
        err,
        ValuesError::InvalidCast {
            expected: ValueKind::Int,
            found: ValueKind::Text,
            ..
        }
    ));
}

#[test]
fn clones_are_fully_independent_including_keys() {
    let source = building_values(ValuesRole::Current);
    let mut clone = source.clone_values();

    // Clones may freely change the key.
    clone
        .set("BuildingId", Value::Ulid(Ulid::from(99)))
        .unwrap();
    clone.set("Name", Value::Text("Clone".to_string())).unwrap();

    assert_eq!(
        source.get("BuildingId").unwrap(),
        &Value::Ulid(Ulid::from(7))
    );
    assert_eq!(
        source.get("Name").unwrap(),
        &Value::Text("Building One".to_string())
    );
    assert_eq!(
        clone.get("BuildingId").unwrap(),
        &Value::Ulid(Ulid::from(99))
    );
}

#[test]
fn set_values_copies_non_key_slots_and_ignores_unmatched_members() {
    let mut target = building_values(ValuesRole::Current);

    let mut map: BTreeMap<String, Value> = BTreeMap::new();
    map.insert("Name".to_string(), Value::Text("Building One Prime".to_string()));
    map.insert("Value".to_string(), Value::Int(1_500_001));
    map.insert("NotInModel".to_string(), Value::Text("ignored".to_string()));
    target.set_values(&map).unwrap();

    assert_eq!(
        target.get("Name").unwrap(),
        &Value::Text("Building One Prime".to_string())
    );
    assert_eq!(target.get("Value").unwrap(), &Value::Int(1_500_001));
    assert_eq!(
        target.get("BuildingId").unwrap(),
        &Value::Ulid(Ulid::from(7))
    );
}

#[test]
fn set_values_rejects_key_changes_and_applies_nothing() {
    let mut target = building_values(ValuesRole::Current);

    let mut map: BTreeMap<String, Value> = BTreeMap::new();
    map.insert("BuildingId".to_string(), Value::Ulid(Ulid::from(42)));
    map.insert("Name".to_string(), Value::Text("Changed".to_string()));
    let err = target.set_values(&map).unwrap_err();
    assert!(matches!(err, ValuesError::KeyReadOnly { .. }));

    // The failing batch left every slot untouched.
    assert_eq!(
        target.get("Name").unwrap(),
        &Value::Text("Building One".to_string())
    );
}

#[test]
fn set_values_from_another_store() {
    let mut target = building_values(ValuesRole::Current);
    let mut source = building_values(ValuesRole::Detached);
    source.set("Name", Value::Text("From Store".to_string())).unwrap();

    target.set_values(&source).unwrap();
    assert_eq!(
        target.get("Name").unwrap(),
        &Value::Text("From Store".to_string())
    );
}

#[test]
fn to_object_drops_shadow_slots() {
    let mut values = building_values(ValuesRole::Current);
    values
        .set("AuditNote", Value::Text("inspected".to_string()))
        .unwrap();
    assert_eq!(
        values.get("AuditNote").unwrap(),
        &Value::Text("inspected".to_string())
    );

    let object = values.to_object();
    assert_eq!(object.entity(), "Building");
    assert_eq!(
        object.values().get("Name").unwrap(),
        &Value::Text("Building One".to_string())
    );
    // The shadow slot exists on the fresh store but was not copied.
    assert_eq!(object.values().get("AuditNote").unwrap(), &Value::Null);
}

#[test]
fn properties_sequence_is_ordered_and_restartable() {
    let values = building_values(ValuesRole::Current);
    let first: Vec<&str> = values.properties().map(|p| p.name).collect();
    let second: Vec<&str> = values.properties().map(|p| p.name).collect();
    assert_eq!(first, second);
    assert_eq!(
        first,
        vec!["AuditNote", "BuildingId", "Name", "PrincipalMailRoomId", "Value"]
    );
}

proptest! {
    /// Mutating a clone never changes the source, for any property.
    #[test]
    fn prop_clone_independence(name in "[a-z]{1,12}", value in -1_000_000i64..1_000_000) {
        let source = building_values(ValuesRole::Current);
        let mut clone = source.clone_values();
        clone.set("Name", Value::Text(name)).unwrap();
        clone.set("Value", Value::Int(value)).unwrap();

        prop_assert_eq!(source.get("Name").unwrap(), &Value::Text("Building One".to_string()));
        prop_assert_eq!(source.get("Value").unwrap(), &Value::Int(1_500_000));
    }

    /// After set_values, every non-key same-named slot equals the source
    /// and the key slot is untouched.
    #[test]
    fn prop_set_values_matches_source(name in "[A-Za-z ]{0,24}", value in any::<i64>()) {
        let mut target = building_values(ValuesRole::Current);
        let mut map: BTreeMap<String, Value> = BTreeMap::new();
        map.insert("Name".to_string(), Value::Text(name.clone()));
        map.insert("Value".to_string(), Value::Int(value));
        target.set_values(&map).unwrap();

        prop_assert_eq!(target.get("Name").unwrap(), &Value::Text(name));
        prop_assert_eq!(target.get("Value").unwrap(), &Value::Int(value));
        prop_assert_eq!(target.get("BuildingId").unwrap(), &Value::Ulid(Ulid::from(7)));
    }
}
