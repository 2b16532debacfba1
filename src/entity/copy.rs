use tracing::{Level, event};

use super::EntityHandle;
use crate::core::{EntityError, Result, Value};

/// Deep duplication of entities.
///
/// The copy shares no mutable state with the source: nested entities are
/// copied recursively and JSON objects get a new cell. Immutable scalars are
/// cloned.
pub struct CopyEngine;

impl CopyEngine {
    /// Copies `entity` with the same shape, bindings and parent.
    ///
    /// Nested entities whose parent was `entity` are re-parented to the copy;
    /// a nested entity owned by some other parent keeps pointing there. The
    /// changed set is carried over as-is.
    pub fn copy(entity: &EntityHandle) -> Result<EntityHandle> {
        let (copy, values, changed) = {
            let state = entity.state();
            let copy = EntityHandle::from_parts(
                state.registry.clone(),
                state.shape.clone(),
                state.database.clone(),
                state.table.clone(),
                state.parent.clone(),
            );
            let values = state.store.snapshot().clone();
            let changed: Vec<String> = state.store.changed().iter().cloned().collect();
            (copy, values, changed)
        };

        for (name, value) in &values {
            let duplicate = match value {
                Value::Entity(child) => {
                    let child_copy = Self::copy(child)?;
                    if child.is_child_of(entity) {
                        child_copy.set_parent(Some(&copy));
                    }
                    Value::Entity(child_copy)
                }
                other => Self::duplicate(name, other)?,
            };
            // bypasses the primary-key guard; keys are copied, not reassigned
            copy.state_mut().store.cache(name, duplicate);
        }
        copy.state_mut().store.mark_changed(changed);

        event!(
            Level::TRACE,
            shape = %copy.shape_id(),
            values = values.len(),
            "entity copied"
        );
        Ok(copy)
    }

    /// Duplicates a single value of `property` according to its kind.
    pub fn duplicate(property: &str, value: &Value) -> Result<Value> {
        match value {
            Value::Object(object) => Ok(Value::Object(object.deep_clone())),
            Value::Bytes(bytes) => Ok(Value::Bytes(bytes.to_vec())),
            Value::Entity(child) => Self::copy(child).map(Value::Entity),
            Value::Opaque(opaque) => Err(EntityError::NonCopyableValue {
                property: property.to_string(),
                kind: opaque.type_name().to_string(),
            }),
            scalar => Ok(scalar.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::core::{ObjectRef, OpaqueRef, PropertyKind};
    use crate::schema::{EntityShape, ShapeRegistry};

    fn registry() -> Rc<ShapeRegistry> {
        ShapeRegistry::builder()
            .shape(
                EntityShape::new("Department")
                    .required("id", PropertyKind::Integer)
                    .required("name", PropertyKind::Text),
            )
            .shape(
                EntityShape::new("Employee")
                    .required("id", PropertyKind::Integer)
                    .required("avatar", PropertyKind::Bytes)
                    .required("settings", PropertyKind::Object)
                    .optional("session", PropertyKind::Opaque { name: "Session".into() })
                    .required("department", PropertyKind::entity("Department")),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_copy_is_equal_but_unaliased() {
        let registry = registry();
        let employee = EntityHandle::new(&registry, "Employee").unwrap();
        employee.set("id", 1).unwrap();
        employee.set("avatar", vec![1u8, 2, 3]).unwrap();
        employee
            .set("settings", ObjectRef::new(json!({"theme": "dark"})))
            .unwrap();

        let copy = employee.copy().unwrap();
        assert_eq!(copy, employee);
        assert!(!copy.ptr_eq(&employee));

        let original_settings = employee.get("settings").unwrap();
        let copied_settings = copy.get("settings").unwrap();
        assert!(!original_settings.same_instance(&copied_settings));

        copied_settings
            .as_object()
            .unwrap()
            .update(|json| json["theme"] = json!("light"));
        assert_eq!(original_settings.as_object().unwrap().to_json()["theme"], "dark");
        assert_ne!(copy, employee);
    }

    #[test]
    fn test_owned_children_are_reparented() {
        let registry = registry();
        let employee = EntityHandle::new(&registry, "Employee").unwrap();
        let department = employee.read_property("department").unwrap();
        department.as_entity().unwrap().set("name", "tech").unwrap();

        let copy = employee.copy().unwrap();
        let copied = copy.get("department").unwrap();
        let copied = copied.as_entity().unwrap();

        assert!(copied.is_child_of(&copy));
        assert!(!copied.ptr_eq(department.as_entity().unwrap()));

        copied.set("name", "finance").unwrap();
        assert_eq!(
            department.as_entity().unwrap().get("name"),
            Some(Value::from("tech"))
        );
    }

    #[test]
    fn test_foreign_parent_is_kept() {
        let registry = registry();
        let owner = EntityHandle::new(&registry, "Employee").unwrap();
        let department = EntityHandle::new(&registry, "Department").unwrap();
        department.set_parent(Some(&owner));

        let employee = EntityHandle::new(&registry, "Employee").unwrap();
        employee.set("department", department).unwrap();

        let copy = employee.copy().unwrap();
        let copied = copy.get("department").unwrap();
        assert!(copied.as_entity().unwrap().is_child_of(&owner));
    }

    #[test]
    fn test_changed_set_is_carried_over() {
        let employee = EntityHandle::new(&registry(), "Employee").unwrap();
        employee.set("id", 3).unwrap();

        let copy = employee.copy().unwrap();
        assert_eq!(copy.changed_properties(), vec!["id".to_string()]);
    }

    #[test]
    fn test_opaque_value_is_not_copyable() {
        let employee = EntityHandle::new(&registry(), "Employee").unwrap();
        employee.set("session", OpaqueRef::new(42u32)).unwrap();

        match employee.copy() {
            Err(EntityError::NonCopyableValue { property, .. }) => assert_eq!(property, "session"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
