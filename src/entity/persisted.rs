//! Persisted form of an entity: its shape identifier and ordered values.
//!
//! Bindings, the changed set and the parent link are runtime state and are
//! never written. A restored entity is detached and clean.

use std::rc::Rc;

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EntityHandle;
use crate::core::{EntityError, ObjectRef, Result, Value};
use crate::schema::ShapeRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntity {
    pub entity_class: String,
    pub values: IndexMap<String, PersistedValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PersistedValue {
    Null,
    Boolean(bool),
    Char(char),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Enum(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    Object(serde_json::Value),
    Entity(Box<PersistedEntity>),
}

impl PersistedEntity {
    pub fn from_entity(entity: &EntityHandle) -> Result<Self> {
        let values = entity
            .properties()
            .iter()
            .map(|(name, value)| Ok((name.clone(), PersistedValue::from_value(name, value)?)))
            .collect::<Result<IndexMap<_, _>>>()?;

        Ok(Self {
            entity_class: entity.shape_id(),
            values,
        })
    }

    /// Rebuilds a detached entity. Restored nested entities have no parent.
    pub fn into_entity(self, registry: &Rc<ShapeRegistry>) -> Result<EntityHandle> {
        let entity = EntityHandle::new(registry, &self.entity_class)?;
        for (name, persisted) in self.values {
            let value = match persisted {
                PersistedValue::Entity(child) => Value::Entity(child.into_entity(registry)?),
                other => other.into_value(),
            };
            entity.state_mut().store.cache(&name, value);
        }
        Ok(entity)
    }
}

impl PersistedValue {
    fn from_value(property: &str, value: &Value) -> Result<Self> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Boolean(b) => Self::Boolean(*b),
            Value::Char(c) => Self::Char(*c),
            Value::Byte(i) => Self::Byte(*i),
            Value::Short(i) => Self::Short(*i),
            Value::Integer(i) => Self::Integer(*i),
            Value::Long(i) => Self::Long(*i),
            Value::Float(f) if f.is_finite() => Self::Float(*f),
            Value::Double(f) if f.is_finite() => Self::Double(*f),
            Value::Float(_) | Value::Double(_) => {
                return Err(EntityError::Serialization(format!(
                    "Property '{}' holds {} which has no persisted form",
                    property, value
                )));
            }
            Value::Text(s) => Self::Text(s.clone()),
            Value::Enum(s) => Self::Enum(s.clone()),
            Value::Date(d) => Self::Date(*d),
            Value::Timestamp(t) => Self::Timestamp(*t),
            Value::Uuid(u) => Self::Uuid(*u),
            Value::Bytes(b) => Self::Bytes(b.clone()),
            Value::Object(o) => Self::Object(o.to_json()),
            Value::Entity(e) => Self::Entity(Box::new(PersistedEntity::from_entity(e)?)),
            Value::Opaque(o) => {
                return Err(EntityError::Serialization(format!(
                    "Property '{}' holds a {} which cannot be serialized",
                    property,
                    o.type_name()
                )));
            }
        })
    }

    /// Entities are restored by [`PersistedEntity::into_entity`].
    fn into_value(self) -> Value {
        match self {
            Self::Null | Self::Entity(_) => Value::Null,
            Self::Boolean(b) => Value::Boolean(b),
            Self::Char(c) => Value::Char(c),
            Self::Byte(i) => Value::Byte(i),
            Self::Short(i) => Value::Short(i),
            Self::Integer(i) => Value::Integer(i),
            Self::Long(i) => Value::Long(i),
            Self::Float(f) => Value::Float(f),
            Self::Double(f) => Value::Double(f),
            Self::Text(s) => Value::Text(s),
            Self::Enum(s) => Value::Enum(s),
            Self::Date(d) => Value::Date(d),
            Self::Timestamp(t) => Value::Timestamp(t),
            Self::Uuid(u) => Value::Uuid(u),
            Self::Bytes(b) => Value::Bytes(b),
            Self::Object(json) => Value::Object(ObjectRef::new(json)),
        }
    }
}

impl EntityHandle {
    /// MessagePack encoding of the persisted form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let persisted = PersistedEntity::from_entity(self)?;
        rmp_serde::to_vec_named(&persisted)
            .map_err(|e| EntityError::Serialization(format!("Failed to serialize entity: {}", e)))
    }

    pub fn from_bytes(registry: &Rc<ShapeRegistry>, bytes: &[u8]) -> Result<Self> {
        let persisted: PersistedEntity = rmp_serde::from_slice(bytes).map_err(|e| {
            EntityError::Serialization(format!("Failed to deserialize entity: {}", e))
        })?;
        persisted.into_entity(registry)
    }

    pub fn to_json(&self) -> Result<String> {
        let persisted = PersistedEntity::from_entity(self)?;
        Ok(serde_json::to_string(&persisted)?)
    }

    pub fn from_json(registry: &Rc<ShapeRegistry>, json: &str) -> Result<Self> {
        let persisted: PersistedEntity = serde_json::from_str(json)?;
        persisted.into_entity(registry)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::{OpaqueRef, PropertyKind};
    use crate::database::InMemoryDatabase;
    use crate::schema::{EntityShape, TableBinding};

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
                    .required("name", PropertyKind::Text)
                    .optional("hire_date", PropertyKind::Date)
                    .required("rating", PropertyKind::Double)
                    .required("settings", PropertyKind::Object)
                    .optional("session", PropertyKind::Opaque { name: "Session".into() })
                    .required("department", PropertyKind::entity("Department")),
            )
            .table(TableBinding::new("t_employee", "Employee").primary_key("id", "id"))
            .build()
            .unwrap()
    }

    fn employee(registry: &Rc<ShapeRegistry>) -> EntityHandle {
        let database: Rc<dyn crate::database::Database> = Rc::new(InMemoryDatabase::new());
        let employee = EntityHandle::attached(registry, "Employee", database).unwrap();
        employee.set("id", 1).unwrap();
        employee.set("name", "vince").unwrap();
        employee
            .set("hire_date", NaiveDate::from_ymd_opt(2018, 1, 1).unwrap())
            .unwrap();
        employee
            .set("settings", ObjectRef::new(json!({"theme": "dark"})))
            .unwrap();
        employee
            .read_property("department")
            .unwrap()
            .as_entity()
            .unwrap()
            .set("name", "tech")
            .unwrap();
        employee
    }

    #[test]
    fn test_persisted_form_has_only_class_and_values() {
        let registry = registry();
        let json: serde_json::Value =
            serde_json::from_str(&employee(&registry).to_json().unwrap()).unwrap();

        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(json["entity_class"], "Employee");
        assert_eq!(json["values"]["name"], json!({"type": "text", "value": "vince"}));
    }

    #[test]
    fn test_restored_entity_is_equal_detached_and_clean() {
        let registry = registry();
        let original = employee(&registry);

        for restored in [
            EntityHandle::from_bytes(&registry, &original.to_bytes().unwrap()).unwrap(),
            EntityHandle::from_json(&registry, &original.to_json().unwrap()).unwrap(),
        ] {
            assert_eq!(restored, original);
            assert!(!restored.is_attached());
            assert!(!restored.has_changes());
            assert!(restored.parent().is_none());

            let department = restored.get("department").unwrap();
            assert!(department.as_entity().unwrap().parent().is_none());
        }
    }

    #[test]
    fn test_unknown_shape_is_rejected() {
        let json = r#"{"entity_class":"Nope","values":{}}"#;
        assert!(matches!(
            EntityHandle::from_json(&registry(), json),
            Err(EntityError::UnknownShape(_))
        ));
    }

    #[test]
    fn test_opaque_values_cannot_be_serialized() {
        let registry = registry();
        let employee = employee(&registry);
        employee.set("session", OpaqueRef::new("token".to_string())).unwrap();

        assert!(matches!(employee.to_bytes(), Err(EntityError::Serialization(_))));
        assert!(matches!(employee.to_json(), Err(EntityError::Serialization(_))));
    }

    #[test]
    fn test_non_finite_floats_cannot_be_serialized() {
        let registry = registry();
        for rating in [f64::NAN, f64::INFINITY] {
            let employee = employee(&registry);
            employee.set("rating", rating).unwrap();

            match employee.to_json() {
                Err(EntityError::Serialization(message)) => assert!(message.contains("rating")),
                other => panic!("unexpected {other:?}"),
            }
            assert!(matches!(employee.to_bytes(), Err(EntityError::Serialization(_))));
        }
    }
}
