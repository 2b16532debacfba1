use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{EntityError, PropertyKind, Result, Value};

/// A materialized database row: column name to value, in select order.
pub type Row = IndexMap<String, Value>;

/// Ordered property-name to value mapping of one entity.
pub type PropertyMap = IndexMap<String, Value>;

/// A declared abstract property of an entity shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: PropertyKind,
    #[serde(default)]
    pub nullable: bool,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(EntityError::NullValue(format!(
                    "Property '{}' of type {} cannot be null",
                    self.name, self.kind
                )));
            }
            return Ok(());
        }

        if !self.kind.is_compatible(value) {
            return Err(EntityError::TypeMismatch(format!(
                "Property '{}' expects type {}, got {}",
                self.name,
                self.kind,
                value.type_name()
            )));
        }

        Ok(())
    }
}
