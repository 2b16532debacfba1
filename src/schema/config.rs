//! Declarative registry configuration.
//!
//! Shapes and table bindings can be described in JSON instead of code:
//!
//! ```json
//! {
//!   "shapes": [
//!     { "id": "Staff", "properties": [
//!         { "name": "id", "kind": { "type": "integer" } },
//!         { "name": "name", "kind": { "type": "text" }, "nullable": true }
//!     ] }
//!   ],
//!   "tables": [
//!     { "table": "t_employee", "shape": "Staff", "columns": [
//!         { "column": "id", "property": "id", "primary_key": true },
//!         { "column": "name", "property": "name" }
//!     ] }
//!   ]
//! }
//! ```
//!
//! Methods with default bodies cannot be expressed here; only abstract
//! method names are accepted.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::{EntityShape, ShapeRegistry, ShapeRegistryBuilder, TableBinding};
use crate::core::{PropertyDescriptor, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub shapes: Vec<ShapeConfig>,
    #[serde(default)]
    pub tables: Vec<TableBinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeConfig {
    pub id: String,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
    #[serde(default)]
    pub abstract_methods: Vec<String>,
}

impl ShapeConfig {
    pub fn into_shape(self) -> EntityShape {
        let shape = self
            .properties
            .into_iter()
            .fold(EntityShape::new(self.id), EntityShape::property);
        self.abstract_methods
            .into_iter()
            .fold(shape, |shape, method| shape.abstract_method(method))
    }
}

impl RegistryConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_builder(self) -> ShapeRegistryBuilder {
        let builder = self
            .shapes
            .into_iter()
            .fold(ShapeRegistry::builder(), |builder, shape| {
                builder.shape(shape.into_shape())
            });
        self.tables.into_iter().fold(builder, ShapeRegistryBuilder::table)
    }
}

impl ShapeRegistry {
    pub fn from_config(config: RegistryConfig) -> Result<Rc<ShapeRegistry>> {
        config.into_builder().build()
    }

    pub fn from_json(json: &str) -> Result<Rc<ShapeRegistry>> {
        Self::from_config(RegistryConfig::from_json(json)?)
    }
}
