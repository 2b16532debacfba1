use std::rc::Rc;

use indexmap::IndexMap;
use log::debug;

use super::{EntityShape, TableBinding};
use crate::core::{EntityError, PropertyKind, Result};

/// Shape and table metadata, resolved by shape id.
///
/// Built once and shared (`Rc`) by every entity created from it. There is no
/// process-wide registry; whoever constructs entities passes this in.
#[derive(Debug)]
pub struct ShapeRegistry {
    shapes: IndexMap<String, Rc<EntityShape>>,
    tables: IndexMap<String, Rc<TableBinding>>,
}

impl ShapeRegistry {
    pub fn builder() -> ShapeRegistryBuilder {
        ShapeRegistryBuilder::default()
    }

    pub fn shape(&self, id: &str) -> Result<Rc<EntityShape>> {
        self.shapes
            .get(id)
            .cloned()
            .ok_or_else(|| EntityError::UnknownShape(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.shapes.contains_key(id)
    }

    /// Table bound to the given shape, if any.
    pub fn table_for(&self, shape: &str) -> Option<Rc<TableBinding>> {
        self.tables.get(shape).cloned()
    }
}

#[derive(Debug, Default)]
pub struct ShapeRegistryBuilder {
    shapes: Vec<EntityShape>,
    tables: Vec<TableBinding>,
}

impl ShapeRegistryBuilder {
    pub fn shape(mut self, shape: EntityShape) -> Self {
        self.shapes.push(shape);
        self
    }

    pub fn table(mut self, table: TableBinding) -> Self {
        self.tables.push(table);
        self
    }

    pub fn build(self) -> Result<Rc<ShapeRegistry>> {
        let mut shapes = IndexMap::new();
        for shape in self.shapes {
            let id = shape.id().to_string();
            if shapes.insert(id.clone(), Rc::new(shape)).is_some() {
                return Err(EntityError::Config(format!("Shape '{}' is declared twice", id)));
            }
        }

        for shape in shapes.values() {
            for property in shape.properties() {
                if let PropertyKind::Entity { shape: target } = &property.kind
                    && !shapes.contains_key(target)
                {
                    return Err(EntityError::Config(format!(
                        "Property '{}.{}' references unknown shape '{}'",
                        shape.id(),
                        property.name,
                        target
                    )));
                }
            }
        }

        let mut tables = IndexMap::new();
        for table in self.tables {
            validate_table(&shapes, &table)?;
            let shape = table.shape.clone();
            if tables.insert(shape.clone(), Rc::new(table)).is_some() {
                return Err(EntityError::Config(format!(
                    "Shape '{}' is bound to more than one table",
                    shape
                )));
            }
        }

        debug!(
            "entity registry built with {} shapes and {} tables",
            shapes.len(),
            tables.len()
        );

        Ok(Rc::new(ShapeRegistry { shapes, tables }))
    }
}

fn validate_table(shapes: &IndexMap<String, Rc<EntityShape>>, table: &TableBinding) -> Result<()> {
    let shape = shapes
        .get(&table.shape)
        .ok_or_else(|| EntityError::UnknownShape(table.shape.clone()))?;

    if table.primary_key_columns().next().is_none() {
        return Err(EntityError::Config(format!(
            "Table '{}' must declare at least one primary key column",
            table.table
        )));
    }

    for binding in table.columns() {
        let property = shape.get_property(&binding.property).ok_or_else(|| {
            EntityError::UnknownProperty(binding.property.clone(), shape.id().to_string())
        })?;

        if let Some(key_property) = &binding.references {
            let PropertyKind::Entity { shape: target } = &property.kind else {
                return Err(EntityError::Config(format!(
                    "Column '{}.{}' references a key but property '{}' is not an entity",
                    table.table, binding.column, binding.property
                )));
            };
            // target presence was checked with the shapes above
            if let Some(target) = shapes.get(target)
                && !target.has_property(key_property)
            {
                return Err(EntityError::UnknownProperty(
                    key_property.clone(),
                    target.id().to_string(),
                ));
            }
        }
    }

    Ok(())
}
