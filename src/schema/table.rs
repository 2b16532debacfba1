use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Binds one table column to an entity property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnBinding {
    pub column: String,
    pub property: String,
    #[serde(default)]
    pub primary_key: bool,
    /// Value is assigned by storage on insert when absent.
    #[serde(default)]
    pub generated: bool,
    /// For entity-valued properties: the referenced entity's key property
    /// whose value is stored in this column.
    #[serde(default)]
    pub references: Option<String>,
}

impl ColumnBinding {
    pub fn new(column: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            property: property.into(),
            primary_key: false,
            generated: false,
            references: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    pub fn references(mut self, key_property: impl Into<String>) -> Self {
        self.references = Some(key_property.into());
        self
    }
}

/// Maps an entity shape onto a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBinding {
    pub table: String,
    pub shape: String,
    pub columns: Vec<ColumnBinding>,
}

impl TableBinding {
    pub fn new(table: impl Into<String>, shape: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            shape: shape.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, binding: ColumnBinding) -> Self {
        self.columns.push(binding);
        self
    }

    pub fn bind(self, column: impl Into<String>, property: impl Into<String>) -> Self {
        self.column(ColumnBinding::new(column, property))
    }

    pub fn primary_key(self, column: impl Into<String>, property: impl Into<String>) -> Self {
        self.column(ColumnBinding::new(column, property).primary_key())
    }

    pub fn name(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnBinding] {
        &self.columns
    }

    pub fn find_column(&self, column: &str) -> Option<&ColumnBinding> {
        self.columns.iter().find(|binding| binding.column == column)
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &ColumnBinding> {
        self.columns.iter().filter(|binding| binding.primary_key)
    }

    pub fn primary_key_properties(&self) -> BTreeSet<String> {
        self.primary_key_columns()
            .map(|binding| binding.property.clone())
            .collect()
    }

    pub fn is_primary_key(&self, property: &str) -> bool {
        self.primary_key_columns()
            .any(|binding| binding.property == property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staffs() -> TableBinding {
        TableBinding::new("t_employee", "Staff")
            .column(ColumnBinding::new("id", "id").primary_key().generated())
            .primary_key("department_id", "department_id")
            .bind("name", "name")
            .bind("salary", "salary")
    }

    #[test]
    fn test_compound_primary_key() {
        let table = staffs();
        let keys: Vec<_> = table.primary_key_columns().map(|c| c.column.as_str()).collect();
        assert_eq!(keys, vec!["id", "department_id"]);
        assert!(table.is_primary_key("department_id"));
        assert!(!table.is_primary_key("salary"));
        assert_eq!(table.primary_key_properties().len(), 2);
    }

    #[test]
    fn test_find_column() {
        let table = staffs();
        assert!(table.find_column("id").unwrap().generated);
        assert!(table.find_column("missing").is_none());
    }
}
