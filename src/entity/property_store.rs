use std::collections::BTreeSet;

use indexmap::IndexSet;

use crate::core::{EntityError, PropertyMap, Result, Value};

/// Current property values of one entity and the names changed since the
/// last load or flush.
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    values: PropertyMap,
    changed: IndexSet<String>,
    primary_keys: BTreeSet<String>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store guarding the given primary-key property names.
    pub fn with_primary_keys(primary_keys: BTreeSet<String>) -> Self {
        Self {
            primary_keys,
            ..Self::default()
        }
    }

    pub fn set_primary_keys(&mut self, primary_keys: BTreeSet<String>) {
        self.primary_keys = primary_keys;
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_keys.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Stores `value` and marks `name` changed.
    ///
    /// A primary-key property that already holds a value can only be
    /// overwritten with `force`.
    pub fn set(&mut self, name: &str, value: Value, force: bool) -> Result<()> {
        if !force
            && self.is_primary_key(name)
            && let Some(current) = self.values.get(name)
        {
            return Err(EntityError::PrimaryKeyImmutable {
                property: name.to_string(),
                current: current.to_string(),
            });
        }

        self.values.insert(name.to_string(), value);
        self.changed.insert(name.to_string());
        Ok(())
    }

    /// Stores `value` without touching the changed set.
    pub fn cache(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn snapshot(&self) -> &PropertyMap {
        &self.values
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn changed(&self) -> &IndexSet<String> {
        &self.changed
    }

    pub fn is_changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn mark_changed<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.changed.extend(names);
    }

    pub fn clear_changes(&mut self) {
        self.changed.clear();
    }
}
