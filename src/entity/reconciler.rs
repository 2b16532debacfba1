use std::rc::Rc;

use tracing::{Level, event, info_span};

use super::EntityHandle;
use crate::core::{EntityError, Result, Value};
use crate::database::{Database, DeleteStatement, InsertStatement, UpdateStatement};
use crate::schema::{ColumnBinding, TableBinding};

/// Turns an entity's changed set into statements and runs them against the
/// bound database.
///
/// Nothing is partially applied: a statement is built in full before it is
/// executed, and the changed set is cleared only after the database reports
/// success.
pub struct ChangeReconciler;

impl ChangeReconciler {
    /// The update a flush would send right now, if any.
    pub fn pending_update(entity: &EntityHandle) -> Result<Option<UpdateStatement>> {
        // owned children only count once there is somewhere to flush to
        if !entity.has_changes() && !(entity.is_attached() && owns_changed_child(entity)) {
            return Ok(None);
        }

        let (_, table) = bound(entity, "flush")?;
        let keys = key_values(entity, &table)?;

        let mut assignments = Vec::new();
        for binding in table.columns().iter().filter(|binding| !binding.primary_key) {
            if !column_changed(entity, binding) {
                continue;
            }
            let value = column_value(entity, binding)?.unwrap_or(Value::Null);
            assignments.push((binding.column.clone(), value));
        }

        if assignments.is_empty() {
            return Ok(None);
        }

        Ok(Some(UpdateStatement {
            table: table.name().to_string(),
            keys,
            assignments,
        }))
    }

    /// Sends changed non-key columns to the database.
    ///
    /// Returns the affected row count, or `0` without touching the database
    /// when there is nothing to send.
    pub fn flush_changes(entity: &EntityHandle) -> Result<usize> {
        let Some(statement) = Self::pending_update(entity)? else {
            return Ok(0);
        };
        let (database, _) = bound(entity, "flush")?;

        let span = info_span!(
            "entity.flush",
            table = %statement.table,
            columns = statement.assignments.len()
        );
        let _enter = span.enter();

        let affected = match database.execute_update(&statement) {
            Ok(affected) => affected,
            Err(err) => {
                event!(Level::ERROR, error = %err, "entity flush failed");
                return Err(err);
            }
        };

        Self::discard_changes(entity);
        event!(Level::DEBUG, affected, "entity flushed");
        Ok(affected)
    }

    /// Forgets pending changes of the entity and of the nested entities it
    /// owns. Values keep their mutated state.
    pub fn discard_changes(entity: &EntityHandle) {
        entity.clear_changes();
        for value in entity.properties().values() {
            if let Value::Entity(child) = value
                && child.is_child_of(entity)
            {
                Self::discard_changes(child);
            }
        }
    }

    pub fn delete(entity: &EntityHandle) -> Result<usize> {
        let (database, table) = bound(entity, "delete")?;
        let statement = DeleteStatement {
            table: table.name().to_string(),
            keys: key_values(entity, &table)?,
        };

        let span = info_span!("entity.delete", table = %statement.table);
        let _enter = span.enter();

        let affected = match database.execute_delete(&statement) {
            Ok(affected) => affected,
            Err(err) => {
                event!(Level::ERROR, error = %err, "entity delete failed");
                return Err(err);
            }
        };
        event!(Level::DEBUG, affected, "entity deleted");
        Ok(affected)
    }

    /// Inserts the entity into the table bound to its shape and attaches it
    /// to `database`.
    ///
    /// Absent columns are left out of the statement. Generated key columns
    /// without a value are filled in by the database and written back with
    /// force semantics. Every other key column must hold a value.
    pub fn insert(entity: &EntityHandle, database: Rc<dyn Database>) -> Result<usize> {
        let shape = entity.shape_id();
        let table = entity.registry().table_for(&shape).ok_or_else(|| {
            EntityError::Config(format!("Shape '{}' is not bound to a table", shape))
        })?;

        let mut assignments = Vec::new();
        let mut generated = Vec::new();
        for binding in table.columns() {
            match column_value(entity, binding)? {
                Some(value) if !value.is_null() => assignments.push((binding.column.clone(), value)),
                _ if binding.generated => generated.push(binding.column.clone()),
                _ if binding.primary_key => {
                    return Err(EntityError::MissingKey {
                        table: table.name().to_string(),
                        column: binding.column.clone(),
                    });
                }
                Some(null) => assignments.push((binding.column.clone(), null)),
                None => {}
            }
        }

        let statement = InsertStatement {
            table: table.name().to_string(),
            assignments,
            generated,
        };

        let span = info_span!(
            "entity.insert",
            table = %statement.table,
            columns = statement.assignments.len()
        );
        let _enter = span.enter();

        let outcome = match database.execute_insert(&statement) {
            Ok(outcome) => outcome,
            Err(err) => {
                event!(Level::ERROR, error = %err, "entity insert failed");
                return Err(err);
            }
        };

        let generated_keys = outcome
            .generated_keys
            .into_iter()
            .map(|(column, value)| {
                let binding = table.find_column(&column).ok_or_else(|| {
                    EntityError::Storage(format!(
                        "Generated column '{}' is not bound in table '{}'",
                        column,
                        table.name()
                    ))
                })?;
                let value = entity.stored_value(&binding.property, value)?;
                Ok((binding.property.clone(), value))
            })
            .collect::<Result<Vec<_>>>()?;

        entity.bind(database, table.clone());
        for (property, value) in generated_keys {
            entity.state_mut().store.set(&property, value, true)?;
        }
        Self::discard_changes(entity);

        event!(Level::DEBUG, affected = outcome.affected, "entity inserted");
        Ok(outcome.affected)
    }
}

fn bound(entity: &EntityHandle, action: &str) -> Result<(Rc<dyn Database>, Rc<TableBinding>)> {
    match (entity.database(), entity.table()) {
        (Some(database), Some(table)) => Ok((database, table)),
        _ => Err(EntityError::DetachedEntity(format!(
            "cannot {} {}, it is not bound to a database",
            action,
            entity.shape_id()
        ))),
    }
}

fn key_values(entity: &EntityHandle, table: &TableBinding) -> Result<Vec<(String, Value)>> {
    table
        .primary_key_columns()
        .map(|binding| match column_value(entity, binding)? {
            Some(value) if !value.is_null() => Ok((binding.column.clone(), value)),
            _ => Err(EntityError::MissingKey {
                table: table.name().to_string(),
                column: binding.column.clone(),
            }),
        })
        .collect()
}

/// Value a column takes from the entity, `None` when the property is absent.
///
/// A reference column stores the referenced key of the nested entity.
fn column_value(entity: &EntityHandle, binding: &ColumnBinding) -> Result<Option<Value>> {
    let Some(value) = entity.get(&binding.property) else {
        return Ok(None);
    };

    match (value, &binding.references) {
        (Value::Entity(child), Some(key)) => Ok(Some(child.get(key).unwrap_or(Value::Null))),
        (Value::Entity(_), None) => Err(EntityError::TypeMismatch(format!(
            "Column '{}' holds an entity but declares no referenced key",
            binding.column
        ))),
        (value, _) => Ok(Some(value)),
    }
}

fn owns_changed_child(entity: &EntityHandle) -> bool {
    entity.properties().values().any(|value| match value {
        Value::Entity(child) => child.is_child_of(entity) && child.has_changes(),
        _ => false,
    })
}

/// A reference column is also dirty when the owned nested entity changed the
/// referenced key.
fn column_changed(entity: &EntityHandle, binding: &ColumnBinding) -> bool {
    if entity.is_changed(&binding.property) {
        return true;
    }
    match (entity.get(&binding.property), &binding.references) {
        (Some(Value::Entity(child)), Some(key)) => child.is_child_of(entity) && child.is_changed(key),
        _ => false,
    }
}
