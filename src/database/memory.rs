use std::collections::HashMap;
use std::rc::Rc;
use std::sync::RwLock;

use log::{debug, warn};

use super::{
    Database, DeleteStatement, InsertOutcome, InsertStatement, Statement, UpdateStatement,
};
use crate::core::{EntityError, Result, Row, Value};
use crate::entity::EntityHandle;
use crate::schema::ShapeRegistry;

/// Table-of-rows database kept in memory.
///
/// Every executed statement is appended to a log, which makes this the
/// collaborator of choice for asserting exactly what a flush sent.
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    statements: RwLock<Vec<Statement>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&self, name: &str) -> Result<()> {
        let mut tables = self.tables.write()?;
        if tables.contains_key(name) {
            return Err(EntityError::Storage(format!("Table '{}' already exists", name)));
        }
        tables.insert(name.to_string(), Vec::new());
        Ok(())
    }

    /// Seeds a row without going through the statement log.
    pub fn insert_row(&self, table: &str, row: Row) -> Result<()> {
        let mut tables = self.tables.write()?;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| table_not_found(table))?;
        rows.push(row);
        Ok(())
    }

    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        let tables = self.tables.read()?;
        tables
            .get(table)
            .cloned()
            .ok_or_else(|| table_not_found(table))
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        Ok(self.rows(table)?.len())
    }

    pub fn find(&self, table: &str, keys: &[(&str, Value)]) -> Result<Option<Row>> {
        let tables = self.tables.read()?;
        let rows = tables.get(table).ok_or_else(|| table_not_found(table))?;
        Ok(rows
            .iter()
            .find(|row| {
                keys.iter()
                    .all(|(column, value)| row.get(*column).is_some_and(|v| loosely_equal(v, value)))
            })
            .cloned())
    }

    /// Finds a row of the shape's table and materializes it as an entity
    /// bound to this database.
    pub fn load(
        self: &Rc<Self>,
        registry: &Rc<ShapeRegistry>,
        shape: &str,
        keys: &[(&str, Value)],
    ) -> Result<Option<EntityHandle>> {
        let table = registry.table_for(shape).ok_or_else(|| {
            EntityError::Config(format!("Shape '{}' is not bound to a table", shape))
        })?;
        let Some(row) = self.find(&table.table, keys)? else {
            return Ok(None);
        };
        let database: Rc<dyn Database> = self.clone();
        EntityHandle::from_row(registry, shape, database, &row).map(Some)
    }

    pub fn statements(&self) -> Result<Vec<Statement>> {
        Ok(self.statements.read()?.clone())
    }

    fn record(&self, statement: Statement) -> Result<()> {
        self.statements.write()?.push(statement);
        Ok(())
    }
}

impl Database for InMemoryDatabase {
    fn execute_update(&self, statement: &UpdateStatement) -> Result<usize> {
        let affected = {
            let mut tables = self.tables.write()?;
            let rows = tables
                .get_mut(&statement.table)
                .ok_or_else(|| table_not_found(&statement.table))?;

            let mut affected = 0;
            for row in rows.iter_mut().filter(|row| matches_keys(row, &statement.keys)) {
                for (column, value) in &statement.assignments {
                    row.insert(column.clone(), value.clone());
                }
                affected += 1;
            }
            affected
        };

        if affected == 0 {
            warn!("update on '{}' matched no rows", statement.table);
        }
        self.record(Statement::Update(statement.clone()))?;
        Ok(affected)
    }

    fn execute_delete(&self, statement: &DeleteStatement) -> Result<usize> {
        let affected = {
            let mut tables = self.tables.write()?;
            let rows = tables
                .get_mut(&statement.table)
                .ok_or_else(|| table_not_found(&statement.table))?;
            let before = rows.len();
            rows.retain(|row| !matches_keys(row, &statement.keys));
            before - rows.len()
        };

        debug!("deleted {} rows from '{}'", affected, statement.table);
        self.record(Statement::Delete(statement.clone()))?;
        Ok(affected)
    }

    fn execute_insert(&self, statement: &InsertStatement) -> Result<InsertOutcome> {
        let generated_keys = {
            let mut tables = self.tables.write()?;
            let rows = tables
                .get_mut(&statement.table)
                .ok_or_else(|| table_not_found(&statement.table))?;

            let mut row: Row = statement.assignments.iter().cloned().collect();
            let mut generated_keys = Vec::new();
            for column in &statement.generated {
                if row.get(column).is_some_and(|v| !v.is_null()) {
                    continue;
                }
                let next = rows
                    .iter()
                    .filter_map(|existing| existing.get(column).and_then(Value::as_i64))
                    .max()
                    .unwrap_or(0)
                    + 1;
                row.insert(column.clone(), Value::Long(next));
                generated_keys.push((column.clone(), Value::Long(next)));
            }
            rows.push(row);
            generated_keys
        };

        self.record(Statement::Insert(statement.clone()))?;
        Ok(InsertOutcome {
            affected: 1,
            generated_keys,
        })
    }
}

fn table_not_found(table: &str) -> EntityError {
    EntityError::Storage(format!("Table '{}' not found", table))
}

fn matches_keys(row: &Row, keys: &[(String, Value)]) -> bool {
    keys.iter()
        .all(|(column, value)| row.get(column).is_some_and(|v| loosely_equal(v, value)))
}

/// Integer widths are not significant when matching keys.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}
