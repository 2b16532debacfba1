//! Storage collaborator contract.
//!
//! The entity core never renders SQL. It hands fully-resolved statements to a
//! [`Database`] and propagates whatever that returns.

pub mod memory;

use crate::core::{EntityError, Result, Value};

pub use memory::InMemoryDatabase;

/// `UPDATE table SET assignments WHERE keys`
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub keys: Vec<(String, Value)>,
    pub assignments: Vec<(String, Value)>,
}

impl UpdateStatement {
    pub fn assigned_columns(&self) -> Vec<&str> {
        self.assignments.iter().map(|(column, _)| column.as_str()).collect()
    }
}

/// `DELETE FROM table WHERE keys`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub keys: Vec<(String, Value)>,
}

/// `INSERT INTO table (columns) VALUES (...)`
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub assignments: Vec<(String, Value)>,
    /// Key columns left for storage to generate.
    pub generated: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOutcome {
    pub affected: usize,
    pub generated_keys: Vec<(String, Value)>,
}

/// Any statement, as recorded by collaborators that keep a log.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

impl Statement {
    pub fn table(&self) -> &str {
        match self {
            Statement::Insert(insert) => &insert.table,
            Statement::Update(update) => &update.table,
            Statement::Delete(delete) => &delete.table,
        }
    }
}

/// Database an entity was loaded from or inserted into.
///
/// Calls are synchronous and may block for the duration of the round trip.
/// Implementations own retries, timeouts and cancellation.
pub trait Database {
    /// Returns the number of affected rows.
    fn execute_update(&self, statement: &UpdateStatement) -> Result<usize>;

    /// Returns the number of affected rows.
    fn execute_delete(&self, statement: &DeleteStatement) -> Result<usize>;

    fn execute_insert(&self, statement: &InsertStatement) -> Result<InsertOutcome> {
        Err(EntityError::UnsupportedOperation(format!(
            "insert into '{}' is not supported by this database",
            statement.table
        )))
    }
}
