// ============================================================================
// memorm Library
// ============================================================================

pub mod core;
pub mod database;
pub mod entity;
pub mod schema;
mod macros;

// Re-export main types for convenience
pub use core::{EntityError, PropertyKind, Result, Row, Value};
pub use database::{Database, InMemoryDatabase};
pub use entity::{ChangeReconciler, CopyEngine, EntityHandle, Invocation, PropertyValue};
pub use schema::{ColumnBinding, EntityShape, ShapeRegistry, TableBinding};

#[doc(hidden)]
pub use paste;
