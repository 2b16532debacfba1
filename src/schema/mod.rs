//! Entity shape and table binding metadata.

pub mod config;
pub mod registry;
pub mod shape;
pub mod table;

pub use config::{RegistryConfig, ShapeConfig};
pub use registry::{ShapeRegistry, ShapeRegistryBuilder};
pub use shape::{DefaultMethod, EntityShape, MethodBody};
pub use table::{ColumnBinding, TableBinding};
