pub mod error;
pub mod types;
pub mod value;

pub use error::{EntityError, Result};
pub use types::{PropertyDescriptor, PropertyMap, Row};
pub use value::{ObjectRef, OpaqueRef, PropertyKind, Value};
