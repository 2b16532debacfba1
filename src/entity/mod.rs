//! Entity runtime: the handle and its dispatch, property storage, value
//! boxing, deep copy, change reconciliation and the persisted form.

pub mod accessor;
pub mod copy;
pub mod dispatch;
pub mod handle;
pub mod persisted;
pub mod property_store;
pub mod reconciler;
pub mod value_box;

pub use accessor::PropertyValue;
pub use copy::CopyEngine;
pub use dispatch::Invocation;
pub use handle::EntityHandle;
pub use persisted::{PersistedEntity, PersistedValue};
pub use property_store::PropertyStore;
pub use reconciler::ChangeReconciler;
pub use value_box::ValueBox;
