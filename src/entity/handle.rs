use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::rc::{Rc, Weak};

use super::{ChangeReconciler, CopyEngine, PropertyStore, ValueBox};
use crate::core::{EntityError, PropertyKind, PropertyMap, Result, Row, Value};
use crate::database::Database;
use crate::schema::{EntityShape, ShapeRegistry, TableBinding};

pub(crate) struct EntityState {
    pub(crate) registry: Rc<ShapeRegistry>,
    pub(crate) shape: Rc<EntityShape>,
    pub(crate) store: PropertyStore,
    pub(crate) database: Option<Rc<dyn Database>>,
    pub(crate) table: Option<Rc<TableBinding>>,
    pub(crate) parent: Option<Weak<RefCell<EntityState>>>,
}

/// Shared handle to one entity instance.
///
/// Cloning the handle aliases the entity; use [`EntityHandle::copy`] for an
/// independent duplicate. Handles are single-threaded (`!Send`).
#[derive(Clone)]
pub struct EntityHandle {
    state: Rc<RefCell<EntityState>>,
}

impl EntityHandle {
    /// Creates a detached, empty entity of the given shape.
    pub fn new(registry: &Rc<ShapeRegistry>, shape: &str) -> Result<Self> {
        let shape = registry.shape(shape)?;
        Ok(Self::from_parts(registry.clone(), shape, None, None, None))
    }

    /// Creates an empty entity bound to `database` and the shape's table.
    pub fn attached(
        registry: &Rc<ShapeRegistry>,
        shape: &str,
        database: Rc<dyn Database>,
    ) -> Result<Self> {
        let table = registry.table_for(shape).ok_or_else(|| {
            EntityError::Config(format!("Shape '{}' is not bound to a table", shape))
        })?;
        let shape = registry.shape(shape)?;
        Ok(Self::from_parts(
            registry.clone(),
            shape,
            Some(database),
            Some(table),
            None,
        ))
    }

    /// Materializes a loaded row.
    ///
    /// Every bound column present in `row` is written with force semantics,
    /// so primary keys populate even though they are guarded. The resulting
    /// entity has no pending changes.
    pub fn from_row(
        registry: &Rc<ShapeRegistry>,
        shape: &str,
        database: Rc<dyn Database>,
        row: &Row,
    ) -> Result<Self> {
        let entity = Self::attached(registry, shape, database)?;
        entity.populate(row)?;
        Ok(entity)
    }

    pub(crate) fn from_parts(
        registry: Rc<ShapeRegistry>,
        shape: Rc<EntityShape>,
        database: Option<Rc<dyn Database>>,
        table: Option<Rc<TableBinding>>,
        parent: Option<Weak<RefCell<EntityState>>>,
    ) -> Self {
        let store = table
            .as_ref()
            .map(|table| PropertyStore::with_primary_keys(table.primary_key_properties()))
            .unwrap_or_default();

        Self {
            state: Rc::new(RefCell::new(EntityState {
                registry,
                shape,
                store,
                database,
                table,
                parent,
            })),
        }
    }

    fn populate(&self, row: &Row) -> Result<()> {
        let shape = self.shape();
        let registry = self.registry();
        let table = self
            .table()
            .ok_or_else(|| EntityError::DetachedEntity(format!("{} has no table", shape.id())))?;

        for binding in table.columns() {
            let Some(raw) = row.get(&binding.column) else {
                continue;
            };
            let property = shape.get_property(&binding.property).ok_or_else(|| {
                EntityError::UnknownProperty(binding.property.clone(), shape.id().to_string())
            })?;

            let value = match (&binding.references, &property.kind) {
                (Some(key_property), PropertyKind::Entity { shape: target }) if !raw.is_null() => {
                    let child = EntityHandle::new(&registry, target)?;
                    child.write_forced(key_property, raw.clone())?;
                    child.clear_changes();
                    child.set_parent(Some(self));
                    Value::Entity(child)
                }
                _ if raw.is_null() => Value::Null,
                _ => ValueBox::unbox_value(property, raw.clone())?,
            };

            self.state_mut().store.set(&binding.property, value, true)?;
        }

        self.clear_changes();
        Ok(())
    }

    pub(crate) fn state(&self) -> Ref<'_, EntityState> {
        self.state.borrow()
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, EntityState> {
        self.state.borrow_mut()
    }

    pub fn shape(&self) -> Rc<EntityShape> {
        self.state().shape.clone()
    }

    pub fn shape_id(&self) -> String {
        self.state().shape.id().to_string()
    }

    pub fn registry(&self) -> Rc<ShapeRegistry> {
        self.state().registry.clone()
    }

    pub fn database(&self) -> Option<Rc<dyn Database>> {
        self.state().database.clone()
    }

    pub fn table(&self) -> Option<Rc<TableBinding>> {
        self.state().table.clone()
    }

    pub fn is_attached(&self) -> bool {
        let state = self.state();
        state.database.is_some() && state.table.is_some()
    }

    pub(crate) fn bind(&self, database: Rc<dyn Database>, table: Rc<TableBinding>) {
        let mut state = self.state_mut();
        state.store.set_primary_keys(table.primary_key_properties());
        state.database = Some(database);
        state.table = Some(table);
    }

    pub fn parent(&self) -> Option<EntityHandle> {
        self.state()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|state| EntityHandle { state })
    }

    pub fn set_parent(&self, parent: Option<&EntityHandle>) {
        self.state_mut().parent = parent.map(|parent| Rc::downgrade(&parent.state));
    }

    pub fn is_child_of(&self, parent: &EntityHandle) -> bool {
        self.state()
            .parent
            .as_ref()
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Rc::as_ptr(&parent.state)))
    }

    pub fn ptr_eq(&self, other: &EntityHandle) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Raw stored value, without unboxing or default synthesis.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.state().store.get(name).cloned()
    }

    /// Raw store write. Subject to primary-key immutability.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.state_mut().store.set(name, value.into(), false)
    }

    pub(crate) fn write_forced(&self, name: &str, value: Value) -> Result<()> {
        let value = self.stored_value(name, value)?;
        self.state_mut().store.set(name, value, true)
    }

    /// `value` in the stored representation of property `name`.
    pub(crate) fn stored_value(&self, name: &str, value: Value) -> Result<Value> {
        match self.shape().get_property(name) {
            Some(property) if !value.is_null() => ValueBox::unbox_value(property, value),
            _ => Ok(value),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.state().store.has(name)
    }

    /// Copy of the current values, in insertion order.
    pub fn properties(&self) -> PropertyMap {
        self.state().store.snapshot().clone()
    }

    pub fn changed_properties(&self) -> Vec<String> {
        self.state().store.changed().iter().cloned().collect()
    }

    pub fn is_changed(&self, name: &str) -> bool {
        self.state().store.is_changed(name)
    }

    pub fn has_changes(&self) -> bool {
        self.state().store.has_changes()
    }

    pub(crate) fn clear_changes(&self) {
        self.state_mut().store.clear_changes();
    }

    /// Getter semantics of a declared property.
    ///
    /// An absent or null value of a non-nullable property reads as the kind's
    /// default. Defaults of non-shareable kinds are cached in the store,
    /// unmarked, so the next read returns the same instance.
    pub fn read_property(&self, name: &str) -> Result<Value> {
        let shape = self.shape();
        let property = shape
            .get_property(name)
            .ok_or_else(|| EntityError::UnknownProperty(name.to_string(), shape.id().to_string()))?;

        let stored = self.get(name);
        match stored {
            Some(value) if !value.is_null() => return ValueBox::unbox_value(property, value),
            _ if property.nullable => return Ok(Value::Null),
            _ => {}
        }

        let value = ValueBox::synthesize_default(property, &self.registry())?;
        if let Value::Entity(child) = &value {
            child.set_parent(Some(self));
        }
        if !ValueBox::is_shareable_default(&property.kind) {
            self.state_mut().store.cache(name, value.clone());
        }
        Ok(value)
    }

    /// Setter semantics of a declared property.
    pub fn write_property(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let shape = self.shape();
        let property = shape
            .get_property(name)
            .ok_or_else(|| EntityError::UnknownProperty(name.to_string(), shape.id().to_string()))?;
        let boxed = ValueBox::box_value(property, value.into())?;
        self.state_mut().store.set(name, boxed, false)
    }

    pub fn flush_changes(&self) -> Result<usize> {
        ChangeReconciler::flush_changes(self)
    }

    pub fn discard_changes(&self) {
        ChangeReconciler::discard_changes(self)
    }

    pub fn delete(&self) -> Result<usize> {
        ChangeReconciler::delete(self)
    }

    pub fn insert(&self, database: Rc<dyn Database>) -> Result<usize> {
        ChangeReconciler::insert(self, database)
    }

    pub fn copy(&self) -> Result<EntityHandle> {
        CopyEngine::copy(self)
    }

    /// Order-independent hash over shape and values, consistent with `==`.
    pub fn hash_code(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl PartialEq for EntityHandle {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let a = self.state();
        let b = other.state();
        a.shape.id() == b.shape.id() && a.store.snapshot() == b.store.snapshot()
    }
}

impl Eq for EntityHandle {}

impl Hash for EntityHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let entity = self.state();
        entity.shape.id().hash(state);

        // map equality ignores order, so entries are combined commutatively
        let values = entity
            .store
            .iter()
            .map(|entry| {
                let mut hasher = DefaultHasher::new();
                entry.hash(&mut hasher);
                hasher.finish()
            })
            .fold(0u64, u64::wrapping_add);
        values.hash(state);
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        write!(f, "{}{{", state.shape.simple_name())?;
        for (index, (name, value)) in state.store.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("EntityHandle")
            .field("shape", &state.shape.id())
            .field("values", state.store.snapshot())
            .field("changed", state.store.changed())
            .field("attached", &state.database.is_some())
            .finish()
    }
}
