use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::core::{PropertyDescriptor, PropertyKind, Result, Value};
use crate::entity::EntityHandle;

/// Body of a concrete method declared on a shape.
pub type DefaultMethod = Rc<dyn Fn(&EntityHandle, &[Value]) -> Result<Value>>;

/// A non-property method declared on an entity shape.
#[derive(Clone)]
pub enum MethodBody {
    /// Declared without an implementation and without a property binding.
    Abstract,
    /// Declared with a default implementation that runs against the entity.
    Default(DefaultMethod),
}

impl fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abstract => write!(f, "Abstract"),
            Self::Default(_) => write!(f, "Default(..)"),
        }
    }
}

/// The declared contract of an entity: its abstract properties, in
/// declaration order, plus any extra methods.
#[derive(Debug, Clone)]
pub struct EntityShape {
    id: String,
    properties: IndexMap<String, PropertyDescriptor>,
    methods: IndexMap<String, MethodBody>,
}

impl EntityShape {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }

    pub fn property(mut self, descriptor: PropertyDescriptor) -> Self {
        self.properties.insert(descriptor.name.clone(), descriptor);
        self
    }

    /// Shorthand for a non-nullable property.
    pub fn required(self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.property(PropertyDescriptor::new(name, kind))
    }

    /// Shorthand for a nullable property.
    pub fn optional(self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.property(PropertyDescriptor::new(name, kind).nullable())
    }

    pub fn method<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&EntityHandle, &[Value]) -> Result<Value> + 'static,
    {
        self.methods
            .insert(name.into(), MethodBody::Default(Rc::new(body)));
        self
    }

    pub fn abstract_method(mut self, name: impl Into<String>) -> Self {
        self.methods.insert(name.into(), MethodBody::Abstract);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Unqualified name used when rendering entities, e.g. `Staff` for
    /// `hr::Staff`.
    pub fn simple_name(&self) -> &str {
        self.id
            .rsplit(|c| c == ':' || c == '.')
            .next()
            .unwrap_or(&self.id)
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.values()
    }

    pub fn get_property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn get_method(&self, name: &str) -> Option<&MethodBody> {
        self.methods.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_name_strips_path() {
        assert_eq!(EntityShape::new("hr::Staff").simple_name(), "Staff");
        assert_eq!(EntityShape::new("org.example.Dept").simple_name(), "Dept");
        assert_eq!(EntityShape::new("Staff").simple_name(), "Staff");
    }

    #[test]
    fn test_properties_keep_declaration_order() {
        let shape = EntityShape::new("Staff")
            .required("id", PropertyKind::Integer)
            .required("name", PropertyKind::Text)
            .optional("manager_id", PropertyKind::Integer);

        let names: Vec<_> = shape.properties().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "manager_id"]);
        assert!(shape.get_property("manager_id").unwrap().nullable);
    }

    #[test]
    fn test_methods_are_registered() {
        let shape = EntityShape::new("Staff")
            .abstract_method("promote")
            .method("label", |_, _| Ok(Value::from("staff")));

        assert!(matches!(shape.get_method("promote"), Some(MethodBody::Abstract)));
        assert!(matches!(shape.get_method("label"), Some(MethodBody::Default(_))));
        assert!(shape.get_method("missing").is_none());
    }
}
