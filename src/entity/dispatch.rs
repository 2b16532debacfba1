use tracing::trace;

use super::EntityHandle;
use crate::core::{EntityError, PropertyMap, Result, Value};
use crate::schema::MethodBody;

/// Result of a dynamically dispatched call.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// The method returns nothing (setters, `discard_changes`).
    Unit,
    Value(Value),
    Properties(PropertyMap),
    /// Rows affected by `flush_changes` or `delete`.
    Affected(usize),
}

impl EntityHandle {
    /// Generic dispatch point for every method an entity answers to.
    ///
    /// Routing order: identity methods, lifecycle methods, declared property
    /// accessors (`<prop>` and `set_<prop>`), then concrete methods declared
    /// on the shape. A name that matches but with the wrong number of
    /// arguments falls through to the next tier.
    pub fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Invocation> {
        trace!(shape = %self.shape_id(), method, arity = args.len(), "entity.invoke");

        if let Some(outcome) = self.invoke_identity(method, &args) {
            return Ok(outcome);
        }
        if let Some(outcome) = self.invoke_lifecycle(method, &args) {
            return outcome;
        }
        if let Some(outcome) = self.invoke_accessor(method, &args) {
            return outcome;
        }

        let shape = self.shape();
        match shape.get_method(method) {
            Some(MethodBody::Default(body)) => body(self, &args).map(Invocation::Value),
            Some(MethodBody::Abstract) => Err(EntityError::UnsupportedInvocation(format!(
                "{}.{} is abstract and not bound to a property",
                shape.id(),
                method
            ))),
            None => Err(EntityError::UnsupportedInvocation(format!(
                "{}.{} with {} argument(s)",
                shape.id(),
                method,
                args.len()
            ))),
        }
    }

    fn invoke_identity(&self, method: &str, args: &[Value]) -> Option<Invocation> {
        let value = match (method, args) {
            ("equals", [other]) => Value::Boolean(match other {
                Value::Entity(other) => self == other,
                _ => false,
            }),
            ("hash_code", []) => Value::Long(self.hash_code() as i64),
            ("to_string", []) => Value::Text(self.to_string()),
            _ => return None,
        };
        Some(Invocation::Value(value))
    }

    fn invoke_lifecycle(&self, method: &str, args: &[Value]) -> Option<Result<Invocation>> {
        let outcome = match (method, args) {
            ("entity_class", []) => Ok(Invocation::Value(Value::Text(self.shape_id()))),
            ("properties", []) => Ok(Invocation::Properties(self.properties())),
            ("flush_changes", []) => self.flush_changes().map(Invocation::Affected),
            ("discard_changes", []) => {
                self.discard_changes();
                Ok(Invocation::Unit)
            }
            ("delete", []) => self.delete().map(Invocation::Affected),
            ("get", [name]) => property_name(name)
                .map(|name| Invocation::Value(self.get(name).unwrap_or(Value::Null))),
            ("set", [name, value]) => property_name(name)
                .and_then(|name| self.set(name, value.clone()))
                .map(|_| Invocation::Unit),
            ("copy", []) => self.copy().map(|copy| Invocation::Value(Value::Entity(copy))),
            _ => return None,
        };
        Some(outcome)
    }

    fn invoke_accessor(&self, method: &str, args: &[Value]) -> Option<Result<Invocation>> {
        let shape = self.shape();
        match args {
            [] if shape.has_property(method) => {
                Some(self.read_property(method).map(Invocation::Value))
            }
            [value] => {
                let name = method.strip_prefix("set_")?;
                if !shape.has_property(name) {
                    return None;
                }
                Some(
                    self.write_property(name, value.clone())
                        .map(|_| Invocation::Unit),
                )
            }
            _ => None,
        }
    }
}

fn property_name(value: &Value) -> Result<&str> {
    value.as_str().ok_or_else(|| {
        EntityError::TypeMismatch(format!(
            "Property name must be a String, got {}",
            value.type_name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::core::PropertyKind;
    use crate::schema::{EntityShape, ShapeRegistry};

    fn registry() -> Rc<ShapeRegistry> {
        ShapeRegistry::builder()
            .shape(
                EntityShape::new("hr::Employee")
                    .required("id", PropertyKind::Integer)
                    .required("name", PropertyKind::Text)
                    .required("salary", PropertyKind::Long)
                    .abstract_method("promote")
                    .method("greeting", |entity, args| {
                        let name = entity.read_property("name")?;
                        let suffix = args.first().map(Value::to_string).unwrap_or_default();
                        Ok(Value::Text(format!("hello {}{}", name, suffix)))
                    }),
            )
            .build()
            .unwrap()
    }

    fn employee() -> EntityHandle {
        EntityHandle::new(&registry(), "hr::Employee").unwrap()
    }

    #[test]
    fn test_accessors_route_through_store() {
        let entity = employee();

        assert_eq!(
            entity.invoke("salary", vec![]).unwrap(),
            Invocation::Value(Value::Long(0))
        );
        assert_eq!(
            entity.invoke("set_salary", vec![Value::Integer(100)]).unwrap(),
            Invocation::Unit
        );
        assert_eq!(entity.get("salary"), Some(Value::Long(100)));
        assert!(entity.is_changed("salary"));
    }

    #[test]
    fn test_identity_methods() {
        let entity = employee();
        entity.set("name", "vince").unwrap();

        assert_eq!(
            entity.invoke("to_string", vec![]).unwrap(),
            Invocation::Value(Value::from("Employee{name=vince}"))
        );
        assert_eq!(
            entity
                .invoke("equals", vec![Value::Entity(entity.clone())])
                .unwrap(),
            Invocation::Value(Value::Boolean(true))
        );
        assert_eq!(
            entity.invoke("equals", vec![Value::from("vince")]).unwrap(),
            Invocation::Value(Value::Boolean(false))
        );
        assert_eq!(
            entity.invoke("hash_code", vec![]).unwrap(),
            Invocation::Value(Value::Long(entity.hash_code() as i64))
        );
    }

    #[test]
    fn test_lifecycle_methods() {
        let entity = employee();

        assert_eq!(
            entity.invoke("entity_class", vec![]).unwrap(),
            Invocation::Value(Value::from("hr::Employee"))
        );
        entity
            .invoke("set", vec![Value::from("name"), Value::from("tom")])
            .unwrap();
        assert_eq!(
            entity.invoke("get", vec![Value::from("name")]).unwrap(),
            Invocation::Value(Value::from("tom"))
        );
        assert_eq!(
            entity.invoke("get", vec![Value::from("missing")]).unwrap(),
            Invocation::Value(Value::Null)
        );

        let Invocation::Properties(values) = entity.invoke("properties", vec![]).unwrap() else {
            panic!("expected properties");
        };
        assert_eq!(values.get("name"), Some(&Value::from("tom")));

        entity.invoke("discard_changes", vec![]).unwrap();
        assert!(!entity.has_changes());

        let Invocation::Value(Value::Entity(copy)) = entity.invoke("copy", vec![]).unwrap() else {
            panic!("expected a copied entity");
        };
        assert_eq!(copy, entity);
        assert!(!copy.ptr_eq(&entity));
    }

    #[test]
    fn test_detached_flush_is_rejected_only_with_changes() {
        let entity = employee();
        assert_eq!(
            entity.invoke("flush_changes", vec![]).unwrap(),
            Invocation::Affected(0)
        );
        assert!(matches!(
            entity.invoke("delete", vec![]),
            Err(EntityError::DetachedEntity(_))
        ));
    }

    #[test]
    fn test_default_method_receives_handle_and_args() {
        let entity = employee();
        entity.write_property("name", "jerry").unwrap();

        assert_eq!(
            entity.invoke("greeting", vec![Value::from("!")]).unwrap(),
            Invocation::Value(Value::from("hello jerry!"))
        );
    }

    #[test]
    fn test_unsupported_invocations() {
        let entity = employee();

        for (method, args) in [
            ("promote", vec![]),
            ("fire", vec![]),
            ("salary", vec![Value::Long(1)]),
            ("set_salary", vec![]),
            ("set_bonus", vec![Value::Long(1)]),
        ] {
            match entity.invoke(method, args) {
                Err(EntityError::UnsupportedInvocation(message)) => {
                    assert!(message.contains(method), "{message}")
                }
                other => panic!("{method}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_set_rejects_non_text_name() {
        let entity = employee();
        assert!(matches!(
            entity.invoke("set", vec![Value::Long(1), Value::Long(2)]),
            Err(EntityError::TypeMismatch(_))
        ));
    }
}
