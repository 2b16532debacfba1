use std::rc::Rc;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::EntityHandle;
use crate::core::{EntityError, ObjectRef, PropertyDescriptor, PropertyKind, Result, Value};
use crate::schema::ShapeRegistry;

/// Conversions between what accessors hand in/out and what the property
/// store keeps, plus zero-value synthesis for unset non-null properties.
pub struct ValueBox;

impl ValueBox {
    /// Zero value for a non-nullable property that has no stored value.
    ///
    /// Nested entity kinds yield a fresh, detached, empty entity.
    pub fn synthesize_default(
        property: &PropertyDescriptor,
        registry: &Rc<ShapeRegistry>,
    ) -> Result<Value> {
        let fail = |reason: String| EntityError::DefaultSynthesis {
            property: property.name.clone(),
            kind: property.kind.to_string(),
            reason,
        };

        match &property.kind {
            PropertyKind::Boolean => Ok(Value::Boolean(false)),
            PropertyKind::Char => Ok(Value::Char('\0')),
            PropertyKind::Byte => Ok(Value::Byte(0)),
            PropertyKind::Short => Ok(Value::Short(0)),
            PropertyKind::Integer => Ok(Value::Integer(0)),
            PropertyKind::Long => Ok(Value::Long(0)),
            PropertyKind::Float => Ok(Value::Float(0.0)),
            PropertyKind::Double => Ok(Value::Double(0.0)),
            PropertyKind::Text => Ok(Value::Text(String::new())),
            PropertyKind::Enum { name, constants } => constants
                .first()
                .map(|constant| Value::Enum(constant.clone()))
                .ok_or_else(|| fail(format!("enum {} declares no constants", name))),
            PropertyKind::Bytes => Ok(Value::Bytes(Vec::new())),
            PropertyKind::Object => Ok(Value::Object(ObjectRef::empty())),
            PropertyKind::Entity { shape } => EntityHandle::new(registry, shape)
                .map(Value::Entity)
                .map_err(|err| fail(err.to_string())),
            kind @ (PropertyKind::Date
            | PropertyKind::Timestamp
            | PropertyKind::Uuid
            | PropertyKind::Opaque { .. }) => {
                Err(fail(format!("type {} has no zero value", kind)))
            }
        }
    }

    /// Whether a synthesized default can be handed out without caching.
    ///
    /// Value-semantics kinds always resynthesize to an indistinguishable
    /// value. Everything else must be cached so repeated reads observe the
    /// same instance.
    pub fn is_shareable_default(kind: &PropertyKind) -> bool {
        kind.is_primitive() || matches!(kind, PropertyKind::Text | PropertyKind::Enum { .. })
    }

    /// Accessor value to stored representation.
    pub fn box_value(property: &PropertyDescriptor, value: Value) -> Result<Value> {
        let value = if value.is_null() {
            value
        } else {
            Self::convert(property, value)?
        };
        property.validate(&value)?;
        Ok(value)
    }

    /// Stored representation to accessor value.
    ///
    /// Unboxing null into a non-nullable property is a caller bug: readers
    /// synthesize a default before getting here.
    pub fn unbox_value(property: &PropertyDescriptor, value: Value) -> Result<Value> {
        if value.is_null() && !property.nullable {
            return Err(EntityError::NullValue(format!(
                "Cannot unbox null into non-nullable property '{}' of type {}",
                property.name, property.kind
            )));
        }
        Self::convert(property, value)
    }

    fn convert(property: &PropertyDescriptor, value: Value) -> Result<Value> {
        let type_name = value.type_name();
        Self::coerce(&property.kind, value).ok_or_else(|| {
            EntityError::TypeMismatch(format!(
                "Property '{}' expects type {}, got {}",
                property.name, property.kind, type_name
            ))
        })
    }

    /// Converts `value` into `kind`'s representation, or `None` when no
    /// sensible conversion exists or the value does not fit. `Null` passes
    /// through unchanged.
    pub fn coerce(kind: &PropertyKind, value: Value) -> Option<Value> {
        if kind.is_compatible(&value) {
            return Some(value);
        }

        match (kind, value) {
            (PropertyKind::Byte, v) => v.as_i64().and_then(|i| i8::try_from(i).ok()).map(Value::Byte),
            (PropertyKind::Short, v) => v.as_i64().and_then(|i| i16::try_from(i).ok()).map(Value::Short),
            (PropertyKind::Integer, v) => {
                v.as_i64().and_then(|i| i32::try_from(i).ok()).map(Value::Integer)
            }
            (PropertyKind::Long, v) => v.as_i64().map(Value::Long),
            (PropertyKind::Float, v @ (Value::Double(_) | Value::Byte(_) | Value::Short(_))) => {
                v.as_f64().map(|f| Value::Float(f as f32))
            }
            (PropertyKind::Double, v @ (Value::Float(_) | Value::Byte(_) | Value::Short(_) | Value::Integer(_) | Value::Long(_))) => {
                v.as_f64().map(Value::Double)
            }
            (PropertyKind::Char, Value::Text(s)) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Value::Char(c)),
                    _ => None,
                }
            }
            (PropertyKind::Text, Value::Char(c)) => Some(Value::Text(c.to_string())),
            (PropertyKind::Enum { constants, .. }, Value::Text(s)) => {
                constants.contains(&s).then_some(Value::Enum(s))
            }
            (PropertyKind::Date, Value::Text(s)) => {
                NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok().map(Value::Date)
            }
            (PropertyKind::Date, Value::Timestamp(t)) => Some(Value::Date(t.date_naive())),
            (PropertyKind::Timestamp, Value::Text(s)) => DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|t| Value::Timestamp(t.with_timezone(&Utc))),
            (PropertyKind::Uuid, Value::Text(s)) => Uuid::parse_str(&s).ok().map(Value::Uuid),
            (PropertyKind::Object, Value::Text(s)) => serde_json::from_str(&s)
                .ok()
                .map(|json| Value::Object(ObjectRef::new(json))),
            _ => None,
        }
    }
}
