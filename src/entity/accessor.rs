use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::core::{EntityError, ObjectRef, PropertyKind, Result, Value};

/// Rust type usable as a typed entity property.
///
/// Maps the type to its declared [`PropertyKind`] and converts to and from
/// the dynamic [`Value`] the property store keeps. `Option<T>` declares a
/// nullable property.
pub trait PropertyValue: Sized {
    fn kind() -> PropertyKind;

    fn nullable() -> bool {
        false
    }

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(expected: &str, value: &Value) -> EntityError {
    EntityError::TypeMismatch(format!("Expected {}, got {}", expected, value.type_name()))
}

macro_rules! scalar_property_value {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl PropertyValue for $ty {
            fn kind() -> PropertyKind {
                PropertyKind::$kind
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch(stringify!($ty), &other)),
                }
            }
        }
    };
}

scalar_property_value!(bool, Boolean, Boolean);
scalar_property_value!(char, Char, Char);
scalar_property_value!(i8, Byte, Byte);
scalar_property_value!(i16, Short, Short);
scalar_property_value!(i32, Integer, Integer);
scalar_property_value!(i64, Long, Long);
scalar_property_value!(f32, Float, Float);
scalar_property_value!(f64, Double, Double);
scalar_property_value!(NaiveDate, Date, Date);
scalar_property_value!(DateTime<Utc>, Timestamp, Timestamp);
scalar_property_value!(Uuid, Uuid, Uuid);
scalar_property_value!(Vec<u8>, Bytes, Bytes);

/// Also reads enum constants, so `String` can back an enum-kinded property.
impl PropertyValue for String {
    fn kind() -> PropertyKind {
        PropertyKind::Text
    }

    fn into_value(self) -> Value {
        Value::Text(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) | Value::Enum(s) => Ok(s),
            other => Err(mismatch("String", &other)),
        }
    }
}

impl PropertyValue for ObjectRef {
    fn kind() -> PropertyKind {
        PropertyKind::Object
    }

    fn into_value(self) -> Value {
        Value::Object(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(object),
            other => Err(mismatch("ObjectRef", &other)),
        }
    }
}

impl<T: PropertyValue> PropertyValue for Option<T> {
    fn kind() -> PropertyKind {
        T::kind()
    }

    fn nullable() -> bool {
        true
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, T::into_value)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
