use std::any::Any;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityHandle;

/// A property value as held by an entity.
///
/// Scalar variants have value semantics. `Object`, `Entity` and `Opaque` are
/// shared handles: cloning the `Value` aliases the same underlying instance,
/// which is what makes identity-stable default caching and alias-safe copies
/// observable.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Char(char),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
    /// Constant name of an enum-kinded property.
    Enum(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    Object(ObjectRef),
    Entity(EntityHandle),
    Opaque(OpaqueRef),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean(_) => "BOOLEAN",
            Self::Char(_) => "CHAR",
            Self::Byte(_) => "BYTE",
            Self::Short(_) => "SHORT",
            Self::Integer(_) => "INTEGER",
            Self::Long(_) => "LONG",
            Self::Float(_) => "FLOAT",
            Self::Double(_) => "DOUBLE",
            Self::Text(_) => "TEXT",
            Self::Enum(_) => "ENUM",
            Self::Date(_) => "DATE",
            Self::Timestamp(_) => "TIMESTAMP",
            Self::Uuid(_) => "UUID",
            Self::Bytes(_) => "BYTES",
            Self::Object(_) => "OBJECT",
            Self::Entity(_) => "ENTITY",
            Self::Opaque(_) => "OPAQUE",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Short(v) => Some(i64::from(*v)),
            Self::Integer(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(f64::from(*f)),
            Self::Double(f) => Some(*f),
            other => other.as_i64().map(|i| i as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityHandle> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// True when both values are the same instance.
    ///
    /// Shared variants compare by pointer; value-semantics variants fall back
    /// to equality, since any two equal scalars are indistinguishable.
    pub fn same_instance(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Entity(a), Self::Entity(b)) => a.ptr_eq(b),
            (Self::Opaque(a), Self::Opaque(b)) => a.ptr_eq(b),
            (Self::Object(_) | Self::Entity(_) | Self::Opaque(_), _)
            | (_, Self::Object(_) | Self::Entity(_) | Self::Opaque(_)) => false,
            (a, b) => a == b,
        }
    }
}

fn float_eq(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    a == b
}

fn float_bits(f: f64) -> u64 {
    // equal values hash equal: both zeros, and every NaN payload
    if f == 0.0 {
        0
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Byte(a), Self::Byte(b)) => a == b,
            (Self::Short(a), Self::Short(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => float_eq(f64::from(*a), f64::from(*b)),
            (Self::Double(a), Self::Double(b)) => float_eq(*a, *b),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Uuid(a), Self::Uuid(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Entity(a), Self::Entity(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Boolean(b) => b.hash(state),
            Self::Char(c) => c.hash(state),
            Self::Byte(v) => v.hash(state),
            Self::Short(v) => v.hash(state),
            Self::Integer(v) => v.hash(state),
            Self::Long(v) => v.hash(state),
            Self::Float(f) => float_bits(f64::from(*f)).hash(state),
            Self::Double(f) => float_bits(*f).hash(state),
            Self::Text(s) | Self::Enum(s) => s.hash(state),
            Self::Date(d) => d.hash(state),
            Self::Timestamp(t) => t.hash(state),
            Self::Uuid(u) => u.hash(state),
            Self::Bytes(b) => b.hash(state),
            Self::Object(o) => o.borrow().to_string().hash(state),
            Self::Entity(e) => e.hash(state),
            Self::Opaque(o) => (Rc::as_ptr(&o.inner) as *const () as usize).hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Char(c) => write!(f, "{}", c),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Short(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Long(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::Text(s) | Self::Enum(s) => write!(f, "{}", s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Uuid(u) => write!(f, "{}", u),
            Self::Bytes(b) => write!(f, "{:?}", b),
            Self::Object(o) => write!(f, "{}", o.borrow()),
            Self::Entity(e) => write!(f, "{}", e),
            Self::Opaque(o) => write!(f, "<{}>", o.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Self::Char(c)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Self::Byte(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Self::Object(o)
    }
}

impl From<EntityHandle> for Value {
    fn from(e: EntityHandle) -> Self {
        Self::Entity(e)
    }
}

impl From<OpaqueRef> for Value {
    fn from(o: OpaqueRef) -> Self {
        Self::Opaque(o)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Shared, mutable JSON document stored in an `Object`-kinded property.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<serde_json::Value>>);

impl ObjectRef {
    pub fn new(json: serde_json::Value) -> Self {
        Self(Rc::new(RefCell::new(json)))
    }

    /// A fresh `{}` document.
    pub fn empty() -> Self {
        Self::new(serde_json::Value::Object(serde_json::Map::new()))
    }

    pub fn borrow(&self) -> Ref<'_, serde_json::Value> {
        self.0.borrow()
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.0.borrow().clone()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut serde_json::Value) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Copies the document into a new, unaliased cell.
    pub fn deep_clone(&self) -> Self {
        Self::new(self.to_json())
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0.borrow() == *other.0.borrow()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectRef").field(&*self.0.borrow()).finish()
    }
}

/// Handle to a foreign value the entity layer cannot duplicate or persist.
#[derive(Clone)]
pub struct OpaqueRef {
    type_name: &'static str,
    inner: Rc<dyn Any>,
}

impl OpaqueRef {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Rc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &OpaqueRef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for OpaqueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueRef<{}>", self.type_name)
    }
}

/// Declared type of an entity property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyKind {
    Boolean,
    Char,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    Text,
    Enum { name: String, constants: Vec<String> },
    Date,
    Timestamp,
    Uuid,
    Bytes,
    Object,
    Entity { shape: String },
    Opaque { name: String },
}

impl PropertyKind {
    pub fn enumeration(name: impl Into<String>, constants: &[&str]) -> Self {
        Self::Enum {
            name: name.into(),
            constants: constants.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn entity(shape: impl Into<String>) -> Self {
        Self::Entity {
            shape: shape.into(),
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Boolean
                | Self::Char
                | Self::Byte
                | Self::Short
                | Self::Integer
                | Self::Long
                | Self::Float
                | Self::Double
        )
    }

    /// Whether `value` is already in this kind's stored representation.
    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            (Self::Char, Value::Char(_)) => true,
            (Self::Byte, Value::Byte(_)) => true,
            (Self::Short, Value::Short(_)) => true,
            (Self::Integer, Value::Integer(_)) => true,
            (Self::Long, Value::Long(_)) => true,
            (Self::Float, Value::Float(_)) => true,
            (Self::Double, Value::Double(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Enum { constants, .. }, Value::Enum(name)) => constants.contains(name),
            (Self::Date, Value::Date(_)) => true,
            (Self::Timestamp, Value::Timestamp(_)) => true,
            (Self::Uuid, Value::Uuid(_)) => true,
            (Self::Bytes, Value::Bytes(_)) => true,
            (Self::Object, Value::Object(_)) => true,
            (Self::Entity { shape }, Value::Entity(entity)) => entity.shape_id() == *shape,
            (Self::Opaque { .. }, Value::Opaque(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "Boolean"),
            Self::Char => write!(f, "Char"),
            Self::Byte => write!(f, "Byte"),
            Self::Short => write!(f, "Short"),
            Self::Integer => write!(f, "Int"),
            Self::Long => write!(f, "Long"),
            Self::Float => write!(f, "Float"),
            Self::Double => write!(f, "Double"),
            Self::Text => write!(f, "String"),
            Self::Enum { name, .. } => write!(f, "{}", name),
            Self::Date => write!(f, "Date"),
            Self::Timestamp => write!(f, "Timestamp"),
            Self::Uuid => write!(f, "Uuid"),
            Self::Bytes => write!(f, "ByteArray"),
            Self::Object => write!(f, "Object"),
            Self::Entity { shape } => write!(f, "{}", shape),
            Self::Opaque { name } => write!(f, "{}", name),
        }
    }
}
