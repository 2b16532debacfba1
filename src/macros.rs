/// Declares a typed wrapper around [`EntityHandle`](crate::entity::EntityHandle)
/// for one entity shape.
///
/// Each field becomes a property of the shape. The wrapper gets a getter
/// named after the field and a `set_<field>` setter, both routed through the
/// handle's read/write path, so defaults, boxing, change tracking and
/// primary-key immutability behave exactly as with `invoke`.
///
/// The property kind comes from the field type's [`PropertyValue`]
/// implementation and can be overridden with `=> kind`. `Option<T>` fields
/// are nullable.
///
/// ```
/// use memorm::core::PropertyKind;
///
/// memorm::entity_shape! {
///     pub struct Department: "hr::Department" {
///         id: i32,
///         name: String,
///         location: Option<String>,
///     }
/// }
///
/// memorm::entity_shape! {
///     pub struct Employee: "hr::Employee" {
///         id: i32,
///         job: String => PropertyKind::enumeration("Job", &["clerk", "engineer"]),
///         department: Department,
///     }
/// }
///
/// let registry = memorm::schema::ShapeRegistry::builder()
///     .shape(Department::declaration())
///     .shape(Employee::declaration())
///     .build()
///     .unwrap();
///
/// let employee = Employee::create(&registry).unwrap();
/// employee.set_job("engineer".to_string()).unwrap();
/// assert_eq!(employee.job().unwrap(), "engineer");
/// assert_eq!(employee.department().unwrap().id().unwrap(), 0);
/// ```
///
/// [`PropertyValue`]: crate::entity::PropertyValue
#[macro_export]
macro_rules! entity_shape {
    (@kind $ty:ty) => {
        <$ty as $crate::entity::PropertyValue>::kind()
    };
    (@kind $ty:ty, $kind:expr) => {
        $kind
    };
    ($vis:vis struct $name:ident : $shape:literal {
        $($field:ident : $field_ty:ty $(=> $kind:expr)?),+ $(,)?
    }) => {
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name($crate::entity::EntityHandle);

        impl $name {
            pub const SHAPE: &'static str = $shape;

            /// Shape declaration to register with a `ShapeRegistry`.
            pub fn declaration() -> $crate::schema::EntityShape {
                $crate::schema::EntityShape::new($shape)
                $(
                    .property({
                        let descriptor = $crate::core::PropertyDescriptor::new(
                            stringify!($field),
                            $crate::entity_shape!(@kind $field_ty $(, $kind)?),
                        );
                        if <$field_ty as $crate::entity::PropertyValue>::nullable() {
                            descriptor.nullable()
                        } else {
                            descriptor
                        }
                    })
                )+
            }

            /// New detached, empty entity.
            pub fn create(
                registry: &::std::rc::Rc<$crate::schema::ShapeRegistry>,
            ) -> $crate::core::Result<Self> {
                $crate::entity::EntityHandle::new(registry, $shape).map(Self)
            }

            pub fn from_handle(handle: $crate::entity::EntityHandle) -> $crate::core::Result<Self> {
                if handle.shape_id() != $shape {
                    return Err($crate::core::EntityError::TypeMismatch(format!(
                        "Expected entity of shape {}, got {}",
                        $shape,
                        handle.shape_id()
                    )));
                }
                Ok(Self(handle))
            }

            pub fn handle(&self) -> &$crate::entity::EntityHandle {
                &self.0
            }

            pub fn into_handle(self) -> $crate::entity::EntityHandle {
                self.0
            }

            pub fn copy(&self) -> $crate::core::Result<Self> {
                self.0.copy().map(Self)
            }

            $crate::paste::paste! {
                $(
                    pub fn $field(&self) -> $crate::core::Result<$field_ty> {
                        let value = self.0.read_property(stringify!($field))?;
                        <$field_ty as $crate::entity::PropertyValue>::from_value(value)
                    }

                    pub fn [<set_ $field>](&self, value: $field_ty) -> $crate::core::Result<()> {
                        self.0.write_property(
                            stringify!($field),
                            <$field_ty as $crate::entity::PropertyValue>::into_value(value),
                        )
                    }
                )+
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::entity::EntityHandle;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl $crate::entity::PropertyValue for $name {
            fn kind() -> $crate::core::PropertyKind {
                $crate::core::PropertyKind::entity($shape)
            }

            fn into_value(self) -> $crate::core::Value {
                $crate::core::Value::Entity(self.0)
            }

            fn from_value(value: $crate::core::Value) -> $crate::core::Result<Self> {
                match value {
                    $crate::core::Value::Entity(handle) => Self::from_handle(handle),
                    other => Err($crate::core::EntityError::TypeMismatch(format!(
                        "Expected entity of shape {}, got {}",
                        $shape,
                        other.type_name()
                    ))),
                }
            }
        }
    };
}
