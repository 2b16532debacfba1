use thiserror::Error;

#[derive(Error, Debug)]
pub enum EntityError {
    #[error("Cannot modify the primary key `{property}` because it's already set to {current}")]
    PrimaryKeyImmutable { property: String, current: String },

    #[error(
        "The value of non-null property `{property}` doesn't exist, an error occurred while trying to create a default one: {reason}. \
         Please ensure its value exists, or mark the property nullable ({kind}?)"
    )]
    DefaultSynthesis {
        property: String,
        kind: String,
        reason: String,
    },

    #[error("Cannot invoke entity method: {0}")]
    UnsupportedInvocation(String),

    #[error("Entity is detached: {0}")]
    DetachedEntity(String),

    #[error("Primary key column '{column}' of table '{table}' has no value")]
    MissingKey { table: String, column: String },

    #[error("Value of property `{property}` ({kind}) cannot be copied")]
    NonCopyableValue { property: String, kind: String },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Null value: {0}")]
    NullValue(String),

    #[error("Entity shape '{0}' not found")]
    UnknownShape(String),

    #[error("Property '{0}' not found in shape '{1}'")]
    UnknownProperty(String, String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, EntityError>;

impl<T> From<std::sync::PoisonError<T>> for EntityError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for EntityError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
