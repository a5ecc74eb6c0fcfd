use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid column name: {0:?}")]
    InvalidColumnName(String),
    #[error("invalid type name: {0:?}")]
    InvalidTypeName(String),
    #[error("invalid property name on {type_name}: {property:?}")]
    InvalidPropertyName { type_name: String, property: String },
    #[error("duplicate property '{property}' on {type_name}")]
    DuplicateProperty { type_name: String, property: String },
    #[error("enum {0} declares no variants")]
    EmptyEnum(String),
    #[error("duplicate variant '{variant}' on enum {type_name}")]
    DuplicateVariant { type_name: String, variant: String },
}

pub type Result<T> = std::result::Result<T, ModelError>;
