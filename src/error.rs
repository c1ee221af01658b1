//! Validation errors raised by the field builder

use thiserror::Error;

use crate::types::FieldType;

/// Result type for builder operations
pub type Result<T> = std::result::Result<T, ValidationError>;

/// The single error kind of the crate. Every variant is a caller-input error;
/// the builder is left unchanged and stays usable after any of them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Field name must be a non-empty string\nInvalid string: {0}")]
    BlankFieldName(String),

    #[error("The field with name \"{0}\" already exists")]
    DuplicateField(String),

    #[error("\"{name}\" field's length more than {max} symbols")]
    FieldNameTooLong { name: String, max: usize },

    #[error("Default value for field '{name}' doesn't match type '{field_type}'")]
    DefaultValueMismatch { name: String, field_type: FieldType },

    #[error("Field with name \"{0}\" does not exist. You need to add a field instead")]
    FieldNotFound(String),

    #[error("Default value for field \"{name}\" does not match type \"{field_type}\"")]
    UpdatedDefaultMismatch { name: String, field_type: FieldType },

    #[error(
        "Existing default value for field \"{name}\" does not match new type \"{field_type}\". \
         Please provide a new defaultValue or set it to null"
    )]
    ExistingDefaultMismatch { name: String, field_type: FieldType },

    #[error("Unsupported field type '{0}'")]
    UnknownFieldType(String),

    /// A deserialized definition whose default does not fit its type
    #[error("Default value doesn't match type '{field_type}'")]
    InvalidDefaultValue { field_type: FieldType },

    /// Collection-level failures collected by `validate()`
    #[error("Validation failed {}", .0.join(", "))]
    Failed(Vec<String>),

    /// A JSON field definition without the expected shape
    #[error("Malformed field definition: {0}")]
    MalformedDefinition(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_name_message() {
        let err = ValidationError::BlankFieldName("  ".into());
        assert_eq!(
            err.to_string(),
            "Field name must be a non-empty string\nInvalid string:   "
        );
    }

    #[test]
    fn test_failed_joins_messages() {
        let err = ValidationError::Failed(vec!["first".into(), "second".into()]);
        assert_eq!(err.to_string(), "Validation failed first, second");
    }

    #[test]
    fn test_type_change_message() {
        let err = ValidationError::ExistingDefaultMismatch {
            name: "key".into(),
            field_type: FieldType::Number,
        };
        assert!(err.to_string().contains("does not match new type \"number\""));
    }
}
