//! Template Fields Core - validated, immutable schema builder
//!
//! # Guarantees
//! 1. Defaults Match Types
//! 2. Failed Calls Change Nothing
//! 3. Snapshots Are Frozen
//! 4. Builders Stay Reusable

pub mod builder;
pub mod error;
pub mod hashing;
pub mod templates;
pub mod types;

pub use builder::TemplateFieldsBuilder;
pub use error::{Result, ValidationError};
pub use hashing::{canonical_json, sha256_hex};
pub use templates::{
    Clock, FixedClock, SystemClock, Template, TemplateChanges, TemplateData, TemplateFields,
    TemplateId,
};
pub use types::{
    is_valid_default_value, DefaultPatch, FieldDefinition, FieldPatch, FieldType, FieldValue,
};

pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest accepted field name, in characters
pub const MAX_FIELD_NAME_LENGTH: usize = 50;
