//! Field Collection Builder
//!
//! Accumulates field definitions behind a fluent `&mut self` interface and
//! hands out frozen snapshots. Every check runs before the single write, so a
//! failed call never leaves a partial change behind.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::{Result, ValidationError};
use crate::templates::{
    Clock, SystemClock, Template, TemplateChanges, TemplateData, TemplateFields,
};
use crate::types::{DefaultPatch, FieldDefinition, FieldPatch};
use crate::MAX_FIELD_NAME_LENGTH;

const NO_FIELDS: &str = "Builder has no fields defined";

#[derive(Debug, Clone)]
pub struct TemplateFieldsBuilder {
    fields: IndexMap<String, FieldDefinition>,
    clock: Arc<dyn Clock>,
}

impl TemplateFieldsBuilder {
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for `lastUpdatedAt` instead of the system time
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replace the working collection with a copy of `template`'s fields.
    /// Unsaved state is discarded; nothing is validated here.
    pub fn from_template(&mut self, template: &Template) -> &mut Self {
        self.fields = template.fields.to_map();
        debug!(
            template = %template.id,
            fields = self.fields.len(),
            "seeded builder from template"
        );
        self
    }

    pub fn add_field(&mut self, name: &str, definition: FieldDefinition) -> Result<&mut Self> {
        if name.trim().is_empty() {
            return Err(ValidationError::BlankFieldName(name.to_string()));
        }
        if self.fields.contains_key(name) {
            return Err(ValidationError::DuplicateField(name.to_string()));
        }
        if name.chars().count() > MAX_FIELD_NAME_LENGTH {
            return Err(ValidationError::FieldNameTooLong {
                name: name.to_string(),
                max: MAX_FIELD_NAME_LENGTH,
            });
        }
        if !definition.is_consistent() {
            return Err(ValidationError::DefaultValueMismatch {
                name: name.to_string(),
                field_type: definition.field_type,
            });
        }

        debug!(field = name, field_type = %definition.field_type, "field added");
        self.fields.insert(name.to_string(), definition);
        Ok(self)
    }

    pub fn update_field(&mut self, name: &str, patch: FieldPatch) -> Result<&mut Self> {
        let current = self
            .fields
            .get(name)
            .ok_or_else(|| ValidationError::FieldNotFound(name.to_string()))?;

        match &patch.default_value {
            DefaultPatch::Set(value) => {
                let effective = patch.field_type.unwrap_or(current.field_type);
                if !effective.accepts(value) {
                    return Err(ValidationError::UpdatedDefaultMismatch {
                        name: name.to_string(),
                        field_type: effective,
                    });
                }
            }
            DefaultPatch::Keep => {
                if let (Some(new_type), Some(existing)) =
                    (patch.field_type, &current.default_value)
                {
                    if new_type != current.field_type && !new_type.accepts(existing) {
                        return Err(ValidationError::ExistingDefaultMismatch {
                            name: name.to_string(),
                            field_type: new_type,
                        });
                    }
                }
            }
            DefaultPatch::Clear => {}
        }

        let merged = patch.merge_into(current);
        debug!(field = name, field_type = %merged.field_type, "field updated");
        self.fields.insert(name.to_string(), merged);
        Ok(self)
    }

    /// Delete `name` if present. Absent names are a no-op.
    pub fn remove_field(&mut self, name: &str) -> &mut Self {
        if self.fields.shift_remove(name).is_some() {
            debug!(field = name, "field removed");
        }
        self
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Read-only view of the working definition for `name`
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Collection-level failures, in order. Empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = vec![];

        if self.fields.is_empty() {
            errors.push(NO_FIELDS.to_string());
        }

        errors
    }

    fn ensure_valid(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            return Ok(());
        }
        warn!(errors = ?errors, "finalization rejected");
        Err(ValidationError::Failed(errors))
    }

    /// Validate and return a frozen copy of the working collection
    pub fn build(&self) -> Result<TemplateFields> {
        self.ensure_valid()?;
        debug!(fields = self.fields.len(), "built field snapshot");
        Ok(TemplateFields::freeze(&self.fields))
    }

    /// Validate and combine `data` with a frozen copy of the working collection
    pub fn to_template(&self, data: TemplateData) -> Result<Template> {
        let fields = self.build()?;
        let template = Template::assemble(data, fields, self.clock.now());
        debug!(template = %template.id, "template created");
        Ok(template)
    }

    /// Validate and merge `changes` over `existing`. The resulting `fields`
    /// are the builder's working collection, not `existing.fields`.
    pub fn update_template(
        &self,
        existing: &Template,
        changes: TemplateChanges,
    ) -> Result<Template> {
        let fields = self.build()?;
        let template = Template::assemble(changes.apply(existing), fields, self.clock.now());
        debug!(template = %template.id, previous = %existing.id, "template updated");
        Ok(template)
    }

    // Consuming forms, for expression-style construction.

    pub fn with_field(mut self, name: &str, definition: FieldDefinition) -> Result<Self> {
        self.add_field(name, definition)?;
        Ok(self)
    }

    pub fn with_updated_field(mut self, name: &str, patch: FieldPatch) -> Result<Self> {
        self.update_field(name, patch)?;
        Ok(self)
    }

    pub fn without_field(mut self, name: &str) -> Self {
        self.remove_field(name);
        self
    }
}

impl Default for TemplateFieldsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
