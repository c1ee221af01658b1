//! Template System - frozen field collections and the records that carry them

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hashing;
use crate::types::FieldDefinition;

pub type TemplateId = String;

/// Immutable snapshot of a field collection.
///
/// There is no way to mutate a snapshot once created; cloning shares the
/// underlying storage. Equality ignores insertion order, iteration keeps it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateFields(Arc<IndexMap<String, FieldDefinition>>);

impl TemplateFields {
    pub(crate) fn freeze(fields: &IndexMap<String, FieldDefinition>) -> Self {
        Self(Arc::new(fields.clone()))
    }

    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, FieldDefinition> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Owned deep copy, for seeding a builder
    pub(crate) fn to_map(&self) -> IndexMap<String, FieldDefinition> {
        self.0.as_ref().clone()
    }

    /// SHA-256 over the canonical JSON of the collection
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        hashing::fingerprint(self)
    }
}

impl FromIterator<(String, FieldDefinition)> for TemplateFields {
    fn from_iter<I: IntoIterator<Item = (String, FieldDefinition)>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

impl<'a> IntoIterator for &'a TemplateFields {
    type Item = (&'a String, &'a FieldDefinition);
    type IntoIter = indexmap::map::Iter<'a, String, FieldDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for TemplateFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TemplateFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IndexMap::<String, FieldDefinition>::deserialize(deserializer).map(|m| Self(Arc::new(m)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub fields: TemplateFields,
}

impl Template {
    pub(crate) fn assemble(
        data: TemplateData,
        fields: TemplateFields,
        last_updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: data.id,
            name: data.name,
            description: data.description,
            created_at: data.created_at,
            last_updated_at,
            tags: data.tags,
            fields,
        }
    }
}

/// Template metadata without `fields` and `lastUpdatedAt`, which the builder
/// supplies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateData {
    pub id: TemplateId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TemplateData {
    pub fn new(
        id: impl Into<TemplateId>,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            created_at,
            tags: vec![],
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

impl From<&Template> for TemplateData {
    fn from(t: &Template) -> Self {
        Self {
            id: t.id.clone(),
            name: t.name.clone(),
            description: t.description.clone(),
            created_at: t.created_at,
            tags: t.tags.clone(),
        }
    }
}

/// Metadata replacements for `update_template`. Set values win over the
/// existing template's.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateChanges {
    #[serde(default)]
    pub id: Option<TemplateId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl TemplateChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<TemplateId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Shallow-merge over `base`'s metadata
    pub fn apply(self, base: &Template) -> TemplateData {
        let mut data = TemplateData::from(base);
        if let Some(id) = self.id {
            data.id = id;
        }
        if let Some(name) = self.name {
            data.name = name;
        }
        if let Some(description) = self.description {
            data.description = Some(description);
        }
        if let Some(created_at) = self.created_at {
            data.created_at = created_at;
        }
        if let Some(tags) = self.tags {
            data.tags = tags;
        }
        data
    }
}

/// Source of `lastUpdatedAt` timestamps
pub trait Clock: fmt::Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_template() -> Template {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Template {
            id: "id#1".into(),
            name: "testTemplate".into(),
            description: Some("Test template description".into()),
            created_at: at,
            last_updated_at: at,
            tags: vec!["test".into(), "example".into()],
            fields: [
                (
                    "name".to_string(),
                    FieldDefinition::new(FieldType::String).required(true),
                ),
                ("age".to_string(), FieldDefinition::new(FieldType::Number).default_value(0)),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn test_template_json_shape() {
        let v = serde_json::to_value(sample_template()).unwrap();
        assert_eq!(v["createdAt"], json!("2024-03-01T12:00:00Z"));
        assert_eq!(v["fields"]["age"], json!({"type": "number", "defaultValue": 0}));
        assert_eq!(v["tags"], json!(["test", "example"]));
    }

    #[test]
    fn test_template_json_round_trip() {
        let t = sample_template();
        let s = serde_json::to_string(&t).unwrap();
        let parsed: Template = serde_json::from_str(&s).unwrap();
        assert_eq!(parsed, t);
    }

    #[test]
    fn test_fields_keep_insertion_order() {
        let t = sample_template();
        assert_eq!(t.fields.names().collect::<Vec<_>>(), vec!["name", "age"]);
    }

    #[test]
    fn test_fields_equality_ignores_order() {
        let a: TemplateFields = [
            ("a".to_string(), FieldDefinition::new(FieldType::String)),
            ("b".to_string(), FieldDefinition::new(FieldType::Boolean)),
        ]
        .into_iter()
        .collect();
        let b: TemplateFields = [
            ("b".to_string(), FieldDefinition::new(FieldType::Boolean)),
            ("a".to_string(), FieldDefinition::new(FieldType::String)),
        ]
        .into_iter()
        .collect();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn test_changes_apply_shallow() {
        let t = sample_template();
        let data = TemplateChanges::new().name("updatedName").id("changedId").apply(&t);
        assert_eq!(data.id, "changedId");
        assert_eq!(data.name, "updatedName");
        assert_eq!(data.description, t.description);
        assert_eq!(data.tags, t.tags);
        assert_eq!(data.created_at, t.created_at);
    }
}
