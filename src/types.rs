//! Field Type Model - the closed type universe and its value predicate
//!
//! Every field carries one `FieldType`. A default value is a dynamically-typed
//! `FieldValue`; `is_valid_default_value` decides whether it fits the type.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Object,
}

impl FieldType {
    pub const ALL: [FieldType; 5] = [
        FieldType::String,
        FieldType::Number,
        FieldType::Boolean,
        FieldType::Date,
        FieldType::Object,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Object => "object",
        }
    }

    /// Method form of [`is_valid_default_value`]
    pub fn accepts(&self, value: &FieldValue) -> bool {
        is_valid_default_value(*self, value)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownFieldType(s.to_string()))
    }
}

/// A candidate value, as a caller may hand it in.
///
/// `Array` and `Null` are representable so they can be rejected; no field type
/// accepts them.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Object(Map<String, Value>),
    Array(Vec<Value>),
    Null,
}

impl FieldValue {
    /// Reinterpret the value for a declared type. Only text aimed at a `date`
    /// field changes: it is read as RFC 3339, and stays text if unparseable.
    pub fn coerce(self, field_type: FieldType) -> FieldValue {
        match (field_type, self) {
            (FieldType::Date, FieldValue::String(s)) => match DateTime::parse_from_rfc3339(&s) {
                Ok(dt) => FieldValue::Date(dt.with_timezone(&Utc)),
                Err(_) => FieldValue::String(s),
            },
            (_, v) => v,
        }
    }
}

/// Type-check predicate for default values. Total and side-effect free.
pub fn is_valid_default_value(field_type: FieldType, value: &FieldValue) -> bool {
    match (field_type, value) {
        (FieldType::String, FieldValue::String(_)) => true,
        (FieldType::Number, FieldValue::Number(n)) => !n.is_nan(),
        (FieldType::Boolean, FieldValue::Boolean(_)) => true,
        (FieldType::Date, FieldValue::Date(_)) => true,
        (FieldType::Object, FieldValue::Object(_)) => true,
        _ => false,
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Number(v as f64)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Number(v as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Date(v)
    }
}

impl From<Map<String, Value>> for FieldValue {
    fn from(v: Map<String, Value>) -> Self {
        FieldValue::Object(v)
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => FieldValue::String(s),
            Value::Number(n) => FieldValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::Bool(b) => FieldValue::Boolean(b),
            Value::Object(m) => FieldValue::Object(m),
            Value::Array(a) => FieldValue::Array(a),
            Value::Null => FieldValue::Null,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::String(s) => serializer.serialize_str(s),
            // non-finite numbers have no JSON form
            FieldValue::Number(n) if !n.is_finite() => Err(serde::ser::Error::custom(format!(
                "number default {} has no JSON representation",
                n
            ))),
            // Whole numbers go out as integers so `123` stays `123`
            FieldValue::Number(n)
                if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 =>
            {
                serializer.serialize_i64(*n as i64)
            }
            FieldValue::Number(n) => serializer.serialize_f64(*n),
            FieldValue::Boolean(b) => serializer.serialize_bool(*b),
            FieldValue::Date(d) => {
                serializer.serialize_str(&d.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            FieldValue::Object(m) => m.serialize(serializer),
            FieldValue::Array(a) => a.serialize(serializer),
            FieldValue::Null => serializer.serialize_unit(),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(FieldValue::from)
    }
}

/// One entry in a field collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", try_from = "RawFieldDefinition")]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<FieldValue>,
}

impl FieldDefinition {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: None,
            default_value: None,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    /// True when there is no default, or the default fits the declared type
    pub fn is_consistent(&self) -> bool {
        self.default_value
            .as_ref()
            .map_or(true, |v| self.field_type.accepts(v))
    }
}

/// Wire form of a field definition, before the type tag is checked and the
/// default is coerced.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFieldDefinition {
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    required: Option<bool>,
    #[serde(default)]
    default_value: Option<FieldValue>,
}

impl RawFieldDefinition {
    /// Parse the type tag and coerce the default, without checking that they fit
    fn into_unchecked(self) -> Result<FieldDefinition, ValidationError> {
        let field_type: FieldType = self.field_type.parse()?;
        let default_value = self
            .default_value
            .filter(|v| *v != FieldValue::Null)
            .map(|v| v.coerce(field_type));

        Ok(FieldDefinition {
            field_type,
            required: self.required,
            default_value,
        })
    }
}

impl TryFrom<RawFieldDefinition> for FieldDefinition {
    type Error = ValidationError;

    fn try_from(raw: RawFieldDefinition) -> Result<Self, Self::Error> {
        let def = raw.into_unchecked()?;
        if !def.is_consistent() {
            return Err(ValidationError::InvalidDefaultValue {
                field_type: def.field_type,
            });
        }
        Ok(def)
    }
}

impl FieldDefinition {
    /// Read a definition from JSON, leaving the default/type check to the
    /// builder so that a mismatch is reported against the field's name.
    /// Unknown type tags and malformed shapes are still rejected here.
    pub fn from_json_unchecked(value: Value) -> Result<Self, ValidationError> {
        serde_json::from_value::<RawFieldDefinition>(value)
            .map_err(|e| ValidationError::MalformedDefinition(e.to_string()))?
            .into_unchecked()
    }
}

/// What `update_field` does with the stored default value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DefaultPatch {
    #[default]
    Keep,
    Set(FieldValue),
    Clear,
}

/// Partial definition merged over an existing field by `update_field`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    pub field_type: Option<FieldType>,
    pub required: Option<bool>,
    pub default_value: DefaultPatch,
}

impl FieldPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default_value = DefaultPatch::Set(value.into());
        self
    }

    pub fn clear_default(mut self) -> Self {
        self.default_value = DefaultPatch::Clear;
        self
    }

    /// Coerce a supplied default for the type it will be checked against:
    /// the patch's own type if set, else `current`.
    pub fn coerce_default(mut self, current: FieldType) -> Self {
        let effective = self.field_type.unwrap_or(current);
        if let DefaultPatch::Set(v) = self.default_value {
            self.default_value = DefaultPatch::Set(v.coerce(effective));
        }
        self
    }

    /// Apply onto `current`. Shallow merge; no validation.
    pub fn merge_into(&self, current: &FieldDefinition) -> FieldDefinition {
        FieldDefinition {
            field_type: self.field_type.unwrap_or(current.field_type),
            required: self.required.or(current.required),
            default_value: match &self.default_value {
                DefaultPatch::Keep => current.default_value.clone(),
                DefaultPatch::Set(v) => Some(v.clone()),
                DefaultPatch::Clear => None,
            },
        }
    }
}

/// Wire form of a patch: `"defaultValue": null` clears, absence keeps.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFieldPatch {
    #[serde(default, rename = "type")]
    field_type: Option<String>,
    #[serde(default)]
    required: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    default_value: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl<'de> Deserialize<'de> for FieldPatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawFieldPatch::deserialize(deserializer)?;
        let field_type = raw
            .field_type
            .map(|t| t.parse::<FieldType>())
            .transpose()
            .map_err(serde::de::Error::custom)?;
        let default_value = match raw.default_value {
            None => DefaultPatch::Keep,
            Some(Value::Null) => DefaultPatch::Clear,
            Some(v) => DefaultPatch::Set(FieldValue::from(v)),
        };
        let patch = FieldPatch {
            field_type,
            required: raw.required,
            default_value,
        };
        Ok(match field_type {
            Some(t) => patch.coerce_default(t),
            None => patch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_predicate_accepts_native_values() {
        let date = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert!(is_valid_default_value(FieldType::String, &"x".into()));
        assert!(is_valid_default_value(FieldType::Number, &1.5.into()));
        assert!(is_valid_default_value(FieldType::Boolean, &false.into()));
        assert!(is_valid_default_value(FieldType::Date, &date.into()));
        assert!(is_valid_default_value(FieldType::Object, &FieldValue::Object(Map::new())));
    }

    #[test]
    fn test_predicate_rejects_nan() {
        assert!(!FieldType::Number.accepts(&FieldValue::Number(f64::NAN)));
    }

    #[test]
    fn test_object_rejects_array_date_and_null() {
        let date = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert!(!FieldType::Object.accepts(&FieldValue::Array(vec![json!(1)])));
        assert!(!FieldType::Object.accepts(&FieldValue::Date(date)));
        assert!(!FieldType::Object.accepts(&FieldValue::Null));
        assert!(!FieldType::Object.accepts(&1.into()));
    }

    #[test]
    fn test_cross_type_values_rejected() {
        assert!(!FieldType::String.accepts(&123.into()));
        assert!(!FieldType::Boolean.accepts(&"true".into()));
        assert!(!FieldType::Date.accepts(&"2024-01-01".into()));
        for t in FieldType::ALL {
            assert!(!t.accepts(&FieldValue::Null));
        }
    }

    #[test]
    fn test_unknown_type_tag_rejected() {
        let err = "integer".parse::<FieldType>().unwrap_err();
        assert_eq!(err, ValidationError::UnknownFieldType("integer".into()));
        assert_eq!("date".parse::<FieldType>().unwrap(), FieldType::Date);
    }

    #[test]
    fn test_definition_json_shape() {
        let def = FieldDefinition::new(FieldType::Boolean).required(true);
        assert_eq!(
            serde_json::to_value(&def).unwrap(),
            json!({"type": "boolean", "required": true})
        );

        let def = FieldDefinition::new(FieldType::Number).default_value(123);
        assert_eq!(
            serde_json::to_value(&def).unwrap(),
            json!({"type": "number", "defaultValue": 123})
        );
    }

    #[test]
    fn test_definition_date_default_parsed() {
        let def: FieldDefinition =
            serde_json::from_value(json!({"type": "date", "defaultValue": "2024-05-01T10:00:00Z"}))
                .unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(def.default_value, Some(FieldValue::Date(expected)));
    }

    #[test]
    fn test_definition_rejects_invalid_date() {
        let res = serde_json::from_value::<FieldDefinition>(
            json!({"type": "date", "defaultValue": "not a date"}),
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_definition_rejects_mismatched_default() {
        let err = serde_json::from_value::<FieldDefinition>(
            json!({"type": "object", "defaultValue": [1, 2]}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("doesn't match type 'object'"));
    }

    #[test]
    fn test_definition_rejects_unknown_type() {
        let err = serde_json::from_value::<FieldDefinition>(json!({"type": "array"})).unwrap_err();
        assert!(err.to_string().contains("Unsupported field type 'array'"));
    }

    #[test]
    fn test_unchecked_definition_keeps_mismatch() {
        let def =
            FieldDefinition::from_json_unchecked(json!({"type": "object", "defaultValue": 1}))
                .unwrap();
        assert_eq!(def.field_type, FieldType::Object);
        assert!(!def.is_consistent());

        let err = FieldDefinition::from_json_unchecked(json!({"type": "array"})).unwrap_err();
        assert_eq!(err, ValidationError::UnknownFieldType("array".into()));

        let err = FieldDefinition::from_json_unchecked(json!({"required": true})).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedDefinition(_)));
    }

    #[test]
    fn test_date_default_keeps_sub_millisecond_precision() {
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let def = FieldDefinition::new(FieldType::Date).default_value(at);
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["defaultValue"], json!("2023-11-14T22:13:20.123456789Z"));

        let reloaded: FieldDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(reloaded, def);
    }

    #[test]
    fn test_non_finite_number_refuses_to_serialize() {
        for n in [f64::INFINITY, f64::NEG_INFINITY] {
            let def = FieldDefinition::new(FieldType::Number).default_value(n);
            assert!(def.is_consistent());
            assert!(serde_json::to_string(&def).is_err());
        }
    }

    #[test]
    fn test_patch_merge_keeps_and_clears() {
        let current = FieldDefinition::new(FieldType::String)
            .required(false)
            .default_value("text");

        let kept = FieldPatch::new().required(true).merge_into(&current);
        assert_eq!(kept.required, Some(true));
        assert_eq!(kept.default_value, Some("text".into()));

        let cleared = FieldPatch::new()
            .field_type(FieldType::Number)
            .clear_default()
            .merge_into(&current);
        assert_eq!(cleared.field_type, FieldType::Number);
        assert_eq!(cleared.default_value, None);
        assert_eq!(cleared.required, Some(false));
    }

    #[test]
    fn test_patch_from_json() {
        let patch: FieldPatch = serde_json::from_value(json!({"defaultValue": null})).unwrap();
        assert_eq!(patch.default_value, DefaultPatch::Clear);

        let patch: FieldPatch = serde_json::from_value(json!({"required": true})).unwrap();
        assert_eq!(patch.default_value, DefaultPatch::Keep);
        assert_eq!(patch.required, Some(true));

        let patch: FieldPatch =
            serde_json::from_value(json!({"type": "date", "defaultValue": "2024-05-01T10:00:00Z"}))
                .unwrap();
        assert!(matches!(patch.default_value, DefaultPatch::Set(FieldValue::Date(_))));
    }
}
