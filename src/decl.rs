//! Sum-type declarations: the input a plan is assembled from.
//!
//! Declarations are plain JSON documents. Loading keeps the JSON path of the
//! failing node in the error message.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ir::{FieldType, TagType, TagValue};

/// Non-empty sequence of wire keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct KeyPath(Vec<String>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "lowercase")]
pub enum Tagging {
    /// `{ tag: <tag>, content: { fields } }`
    Adjacent { tag: KeyPath, content: KeyPath },
    /// `{ identifier: <tag>, fields.. }`
    Internal { identifier: KeyPath },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SumTypeDecl {
    pub name: String,
    pub tagging: Tagging,
    #[serde(default)]
    pub tag_type: TagType,
    /// Identifier value assumed when the tag slot is missing.
    #[serde(default)]
    pub identifier_default: Option<TagValue>,
    /// Case decoded when the tag matches no declared case.
    #[serde(default)]
    pub fallback: Option<String>,
    pub cases: Vec<CaseDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseDecl {
    pub name: String,
    #[serde(default)]
    pub tag: Option<TagValue>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    /// Defaults to `[name]`.
    #[serde(default)]
    pub path: Option<KeyPath>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub decode: Option<bool>,
    #[serde(default)]
    pub encode: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum DeclError {
    #[error("at JSON path {path} → {message}")]
    Parse { path: String, message: String },
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl KeyPath {
    pub fn new<I, S>(keys: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() { None } else { Some(Self(keys)) }
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }
}

impl TryFrom<Vec<String>> for KeyPath {
    type Error = &'static str;
    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        KeyPath::new(value).ok_or("key path must not be empty")
    }
}

impl From<KeyPath> for Vec<String> {
    fn from(value: KeyPath) -> Self {
        value.0
    }
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self { name: name.into(), ty, path: None, default: None, decode: None, encode: None }
    }

    /// Declared path, or the field name as a single key.
    pub fn key_path(&self) -> Vec<String> {
        match &self.path {
            Some(path) => path.keys().to_vec(),
            None => vec![self.name.clone()],
        }
    }
}

impl CaseDecl {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDecl>) -> Self {
        Self { name: name.into(), tag: None, fields }
    }
}

impl SumTypeDecl {
    pub fn from_json_str(src: &str) -> Result<Self, DeclError> {
        from_str_with_path(src)
    }

    pub fn from_json_value(value: Value) -> Result<Self, DeclError> {
        from_value_with_path(value)
    }
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, DeclError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| DeclError::Parse {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

pub fn from_value_with_path<T: DeserializeOwned>(value: Value) -> Result<T, DeclError> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| DeclError::Parse {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_adjacent_declaration_with_defaults() {
        let decl = SumTypeDecl::from_json_value(json!({
            "name": "Shape",
            "tagging": { "style": "adjacent", "tag": ["type"], "content": ["payload"] },
            "cases": [{ "name": "circle", "fields": [{ "name": "radius", "type": "Double" }] }]
        }))
        .unwrap();
        assert_eq!(decl.tag_type, TagType::String);
        assert_eq!(decl.cases[0].fields[0].key_path(), ["radius"]);
        assert!(matches!(decl.tagging, Tagging::Adjacent { .. }));
    }

    #[test]
    fn empty_key_path_is_rejected_with_location() {
        let err = SumTypeDecl::from_json_value(json!({
            "name": "Shape",
            "tagging": { "style": "internal", "identifier": [] },
            "cases": []
        }))
        .unwrap_err();
        let DeclError::Parse { path, message } = err;
        assert!(path.starts_with("tagging"), "{path}");
        assert!(message.contains("must not be empty"), "{message}");
    }

    #[test]
    fn numeric_tags_parse() {
        let case: CaseDecl = serde_json::from_value(json!({ "name": "one", "tag": 1 })).unwrap();
        assert_eq!(case.tag, Some(TagValue::Int(1)));
        assert!(case.fields.is_empty());
    }
}
