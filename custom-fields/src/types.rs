//! Core descriptor types for the field engine.
//!
//! Descriptors arrive as JSON from the host schema. Keys the engine doesn't
//! model (`post_type`, `query_args`, `mode`, nested `items`, ...) are kept in
//! [`FieldDescriptor::extra`] and passed through to the renderer.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::markup::TrustedMarkup;

/// String identity of a plain value (string, number or bool).
///
/// Returns `None` for null and for arrays/objects, which are never valid
/// identifiers.
pub fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Whether a value counts as "set" (the JS notion of truthy).
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A single selectable option.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldOption {
    pub value: Value,
    #[serde(default)]
    pub label: TrustedMarkup,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<TrustedMarkup>,
}

impl FieldOption {
    pub fn new(value: impl Into<Value>, label: impl Into<TrustedMarkup>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            excerpt: None,
        }
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<TrustedMarkup>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }

    /// Normalized identity used for matching against selections.
    pub fn key(&self) -> String {
        value_key(&self.value).unwrap_or_default()
    }
}

/// A field descriptor: one declarative item in a form schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FieldDescriptor {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub title: TrustedMarkup,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldOption>>,
    #[serde(default, rename = "isMulti")]
    pub is_multi: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub group_level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_attributes",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub custom_attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<TrustedMarkup>,
    /// Keys not modelled above, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accepts an attribute map, or the empty list PHP emits for an empty array.
fn deserialize_attributes<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(k, v)| value_key(&v).map(|v| (k, v)))
            .collect(),
        _ => BTreeMap::new(),
    })
}

impl FieldDescriptor {
    pub fn new(id: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_type: field_type.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<TrustedMarkup>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_description(mut self, description: impl Into<TrustedMarkup>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = Some(generator.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn multi(mut self) -> Self {
        self.is_multi = true;
        self
    }

    pub fn at_level(mut self, group_level: u32) -> Self {
        self.group_level = group_level;
        self
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// CSS class supplied by the schema (`className`).
    pub fn class_name(&self) -> Option<&str> {
        self.extra_str("className")
    }

    /// Child descriptors of a group field. Malformed entries are skipped.
    pub fn nested_items(&self) -> Vec<FieldDescriptor> {
        match self.extra.get("items") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match serde_json::from_value(item.clone()) {
                    Ok(descriptor) => Some(descriptor),
                    Err(e) => {
                        tracing::warn!(group = %self.id, error = %e, "skipping malformed nested item");
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The full descriptor as a JSON object, as sent to remote endpoints.
    pub fn to_config(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Static option whose identity matches `value`.
    pub fn find_option(&self, value: &Value) -> Option<&FieldOption> {
        let key = value_key(value)?;
        self.options.as_ref()?.iter().find(|o| o.key() == key)
    }
}

/// The backend object a form is attached to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    PostMetabox,
    OptionsPage,
    Taxonomy,
    ProductOptions,
    WoocommerceSettings,
    #[serde(untagged)]
    Other(String),
}

/// A settings tab or section of a shop settings page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SettingsTab {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A whole form as handed to the engine by the host page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormDescriptor {
    pub object_type: ObjectType,
    #[serde(default)]
    pub items: Vec<FieldDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<SettingsTab>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<SettingsTab>,
    /// Object-specific keys such as `taxonomy` or `post_types`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FormDescriptor {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
