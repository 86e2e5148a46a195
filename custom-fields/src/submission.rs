//! Decoding of posted hidden persistence inputs back into typed values.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use crate::types::FieldDescriptor;

/// Whether a field kind persists its value as JSON.
fn is_json_encoded(descriptor: &FieldDescriptor) -> bool {
    descriptor.is_multi
        || descriptor.field_type.starts_with("multi_")
        || descriptor.field_type == "group"
}

/// Field values read back from a submitted form, in descriptor order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    values: IndexMap<String, Value>,
}

impl Submission {
    /// Decode `posted` (input name → raw string) against the top-level
    /// descriptors. Fields without a posted entry are skipped; lists and
    /// groups are parsed from JSON, everything else stays a string.
    pub fn decode(items: &[FieldDescriptor], posted: &HashMap<String, String>) -> Self {
        let values = items
            .iter()
            .filter_map(|item| {
                let raw = posted.get(&item.id)?;
                let value = if is_json_encoded(item) {
                    decode_json(item, raw)
                } else {
                    Value::String(raw.clone())
                };
                Some((item.id.clone(), value))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// The values as one JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.values
    }
}

fn decode_json(item: &FieldDescriptor, raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(field = %item.id, error = %e, "posted value is not valid JSON, keeping raw text");
            Value::String(raw.to_string())
        }
    }
}
