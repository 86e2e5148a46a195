//! Read-only, plain-text summary of form values.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::markup::TrustedMarkup;
use crate::registry::FieldRegistry;
use crate::types::{value_key, FieldDescriptor};

/// One summarized field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryLine {
    pub id: String,
    pub title: TrustedMarkup,
    pub text: String,
}

/// Describe each field's value in plain words, in descriptor order.
///
/// Values come from `values`, falling back to the descriptor's own value.
/// Label-less kinds (headings, free markup) are left out. Unknown types are
/// summarized by their raw value.
pub fn summarize(
    registry: &FieldRegistry,
    items: &[FieldDescriptor],
    values: &Map<String, Value>,
) -> Vec<SummaryLine> {
    items
        .iter()
        .filter_map(|item| {
            let value = values.get(&item.id).unwrap_or(&item.value);
            let text = match registry.resolve(&item.field_type) {
                Ok(renderer) if renderer.no_label() => return None,
                Ok(renderer) => renderer.human_title(item, value),
                Err(e) => {
                    debug!(field = %item.id, error = %e, "summarizing raw value");
                    match value {
                        Value::Null => String::new(),
                        other => value_key(other).unwrap_or_else(|| other.to_string()),
                    }
                }
            };
            Some(SummaryLine {
                id: item.id.clone(),
                title: item.title.clone(),
                text,
            })
        })
        .collect()
}
