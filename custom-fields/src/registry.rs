//! Field registry: field type identifier → renderer.
//!
//! A renderer is a capability set: it can mount a stateful field instance,
//! may ask for its label wrapper to be suppressed, and can describe a value in
//! plain words for read-only summaries. Resolution is a plain map lookup.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::context::FormContext;
use crate::editor::{KeyPress, Propagation};
use crate::error::{FieldsError, Result};
use crate::markup::Node;
use crate::normalizer::OnChange;
use crate::types::{value_key, FieldDescriptor};

/// What a mounted field receives at mount time.
#[derive(Clone)]
pub struct MountContext {
    pub form: Arc<FormContext>,
    /// Called with the field's outward value whenever it changes
    pub on_change: OnChange,
}

/// User interaction routed to a mounted field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEvent {
    /// Replace the whole value
    Input(Value),
    /// Search text typed into an option lookup
    Search(String),
    /// Pick an option, or append a row to a repeatable group
    Add(Value),
    /// Unselect an option, or drop a row of a repeatable group
    Remove(Value),
    /// Drag-reorder of selected entries
    Reorder(Vec<Value>),
    /// Key pressed inside the field
    Key(KeyPress),
    /// Event for a child of a group field, addressed by child id (or row index)
    Nested { id: String, event: Box<FieldEvent> },
}

impl FieldEvent {
    pub fn nested(id: impl Into<String>, event: FieldEvent) -> Self {
        FieldEvent::Nested {
            id: id.into(),
            event: Box::new(event),
        }
    }
}

/// A mounted field. Owns its runtime state; dropping it unmounts it.
pub trait FieldInstance: Send {
    /// Render against the descriptor supplied for this render pass.
    fn render(&mut self, descriptor: &FieldDescriptor) -> Node;

    /// Current working value, in the shape announced to the parent.
    fn value(&self) -> Value;

    fn handle(&mut self, event: FieldEvent) -> Propagation {
        tracing::trace!(?event, "event not handled by field");
        Propagation::Continue
    }
}

pub trait FieldRenderer: Send + Sync {
    /// Suppress the automatic label and line break wrapper.
    fn no_label(&self) -> bool {
        false
    }

    /// Plain-text rendering of `value` for read-only summaries.
    fn human_title(&self, _descriptor: &FieldDescriptor, value: &Value) -> String {
        match value {
            Value::Array(items) => items
                .iter()
                .filter_map(value_key)
                .collect::<Vec<_>>()
                .join(", "),
            other => value_key(other).unwrap_or_default(),
        }
    }

    fn mount(&self, descriptor: &FieldDescriptor, ctx: MountContext) -> Box<dyn FieldInstance>;
}

/// Type identifier → renderer map.
#[derive(Clone, Default)]
pub struct FieldRegistry {
    renderers: HashMap<String, Arc<dyn FieldRenderer>>,
}

impl FieldRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in field kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::fields::register_defaults(&mut registry);
        registry
    }

    /// Register or replace the renderer for a type.
    pub fn register(&mut self, field_type: impl Into<String>, renderer: impl FieldRenderer + 'static) {
        self.renderers.insert(field_type.into(), Arc::new(renderer));
    }

    pub fn resolve(&self, field_type: &str) -> Result<Arc<dyn FieldRenderer>> {
        self.renderers
            .get(field_type)
            .cloned()
            .ok_or_else(|| FieldsError::UnknownFieldType {
                field_type: field_type.to_string(),
            })
    }

    pub fn contains(&self, field_type: &str) -> bool {
        self.renderers.contains_key(field_type)
    }

    /// Registered type identifiers, sorted.
    pub fn field_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.renderers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl std::fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("field_types", &self.field_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_type_is_an_error_not_a_panic() {
        let registry = FieldRegistry::with_defaults();
        let err = registry.resolve("hologram").err().unwrap();
        assert!(matches!(err, FieldsError::UnknownFieldType { ref field_type } if field_type == "hologram"));
    }

    #[test]
    fn test_defaults_cover_builtin_kinds() {
        let registry = FieldRegistry::with_defaults();
        for kind in [
            "text", "email", "url", "number", "textarea", "select", "multi_select", "post",
            "multi_post", "product", "multi_product", "term", "multi_term", "code", "wysiwyg",
            "group", "multi_group", "title", "html",
        ] {
            assert!(registry.contains(kind), "missing {kind}");
        }
    }

    #[test]
    fn test_label_capability() {
        let registry = FieldRegistry::with_defaults();
        assert!(registry.resolve("title").unwrap().no_label());
        assert!(registry.resolve("html").unwrap().no_label());
        assert!(!registry.resolve("text").unwrap().no_label());
    }

    #[test]
    fn test_default_human_title_joins_lists() {
        let registry = FieldRegistry::with_defaults();
        let renderer = registry.resolve("multi_post").unwrap();
        let descriptor = FieldDescriptor::new("related", "multi_post");
        assert_eq!(renderer.human_title(&descriptor, &json!(["3", 4])), "3, 4");
        assert_eq!(renderer.human_title(&descriptor, &Value::Null), "");
    }
}
