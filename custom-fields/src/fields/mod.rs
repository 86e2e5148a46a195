//! Built-in field kinds.

mod code;
mod group;
mod input;
mod remote_select;
mod select;
mod static_block;
mod wysiwyg;

pub use code::CodeField;
pub use group::{GroupField, RepeatableGroupField};
pub use input::{InputField, TextareaField};
pub use remote_select::{remote_endpoint, RemoteSelectField};
pub use select::SelectField;
pub use static_block::{HtmlBlock, TitleBlock};
pub use wysiwyg::WysiwygField;

use serde_json::Value;

use crate::markup::{Element, Node, TrustedMarkup};
use crate::registry::FieldRegistry;
use crate::types::FieldDescriptor;

/// Register every built-in kind.
pub fn register_defaults(registry: &mut FieldRegistry) {
    for input_type in ["text", "email", "url", "number"] {
        registry.register(input_type, InputField::new(input_type));
    }
    registry.register("textarea", TextareaField);
    registry.register("select", SelectField::new(false));
    registry.register("multi_select", SelectField::new(true));
    for (kind, endpoint) in [("post", "posts"), ("product", "products"), ("term", "terms")] {
        registry.register(kind, RemoteSelectField::new(endpoint, false));
        registry.register(format!("multi_{kind}"), RemoteSelectField::new(endpoint, true));
    }
    registry.register("code", CodeField);
    registry.register("wysiwyg", WysiwygField);
    registry.register("group", GroupField);
    registry.register("multi_group", RepeatableGroupField);
    registry.register("title", TitleBlock);
    registry.register("html", HtmlBlock);
}

/// Whether a descriptor persists its own hidden input.
pub(crate) fn is_top_level(descriptor: &FieldDescriptor) -> bool {
    descriptor.group_level == 0
}

/// Hidden input value for a stored value: JSON for lists and objects, the
/// plain value otherwise.
pub(crate) fn encode_hidden(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
        other => other.to_string(),
    }
}

/// Plain string content of a value, for text inputs and editors.
pub(crate) fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Hidden persistence input, named only at the top level.
pub(crate) fn hidden_input(descriptor: &FieldDescriptor, value: String) -> Element {
    Element::new("input")
        .attr("type", "hidden")
        .attr_opt("name", is_top_level(descriptor).then(|| descriptor.id.clone()))
        .attr("value", value)
}

pub(crate) fn description_id(descriptor: &FieldDescriptor) -> String {
    format!("{}-description", descriptor.id)
}

pub(crate) fn description(descriptor: &FieldDescriptor) -> Node {
    match &descriptor.description {
        Some(markup) if !markup.is_empty() => Element::new("p")
            .attr("class", "description")
            .attr("id", description_id(descriptor))
            .child(Node::raw(markup.clone()))
            .into(),
        _ => Node::empty(),
    }
}

/// `aria-describedby` target, when the descriptor has a description.
pub(crate) fn described_by(descriptor: &FieldDescriptor) -> Option<String> {
    descriptor
        .description
        .as_ref()
        .filter(|d| !d.is_empty())
        .map(|_| description_id(descriptor))
}

/// `class` attribute: the base classes plus the schema's `className`.
pub(crate) fn class_list(base: &str, descriptor: &FieldDescriptor) -> String {
    match descriptor.class_name() {
        Some(extra) if !extra.is_empty() && !base.is_empty() => format!("{base} {extra}"),
        Some(extra) if !extra.is_empty() => extra.to_string(),
        _ => base.to_string(),
    }
}

pub(crate) fn trusted_or_empty(markup: Option<&TrustedMarkup>) -> Node {
    markup.cloned().map(Node::raw).unwrap_or_else(Node::empty)
}
