use serde_json::Value;

use super::{class_list, description};
use crate::markup::{Element, Node, TrustedMarkup};
use crate::registry::{FieldInstance, FieldRenderer, MountContext};
use crate::types::FieldDescriptor;

/// Section heading. Carries no value.
#[derive(Debug, Clone, Copy)]
pub struct TitleBlock;

impl FieldRenderer for TitleBlock {
    fn no_label(&self) -> bool {
        true
    }

    fn human_title(&self, _descriptor: &FieldDescriptor, _value: &Value) -> String {
        String::new()
    }

    fn mount(&self, _descriptor: &FieldDescriptor, _ctx: MountContext) -> Box<dyn FieldInstance> {
        Box::new(StaticInstance(|descriptor| {
            Node::Fragment(vec![
                Element::new("h2")
                    .attr("class", class_list("wcf-title", descriptor))
                    .child(Node::raw(descriptor.title.clone()))
                    .into(),
                description(descriptor),
            ])
        }))
    }
}

/// Free-form markup from the descriptor's `content`. Carries no value.
#[derive(Debug, Clone, Copy)]
pub struct HtmlBlock;

impl FieldRenderer for HtmlBlock {
    fn no_label(&self) -> bool {
        true
    }

    fn human_title(&self, _descriptor: &FieldDescriptor, _value: &Value) -> String {
        String::new()
    }

    fn mount(&self, _descriptor: &FieldDescriptor, _ctx: MountContext) -> Box<dyn FieldInstance> {
        Box::new(StaticInstance(|descriptor| {
            let content = descriptor.extra_str("content").unwrap_or_default();
            Element::new("div")
                .attr("class", class_list("wcf-html", descriptor))
                .child(Node::raw(TrustedMarkup::new(content)))
                .into()
        }))
    }
}

struct StaticInstance(fn(&FieldDescriptor) -> Node);

impl FieldInstance for StaticInstance {
    fn render(&mut self, descriptor: &FieldDescriptor) -> Node {
        (self.0)(descriptor)
    }

    fn value(&self) -> Value {
        Value::Null
    }
}
