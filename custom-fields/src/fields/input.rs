use std::sync::Arc;

use serde_json::Value;

use super::{class_list, described_by, description, is_top_level, text_of};
use crate::context::FormContext;
use crate::editor::Propagation;
use crate::markup::{Element, Node};
use crate::normalizer::FieldValue;
use crate::registry::{FieldEvent, FieldInstance, FieldRenderer, MountContext};
use crate::types::FieldDescriptor;

/// Single-line `<input>` of a given HTML input type.
#[derive(Debug, Clone)]
pub struct InputField {
    input_type: &'static str,
}

impl InputField {
    pub fn new(input_type: &'static str) -> Self {
        Self { input_type }
    }
}

impl FieldRenderer for InputField {
    fn mount(&self, descriptor: &FieldDescriptor, ctx: MountContext) -> Box<dyn FieldInstance> {
        Box::new(TextInstance::mount(descriptor, ctx, Control::Input(self.input_type)))
    }
}

/// Multi-line `<textarea>`.
#[derive(Debug, Clone, Copy)]
pub struct TextareaField;

impl FieldRenderer for TextareaField {
    fn mount(&self, descriptor: &FieldDescriptor, ctx: MountContext) -> Box<dyn FieldInstance> {
        Box::new(TextInstance::mount(descriptor, ctx, Control::Textarea))
    }
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Input(&'static str),
    Textarea,
}

/// The input element itself carries the name, so it is the persistence entry.
struct TextInstance {
    form: Arc<FormContext>,
    value: Arc<FieldValue>,
    control: Control,
}

impl TextInstance {
    fn mount(descriptor: &FieldDescriptor, ctx: MountContext, control: Control) -> Self {
        let initial = ctx.form.normalize(descriptor);
        Self {
            value: FieldValue::new(initial, ctx.on_change),
            form: ctx.form,
            control,
        }
    }
}

impl FieldInstance for TextInstance {
    fn render(&mut self, descriptor: &FieldDescriptor) -> Node {
        self.value.receive_upstream(self.form.normalize(descriptor));
        let current = text_of(&self.value.current());

        let element = match self.control {
            Control::Input(input_type) => Element::new("input")
                .attr("type", input_type)
                .attr("value", current),
            Control::Textarea => Element::new("textarea")
                .attr("rows", "5")
                .child(Node::text(current)),
        };

        let element = element
            .attr("id", self.form.html_id(&descriptor.id))
            .attr_opt("name", is_top_level(descriptor).then(|| descriptor.id.clone()))
            .attr("class", class_list("regular-text", descriptor))
            .attr_opt("aria-describedby", described_by(descriptor))
            .attr_opt("required", descriptor.required.then_some("required"))
            .attrs(descriptor.custom_attributes.clone());

        Node::Fragment(vec![element.into(), description(descriptor)])
    }

    fn value(&self) -> Value {
        self.value.current()
    }

    fn handle(&mut self, event: FieldEvent) -> Propagation {
        if let FieldEvent::Input(value) = event {
            self.value.edit(value);
        }
        Propagation::Continue
    }
}
