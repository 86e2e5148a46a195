use std::sync::Arc;

use serde_json::Value;

use super::{class_list, described_by, description, is_top_level, text_of};
use crate::context::FormContext;
use crate::editor::{EditorAdapter, EditorKind, Propagation, SyncMode};
use crate::markup::{Element, Node};
use crate::normalizer::FieldValue;
use crate::registry::{FieldEvent, FieldInstance, FieldRenderer, MountContext};
use crate::types::FieldDescriptor;

/// Textarea upgraded to a code editor. The editor reports changes itself.
#[derive(Debug, Clone, Copy)]
pub struct CodeField;

impl FieldRenderer for CodeField {
    fn mount(&self, descriptor: &FieldDescriptor, ctx: MountContext) -> Box<dyn FieldInstance> {
        let mode = descriptor.extra_str("mode").map(str::to_string);
        let value = FieldValue::new(ctx.form.normalize(descriptor), ctx.on_change);
        let editor = EditorAdapter::mount(
            ctx.form.editor_host(),
            EditorKind::Code { mode: mode.clone() },
            ctx.form.config().code_editor_settings_for(mode.as_deref()),
            value.clone(),
            SyncMode::Events,
        );
        Box::new(CodeInstance {
            form: ctx.form,
            value,
            editor,
        })
    }
}

struct CodeInstance {
    form: Arc<FormContext>,
    value: Arc<FieldValue>,
    editor: EditorAdapter,
}

impl FieldInstance for CodeInstance {
    fn render(&mut self, descriptor: &FieldDescriptor) -> Node {
        self.value.receive_upstream(self.form.normalize(descriptor));

        let textarea = Element::new("textarea")
            .attr("id", self.form.html_id(&descriptor.id))
            .attr_opt("name", is_top_level(descriptor).then(|| descriptor.id.clone()))
            .attr_opt("aria-describedby", described_by(descriptor))
            .attr("class", class_list("large-text", descriptor))
            .attr("rows", "10")
            .attr("cols", "50")
            .attr("data-editor", self.editor.binding().editor_id())
            .attrs(descriptor.custom_attributes.clone())
            .child(Node::text(text_of(&self.value.current())));

        Node::Fragment(vec![textarea.into(), description(descriptor)])
    }

    fn value(&self) -> Value {
        self.value.current()
    }

    fn handle(&mut self, event: FieldEvent) -> Propagation {
        match event {
            FieldEvent::Input(value) => {
                self.editor.widget().set_content(&text_of(&value));
                self.value.edit(value);
                Propagation::Continue
            }
            FieldEvent::Key(key) => self.editor.handle_key(&key),
            _ => Propagation::Continue,
        }
    }
}
