use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use super::{class_list, description, hidden_input, text_of};
use crate::context::FormContext;
use crate::editor::{EditorAdapter, EditorKind, Propagation, SyncMode};
use crate::markup::{Element, Node};
use crate::normalizer::FieldValue;
use crate::registry::{FieldEvent, FieldInstance, FieldRenderer, MountContext};
use crate::types::FieldDescriptor;

static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Rich-text editor field.
///
/// The widget doesn't emit reliable change events, so its content is polled
/// on the configured interval; the hidden input carries the value.
#[derive(Debug, Clone, Copy)]
pub struct WysiwygField;

impl FieldRenderer for WysiwygField {
    fn human_title(&self, _descriptor: &FieldDescriptor, value: &Value) -> String {
        let html = text_of(value);
        let stripped = TAGS.replace_all(&html, "");
        WHITESPACE.replace_all(&stripped, " ").trim().to_string()
    }

    fn mount(&self, descriptor: &FieldDescriptor, ctx: MountContext) -> Box<dyn FieldInstance> {
        let value = FieldValue::new(ctx.form.normalize(descriptor), ctx.on_change);
        let editor = EditorAdapter::mount(
            ctx.form.editor_host(),
            EditorKind::RichText,
            None,
            value.clone(),
            SyncMode::Poll(ctx.form.config().poll_interval()),
        );
        Box::new(WysiwygInstance {
            form: ctx.form,
            value,
            editor,
        })
    }
}

struct WysiwygInstance {
    form: Arc<FormContext>,
    value: Arc<FieldValue>,
    editor: EditorAdapter,
}

impl FieldInstance for WysiwygInstance {
    fn render(&mut self, descriptor: &FieldDescriptor) -> Node {
        self.value.receive_upstream(self.form.normalize(descriptor));
        let binding = self.editor.binding();

        let hidden = hidden_input(descriptor, text_of(&self.value.current()))
            .attr("id", self.form.html_id(&descriptor.id))
            .attrs(descriptor.custom_attributes.clone());

        let wrapper = Element::new("div")
            .attr("class", class_list("wcf-tinymce-wrapper", descriptor))
            .child(
                Element::new("div")
                    .attr("id", binding.toolbar_id())
                    .attr("class", "block-library-classic__toolbar"),
            )
            .child(
                Element::new("div")
                    .attr("id", binding.editor_id())
                    .attr("class", "wp-block-freeform block-library-rich-text__tinymce"),
            );

        Node::Fragment(vec![hidden.into(), wrapper.into(), description(descriptor)])
    }

    fn value(&self) -> Value {
        self.value.current()
    }

    fn handle(&mut self, event: FieldEvent) -> Propagation {
        match event {
            FieldEvent::Key(key) => self.editor.handle_key(&key),
            FieldEvent::Input(value) => {
                self.editor.widget().set_content(&text_of(&value));
                self.value.edit(value);
                Propagation::Continue
            }
            _ => Propagation::Continue,
        }
    }
}
