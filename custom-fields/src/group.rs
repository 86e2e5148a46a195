//! Group renderer: expands a list of descriptors into rendered fields.
//!
//! One registry lookup per descriptor, in descriptor order, which is also the
//! on-screen order. Mounted instances are kept per id across render passes
//! and unmounted when their id (or type) disappears from the list.
//!
//! A descriptor whose type can't be resolved renders an inert placeholder;
//! the remaining fields render normally.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::FormContext;
use crate::editor::Propagation;
use crate::error::FieldsError;
use crate::markup::{Element, Node};
use crate::registry::{FieldEvent, FieldInstance, MountContext};
use crate::types::FieldDescriptor;

/// Receives `(field id, value)` for every value change in a group.
pub type ChangeSink = Arc<dyn Fn(&str, Value) + Send + Sync>;

/// One rendered descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedField {
    pub id: String,
    pub field_type: String,
    pub node: Node,
    /// Set when the type could not be resolved
    pub placeholder: bool,
}

impl RenderedField {
    fn placeholder(descriptor: &FieldDescriptor, error: &FieldsError) -> Self {
        let node = Element::new("div")
            .attr("class", "wcf-field-error")
            .attr("data-field-id", &descriptor.id)
            .attr("data-field-type", &descriptor.field_type)
            .child(Node::text(error.to_string()))
            .into();
        Self {
            id: descriptor.id.clone(),
            field_type: descriptor.field_type.clone(),
            node,
            placeholder: true,
        }
    }
}

/// Serialize rendered fields to HTML, one field after another.
pub fn to_html(fields: &[RenderedField]) -> String {
    fields.iter().map(|f| f.node.to_html()).collect()
}

struct Slot {
    field_type: String,
    instance: Box<dyn FieldInstance>,
}

/// The mounted fields of one group level.
pub struct FieldGroup {
    ctx: Arc<FormContext>,
    level: u32,
    sink: ChangeSink,
    slots: IndexMap<String, Slot>,
}

impl FieldGroup {
    pub fn new(ctx: Arc<FormContext>, level: u32, sink: ChangeSink) -> Self {
        Self {
            ctx,
            level,
            sink,
            slots: IndexMap::new(),
        }
    }

    /// Top-level group whose changes go to `sink`.
    pub fn root(ctx: Arc<FormContext>, sink: ChangeSink) -> Self {
        Self::new(ctx, 0, sink)
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Render one pass over `items`.
    pub fn render(&mut self, items: &[FieldDescriptor]) -> Vec<RenderedField> {
        let mut previous = std::mem::take(&mut self.slots);
        let mut rendered = Vec::with_capacity(items.len());

        for item in items {
            let mut descriptor = item.clone();
            descriptor.group_level = self.level.max(item.group_level);

            let renderer = match self.ctx.registry().resolve(&descriptor.field_type) {
                Ok(renderer) => renderer,
                Err(e) => {
                    warn!(field = %descriptor.id, error = %e, "rendering placeholder");
                    rendered.push(RenderedField::placeholder(&descriptor, &e));
                    continue;
                }
            };

            let mut slot = match previous.shift_remove(&descriptor.id) {
                Some(slot) if slot.field_type == descriptor.field_type => slot,
                _ => {
                    debug!(field = %descriptor.id, field_type = %descriptor.field_type, level = self.level, "mounting field");
                    Slot {
                        field_type: descriptor.field_type.clone(),
                        instance: renderer.mount(&descriptor, self.mount_context(&descriptor.id)),
                    }
                }
            };

            let body = slot.instance.render(&descriptor);
            let node = if renderer.no_label() {
                body
            } else {
                Node::Fragment(vec![
                    Element::new("label")
                        .attr("for", self.ctx.html_id(&descriptor.id))
                        .child(Node::raw(descriptor.title.clone()))
                        .into(),
                    Element::new("br").into(),
                    body,
                ])
            };

            rendered.push(RenderedField {
                id: descriptor.id.clone(),
                field_type: descriptor.field_type.clone(),
                node,
                placeholder: false,
            });
            self.slots.insert(descriptor.id, slot);
        }

        if !previous.is_empty() {
            debug!(count = previous.len(), level = self.level, "unmounting fields");
        }
        rendered
    }

    fn mount_context(&self, id: &str) -> MountContext {
        let sink = self.sink.clone();
        let id = id.to_string();
        MountContext {
            form: self.ctx.clone(),
            on_change: Arc::new(move |value| sink(&id, value)),
        }
    }

    /// Route an event to a mounted field.
    pub fn dispatch(&mut self, id: &str, event: FieldEvent) -> Propagation {
        match self.slots.get_mut(id) {
            Some(slot) => slot.instance.handle(event),
            None => {
                debug!(field = id, "event for unmounted field ignored");
                Propagation::Continue
            }
        }
    }

    /// Current value of a mounted field.
    pub fn value_of(&self, id: &str) -> Option<Value> {
        self.slots.get(id).map(|slot| slot.instance.value())
    }

    /// Current values of all mounted fields, in render order.
    pub fn values(&self) -> Map<String, Value> {
        self.slots
            .iter()
            .map(|(id, slot)| (id.clone(), slot.instance.value()))
            .collect()
    }

    /// Unmount every field. The next pass mounts them afresh.
    pub fn clear(&mut self) {
        if !self.slots.is_empty() {
            debug!(count = self.slots.len(), level = self.level, "unmounting fields");
        }
        self.slots.clear();
    }

    pub fn mounted_ids(&self) -> Vec<&str> {
        self.slots.keys().map(String::as_str).collect()
    }
}
