//! Group fields: nested descriptor lists rendered one level deeper.
//!
//! A `group` stores an object keyed by child id; a `multi_group` stores a list
//! of such objects, one per row. Children never persist on their own: only
//! the outermost group emits a hidden input, carrying the whole structure as
//! JSON.

use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::{class_list, description, hidden_input, is_top_level};
use crate::context::FormContext;
use crate::editor::Propagation;
use crate::group::{ChangeSink, FieldGroup};
use crate::markup::{Element, Node};
use crate::normalizer::{lock, FieldValue};
use crate::registry::{FieldEvent, FieldInstance, FieldRenderer, MountContext};
use crate::types::{value_key, FieldDescriptor};

fn as_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn as_rows(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows
            .into_iter()
            .map(|row| Value::Object(as_object(row)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Child descriptors with their values taken from the stored object.
fn child_items(descriptor: &FieldDescriptor, stored: &Map<String, Value>) -> Vec<FieldDescriptor> {
    descriptor
        .nested_items()
        .into_iter()
        .map(|mut item| {
            if let Some(value) = stored.get(&item.id) {
                item.value = value.clone();
            }
            item
        })
        .collect()
}

fn render_children(group: &mut FieldGroup, items: &[FieldDescriptor]) -> Vec<Node> {
    group.render(items).into_iter().map(|field| field.node).collect()
}

#[derive(Debug, Clone, Copy)]
pub struct GroupField;

impl FieldRenderer for GroupField {
    fn human_title(&self, descriptor: &FieldDescriptor, value: &Value) -> String {
        let stored = value.as_object().cloned().unwrap_or_default();
        descriptor
            .nested_items()
            .iter()
            .filter_map(|item| stored.get(&item.id).and_then(value_key))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn mount(&self, descriptor: &FieldDescriptor, ctx: MountContext) -> Box<dyn FieldInstance> {
        let initial = Value::Object(as_object(ctx.form.normalize(descriptor)));
        let value = FieldValue::new(initial, ctx.on_change);

        let target = value.clone();
        let sink: ChangeSink = Arc::new(move |id: &str, child_value: Value| {
            let mut stored = as_object(target.current());
            stored.insert(id.to_string(), child_value);
            target.edit(Value::Object(stored));
        });
        let group = FieldGroup::new(ctx.form.clone(), descriptor.group_level + 1, sink);

        Box::new(GroupInstance {
            form: ctx.form,
            value,
            group,
        })
    }
}

struct GroupInstance {
    form: Arc<FormContext>,
    value: Arc<FieldValue>,
    group: FieldGroup,
}

impl FieldInstance for GroupInstance {
    fn render(&mut self, descriptor: &FieldDescriptor) -> Node {
        self.value
            .receive_upstream(Value::Object(as_object(self.form.normalize(descriptor))));
        let stored = as_object(self.value.current());
        let children = render_children(&mut self.group, &child_items(descriptor, &stored));

        // children may have reported while rendering
        let mut nodes = Vec::new();
        if is_top_level(descriptor) {
            nodes.push(hidden_input(descriptor, self.value.current().to_string()).into());
        }
        nodes.push(
            Element::new("div")
                .attr("id", self.form.html_id(&descriptor.id))
                .attr("class", class_list("wcf-group", descriptor))
                .children(children)
                .into(),
        );
        nodes.push(description(descriptor));
        Node::Fragment(nodes)
    }

    fn value(&self) -> Value {
        self.value.current()
    }

    fn handle(&mut self, event: FieldEvent) -> Propagation {
        match event {
            FieldEvent::Nested { id, event } => self.group.dispatch(&id, *event),
            FieldEvent::Input(value) => {
                self.value.edit(Value::Object(as_object(value)));
                self.group.clear();
                Propagation::Continue
            }
            other => {
                debug!(?other, "group ignores event");
                Propagation::Continue
            }
        }
    }
}

/// Repeatable group: a list of rows, each row a nested group.
#[derive(Debug, Clone, Copy)]
pub struct RepeatableGroupField;

impl FieldRenderer for RepeatableGroupField {
    fn human_title(&self, descriptor: &FieldDescriptor, value: &Value) -> String {
        let rows = as_rows(value.clone());
        rows.iter()
            .map(|row| GroupField.human_title(descriptor, row))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn mount(&self, descriptor: &FieldDescriptor, ctx: MountContext) -> Box<dyn FieldInstance> {
        let initial = Value::Array(as_rows(ctx.form.normalize(descriptor)));
        Box::new(RepeatableInstance {
            value: FieldValue::new(initial, ctx.on_change),
            form: ctx.form,
            level: descriptor.group_level + 1,
            keys: Arc::new(Mutex::new(Vec::new())),
            rows: Vec::new(),
        })
    }
}

struct RepeatableInstance {
    form: Arc<FormContext>,
    value: Arc<FieldValue>,
    level: u32,
    /// Row identities in row order, shared with the row sinks
    keys: Arc<Mutex<Vec<Uuid>>>,
    rows: Vec<FieldGroup>,
}

impl RepeatableInstance {
    fn new_row(&self) -> (Uuid, FieldGroup) {
        let key = Uuid::new_v4();
        let keys = self.keys.clone();
        let target = self.value.clone();
        let sink: ChangeSink = Arc::new(move |id: &str, child_value: Value| {
            let Some(index) = lock(&keys).iter().position(|k| *k == key) else {
                return;
            };
            let mut rows = as_rows(target.current());
            if let Some(Value::Object(row)) = rows.get_mut(index) {
                row.insert(id.to_string(), child_value);
                target.edit(Value::Array(rows));
            }
        });
        (key, FieldGroup::new(self.form.clone(), self.level, sink))
    }

    /// Match the mounted rows to the stored row count.
    fn sync_rows(&mut self, count: usize) {
        while self.rows.len() < count {
            let (key, group) = self.new_row();
            lock(&self.keys).push(key);
            self.rows.push(group);
        }
        if self.rows.len() > count {
            self.rows.truncate(count);
            lock(&self.keys).truncate(count);
        }
    }

    fn row_index(value: &Value) -> Option<usize> {
        value_key(value)?.parse().ok()
    }
}

impl FieldInstance for RepeatableInstance {
    fn render(&mut self, descriptor: &FieldDescriptor) -> Node {
        self.value
            .receive_upstream(Value::Array(as_rows(self.form.normalize(descriptor))));
        let stored = as_rows(self.value.current());
        self.sync_rows(stored.len());

        let rows: Vec<Node> = self
            .rows
            .iter_mut()
            .zip(&stored)
            .enumerate()
            .map(|(index, (group, row))| {
                let row = row.as_object().cloned().unwrap_or_default();
                let remove = Element::new("button")
                    .attr("type", "button")
                    .attr("class", "wcf-multi-group__remove")
                    .attr("data-row", index.to_string())
                    .child(Node::text("×"));
                Node::from(
                    Element::new("div")
                        .attr("class", "wcf-multi-group__row")
                        .attr("data-row", index.to_string())
                        .children(render_children(group, &child_items(descriptor, &row)))
                        .child(remove),
                )
            })
            .collect();

        let mut nodes = Vec::new();
        if is_top_level(descriptor) {
            nodes.push(hidden_input(descriptor, self.value.current().to_string()).into());
        }
        nodes.push(
            Element::new("div")
                .attr("id", self.form.html_id(&descriptor.id))
                .attr("class", class_list("wcf-group wcf-multi-group", descriptor))
                .children(rows)
                .child(
                    Element::new("button")
                        .attr("type", "button")
                        .attr("class", "wcf-multi-group__add button")
                        .child(Node::text("+")),
                )
                .into(),
        );
        nodes.push(description(descriptor));
        Node::Fragment(nodes)
    }

    fn value(&self) -> Value {
        self.value.current()
    }

    fn handle(&mut self, event: FieldEvent) -> Propagation {
        match event {
            FieldEvent::Add(row) => {
                let mut rows = as_rows(self.value.current());
                rows.push(Value::Object(as_object(row)));
                let count = rows.len();
                self.value.edit(Value::Array(rows));
                self.sync_rows(count);
            }
            FieldEvent::Remove(index) => {
                let mut rows = as_rows(self.value.current());
                match Self::row_index(&index).filter(|i| *i < rows.len()) {
                    Some(i) => {
                        rows.remove(i);
                        self.rows.remove(i);
                        lock(&self.keys).remove(i);
                        self.value.edit(Value::Array(rows));
                    }
                    None => debug!(%index, "no such row"),
                }
            }
            FieldEvent::Nested { id, event } => {
                let row = id.parse::<usize>().ok().and_then(|i| self.rows.get_mut(i));
                match (row, *event) {
                    (Some(group), FieldEvent::Nested { id, event }) => {
                        return group.dispatch(&id, *event);
                    }
                    (_, other) => debug!(row = %id, ?other, "unroutable row event"),
                }
            }
            FieldEvent::Input(value) => {
                let rows = as_rows(value);
                let count = rows.len();
                self.value.edit(Value::Array(rows));
                self.rows.clear();
                lock(&self.keys).clear();
                self.sync_rows(count);
            }
            other => debug!(?other, "repeatable group ignores event"),
        }
        Propagation::Continue
    }
}
