use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{class_list, described_by, description, encode_hidden, hidden_input, is_top_level};
use crate::context::FormContext;
use crate::editor::Propagation;
use crate::markup::{Element, Node};
use crate::normalizer::FieldValue;
use crate::registry::{FieldEvent, FieldInstance, FieldRenderer, MountContext};
use crate::remote::{OptionQuery, OptionSource};
use crate::selection::SelectionList;
use crate::types::{is_truthy, value_key, FieldDescriptor, FieldOption};

/// Endpoint serving dynamic option lists for selects with a `list_type`.
const LIST_ENDPOINT: &str = "list";

/// Select from static options, or from a remote list when the descriptor
/// names a `list_type`.
#[derive(Debug, Clone)]
pub struct SelectField {
    multi: bool,
}

impl SelectField {
    pub fn new(multi: bool) -> Self {
        Self { multi }
    }

    fn is_multi(&self, descriptor: &FieldDescriptor) -> bool {
        self.multi || descriptor.is_multi
    }
}

/// Multi-select values are always lists.
fn shape(value: Value, multi: bool) -> Value {
    match (multi, value) {
        (true, Value::Array(items)) => Value::Array(items),
        (true, Value::Null) => Value::Array(Vec::new()),
        (true, scalar) => Value::Array(vec![scalar]),
        (false, value) => value,
    }
}

impl FieldRenderer for SelectField {
    fn human_title(&self, descriptor: &FieldDescriptor, value: &Value) -> String {
        let title_of = |v: &Value| match descriptor.find_option(v) {
            Some(option) => option.label.as_str().to_string(),
            None => value_key(v).unwrap_or_default(),
        };
        match value {
            Value::Array(items) => items
                .iter()
                .filter(|v| is_truthy(v))
                .map(title_of)
                .collect::<Vec<_>>()
                .join(", "),
            other => title_of(other),
        }
    }

    fn mount(&self, descriptor: &FieldDescriptor, ctx: MountContext) -> Box<dyn FieldInstance> {
        let multi = self.is_multi(descriptor);
        let initial = shape(ctx.form.normalize(descriptor), multi);
        let mut source = descriptor
            .extra_str("list_type")
            .map(|_| OptionSource::new(ctx.form.fetcher(), ctx.form.config().debounce()));
        if let Some(source) = source.as_mut() {
            source.query(OptionQuery::new(LIST_ENDPOINT, descriptor.to_config(), ""));
        }
        Box::new(SelectInstance {
            value: FieldValue::new(initial, ctx.on_change),
            form: ctx.form,
            multi,
            search: String::new(),
            config: descriptor.to_config(),
            source,
        })
    }
}

struct SelectInstance {
    form: Arc<FormContext>,
    value: Arc<FieldValue>,
    multi: bool,
    search: String,
    config: serde_json::Map<String, Value>,
    source: Option<OptionSource>,
}

impl SelectInstance {
    fn options(&self, descriptor: &FieldDescriptor) -> Vec<FieldOption> {
        match &self.source {
            Some(source) => source.options(),
            None => descriptor.options.clone().unwrap_or_default(),
        }
    }

    fn is_selected(&self, option: &FieldOption) -> bool {
        let key = option.key();
        match self.value.current() {
            Value::Array(items) => items.iter().any(|v| value_key(v).as_deref() == Some(&key)),
            other => value_key(&other).as_deref() == Some(&key),
        }
    }

    fn requery(&mut self) {
        let query = OptionQuery::new(LIST_ENDPOINT, self.config.clone(), self.search.clone());
        if let Some(source) = self.source.as_mut() {
            source.query_if_changed(query);
        }
    }
}

impl FieldInstance for SelectInstance {
    fn render(&mut self, descriptor: &FieldDescriptor) -> Node {
        self.value
            .receive_upstream(shape(self.form.normalize(descriptor), self.multi));
        self.config = descriptor.to_config();
        self.requery();

        let current = self.value.current();
        let mut nodes = Vec::new();

        if is_top_level(descriptor) {
            let encoded = if self.multi {
                let kept: Vec<Value> = current
                    .as_array()
                    .map(|items| items.iter().filter(|v| is_truthy(v)).cloned().collect())
                    .unwrap_or_default();
                Value::Array(kept).to_string()
            } else {
                encode_hidden(&current)
            };
            nodes.push(hidden_input(descriptor, encoded).into());
        }

        let options = self.options(descriptor);
        let select = Element::new("select")
            .attr("id", self.form.html_id(&descriptor.id))
            .attr("class", class_list("wcf-select", descriptor))
            .attr_opt("multiple", self.multi.then_some("multiple"))
            .attr_opt("required", descriptor.required.then_some("required"))
            .attr_opt("aria-describedby", described_by(descriptor))
            .attr_opt("data-list-type", descriptor.extra_str("list_type"))
            .children(options.iter().map(|option| {
                Node::from(
                    Element::new("option")
                        .attr("value", option.key())
                        .attr_opt("selected", self.is_selected(option).then_some("selected"))
                        .child(Node::raw(option.label.clone())),
                )
            }));
        nodes.push(select.into());
        nodes.push(description(descriptor));

        Node::Fragment(nodes)
    }

    fn value(&self) -> Value {
        self.value.current()
    }

    fn handle(&mut self, event: FieldEvent) -> Propagation {
        match event {
            FieldEvent::Input(value) => self.value.edit(shape(value, self.multi)),
            FieldEvent::Add(item) if self.multi => {
                let mut selection = SelectionList::from_value(&self.value.current(), true);
                if selection.add(&item) {
                    self.value.edit(selection.to_value());
                }
            }
            FieldEvent::Add(item) => self.value.edit(item),
            FieldEvent::Remove(item) if self.multi => {
                let mut selection = SelectionList::from_value(&self.value.current(), true);
                if selection.remove(&item) {
                    self.value.edit(selection.to_value());
                }
            }
            FieldEvent::Remove(item) => {
                if value_key(&self.value.current()) == value_key(&item) {
                    self.value.edit(Value::Null);
                }
            }
            FieldEvent::Search(search) => {
                self.search = search;
                self.requery();
            }
            other => debug!(?other, "select ignores event"),
        }
        Propagation::Continue
    }
}
