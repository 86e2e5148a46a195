//! Searchable selects whose options come from a remote endpoint
//! (posts, products, terms).
//!
//! The stored value is always a list of identifiers; single selects announce
//! its first entry instead. Selected entries are shown in selection order and
//! can be removed or drag-reordered; the dropdown only offers options that
//! aren't selected yet. Selected ids missing from the latest result stay
//! selected but aren't displayed.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use super::{class_list, described_by, description, hidden_input, is_top_level, trusted_or_empty};
use crate::context::FormContext;
use crate::editor::Propagation;
use crate::markup::{Element, Node};
use crate::normalizer::FieldValue;
use crate::registry::{FieldEvent, FieldInstance, FieldRenderer, MountContext};
use crate::remote::{OptionQuery, OptionSource};
use crate::selection::SelectionList;
use crate::types::{is_truthy, FieldDescriptor, FieldOption};

/// Remote endpoint for a remote select kind (`post`, `multi_term`, ...).
pub fn remote_endpoint(field_type: &str) -> Option<&'static str> {
    match field_type.strip_prefix("multi_").unwrap_or(field_type) {
        "post" => Some("posts"),
        "product" => Some("products"),
        "term" => Some("terms"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct RemoteSelectField {
    endpoint: &'static str,
    multi: bool,
}

impl RemoteSelectField {
    pub fn new(endpoint: &'static str, multi: bool) -> Self {
        Self { endpoint, multi }
    }
}

fn first_truthy(value: &Value) -> Value {
    value
        .as_array()
        .and_then(|items| items.iter().find(|v| is_truthy(v)).cloned())
        .unwrap_or(Value::Null)
}

impl FieldRenderer for RemoteSelectField {
    fn mount(&self, descriptor: &FieldDescriptor, ctx: MountContext) -> Box<dyn FieldInstance> {
        let multi = self.multi || descriptor.is_multi;
        let initial = SelectionList::from_value(&ctx.form.normalize(descriptor), multi).to_value();
        let project: fn(&Value) -> Value = if multi { Value::clone } else { first_truthy };

        let mut source = OptionSource::new(ctx.form.fetcher(), ctx.form.config().debounce());
        let config = descriptor.to_config();
        source.query(OptionQuery::new(self.endpoint, config.clone(), ""));
        debug!(field = %descriptor.id, endpoint = self.endpoint, multi, "remote select mounted");

        Box::new(RemoteSelectInstance {
            value: FieldValue::with_projection(initial, ctx.on_change, project),
            form: ctx.form,
            endpoint: self.endpoint,
            multi,
            search: String::new(),
            config,
            source,
        })
    }
}

struct RemoteSelectInstance {
    form: Arc<FormContext>,
    value: Arc<FieldValue>,
    endpoint: &'static str,
    multi: bool,
    search: String,
    config: Map<String, Value>,
    source: OptionSource,
}

impl RemoteSelectInstance {
    fn selection(&self) -> SelectionList {
        SelectionList::from_value(&self.value.current(), self.multi)
    }

    fn commit(&self, selection: &SelectionList) {
        self.value.edit(selection.to_value());
    }

    fn query(&self) -> OptionQuery {
        OptionQuery::new(self.endpoint, self.config.clone(), self.search.clone())
    }

    fn render_selected(&self, selection: &SelectionList, options: &[FieldOption]) -> Node {
        let movable = selection.len() > 1;
        let items = selection.selected_options(options).into_iter().map(|option| {
            let key = option.key();
            let header = Element::new("div")
                .attr("class", "wcf-post-selected__item-header")
                .child(if movable {
                    Node::from(
                        Element::new("span")
                            .attr("class", "wcf-move-button")
                            .attr("aria-hidden", "true"),
                    )
                } else {
                    Node::empty()
                })
                .child(Element::new("strong").child(Node::raw(option.label.clone())))
                .child(
                    Element::new("button")
                        .attr("type", "button")
                        .attr("class", "wcf-close-button")
                        .attr("data-remove", key.clone())
                        .child(Node::text("×")),
                );
            Node::from(
                Element::new("div")
                    .attr("class", "wcf-post-selected__item")
                    .attr("data-value", key)
                    .child(header)
                    .child(Element::new("p").child(trusted_or_empty(option.excerpt.as_ref()))),
            )
        });
        Element::new("div")
            .attr("class", "wcf-post-selected")
            .children(items)
            .into()
    }
}

impl FieldInstance for RemoteSelectInstance {
    fn render(&mut self, descriptor: &FieldDescriptor) -> Node {
        let upstream = SelectionList::from_value(&self.form.normalize(descriptor), self.multi);
        self.value.receive_upstream(upstream.to_value());
        self.config = descriptor.to_config();
        self.source.query_if_changed(self.query());

        let selection = self.selection();
        let options = self.source.options();
        let mut nodes = Vec::new();

        if is_top_level(descriptor) {
            let encoded = if self.multi {
                selection.to_value().to_string()
            } else {
                selection.first().unwrap_or_default().to_string()
            };
            nodes.push(hidden_input(descriptor, encoded).into());
        }

        let dropdown = Element::new("ul")
            .attr("class", "wcf-remote-select__options")
            .attr("role", "listbox")
            .children(selection.unselected_options(&options).into_iter().map(|option| {
                Node::from(
                    Element::new("li")
                        .attr("role", "option")
                        .attr("data-value", option.key())
                        .child(Node::raw(option.label.clone())),
                )
            }));

        nodes.push(
            Element::new("div")
                .attr("class", class_list("wcf-remote-select", descriptor))
                .attr("data-endpoint", self.endpoint)
                .child(
                    Element::new("input")
                        .attr("type", "search")
                        .attr("id", self.form.html_id(&descriptor.id))
                        .attr("value", self.search.clone())
                        .attr("autocomplete", "off")
                        .attr_opt("aria-describedby", described_by(descriptor))
                        .attr_opt("required", (descriptor.required && selection.is_empty()).then_some("required")),
                )
                .child(dropdown)
                .into(),
        );
        nodes.push(description(descriptor));
        nodes.push(self.render_selected(&selection, &options));

        Node::Fragment(nodes)
    }

    fn value(&self) -> Value {
        let current = self.value.current();
        if self.multi {
            current
        } else {
            first_truthy(&current)
        }
    }

    fn handle(&mut self, event: FieldEvent) -> Propagation {
        let mut selection = self.selection();
        match event {
            FieldEvent::Search(search) => {
                self.search = search;
                self.source.query(self.query());
            }
            FieldEvent::Add(item) => {
                if selection.add(&item) {
                    self.commit(&selection);
                }
            }
            FieldEvent::Remove(item) => {
                if selection.remove(&item) {
                    self.commit(&selection);
                }
            }
            FieldEvent::Reorder(order) => match selection.move_to(&order) {
                Ok(()) => self.commit(&selection),
                Err(e) => debug!(error = %e, "ignoring reorder"),
            },
            FieldEvent::Input(value) => {
                selection.replace(&value);
                self.commit(&selection);
            }
            other => debug!(?other, "remote select ignores event"),
        }
        Propagation::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldsConfig;
    use crate::normalizer::OnChange;
    use crate::remote::OptionFetcher;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves a fixed catalogue filtered by the search text.
    struct Catalogue {
        calls: Mutex<Vec<OptionQuery>>,
    }

    impl Catalogue {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl OptionFetcher for Catalogue {
        async fn fetch(&self, query: &OptionQuery) -> crate::Result<Vec<FieldOption>> {
            self.calls.lock().unwrap().push(query.clone());
            Ok([(1, "Alpha"), (2, "Beta"), (3, "Gamma")]
                .into_iter()
                .filter(|(_, label)| label.to_lowercase().contains(&query.search))
                .map(|(id, label)| FieldOption::new(id, label).with_excerpt(format!("<i>{label}</i>")))
                .collect())
        }
    }

    fn mount(
        kind: &RemoteSelectField,
        descriptor: &FieldDescriptor,
        catalogue: Arc<Catalogue>,
    ) -> (Box<dyn FieldInstance>, Arc<Mutex<Vec<Value>>>) {
        let form = FormContext::builder(FieldsConfig::default())
            .with_fetcher(catalogue)
            .build();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let on_change: OnChange = Arc::new(move |v| sink.lock().unwrap().push(v));
        (kind.mount(descriptor, MountContext { form, on_change }), seen)
    }

    fn labels(node: &Node, class: &str) -> Vec<String> {
        node.elements()
            .into_iter()
            .filter(|e| e.get_attr("class") == Some(class))
            .filter_map(|e| e.get_attr("data-value").map(str::to_string))
            .collect()
    }

    fn dropdown(node: &Node) -> Vec<String> {
        node.elements()
            .into_iter()
            .filter(|e| e.tag == "li")
            .filter_map(|e| e.get_attr("data-value").map(str::to_string))
            .collect()
    }

    #[test]
    fn test_remote_endpoint_mapping() {
        assert_eq!(remote_endpoint("post"), Some("posts"));
        assert_eq!(remote_endpoint("multi_product"), Some("products"));
        assert_eq!(remote_endpoint("multi_term"), Some("terms"));
        assert_eq!(remote_endpoint("select"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_selected_follow_selection_order_and_dropdown_excludes_them() {
        let catalogue = Catalogue::new();
        let descriptor = FieldDescriptor::new("related", "multi_post")
            .with_value(json!([3, "1", 9]))
            .with_extra("post_type", "page");
        let (mut field, seen) = mount(&RemoteSelectField::new("posts", true), &descriptor, catalogue.clone());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let node = field.render(&descriptor);

        // 9 is not in the result: still selected, not displayed
        assert_eq!(labels(&node, "wcf-post-selected__item"), vec!["3", "1"]);
        assert_eq!(dropdown(&node), vec!["2"]);
        assert_eq!(node.hidden_inputs()[0].get_attr("value"), Some(r#"["3","1","9"]"#));
        assert!(node.to_html().contains("<p><i>Gamma</i></p>"));
        assert_eq!(node.elements().iter().filter(|e| e.get_attr("class") == Some("wcf-move-button")).count(), 2);
        assert!(seen.lock().unwrap().is_empty());

        let calls = catalogue.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].endpoint, "posts");
        assert_eq!(calls[0].config["post_type"], json!("page"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_remove_and_reorder() {
        let descriptor = FieldDescriptor::new("related", "multi_post").with_value(json!(["1"]));
        let (mut field, seen) = mount(&RemoteSelectField::new("posts", true), &descriptor, Catalogue::new());

        field.handle(FieldEvent::Add(json!(2)));
        field.handle(FieldEvent::Add(json!("2")));
        field.handle(FieldEvent::Add(json!(3)));
        field.handle(FieldEvent::Reorder(vec![json!({"chosen": true}), json!("1")]));
        field.handle(FieldEvent::Reorder(vec![json!("3"), json!("1"), json!("2")]));
        field.handle(FieldEvent::Remove(json!(1)));
        field.handle(FieldEvent::Remove(json!(1)));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                json!(["1", "2"]),
                json!(["1", "2", "3"]),
                json!(["3", "1", "2"]),
                json!(["3", "2"]),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_select_announces_scalar() {
        let descriptor = FieldDescriptor::new("product", "product").with_value(5);
        let (mut field, seen) = mount(&RemoteSelectField::new("products", false), &descriptor, Catalogue::new());
        assert_eq!(field.value(), json!("5"));

        field.handle(FieldEvent::Add(json!(7)));
        field.handle(FieldEvent::Remove(json!(7)));
        assert_eq!(*seen.lock().unwrap(), vec![json!("7"), Value::Null]);

        let node = field.render(&descriptor);
        assert_eq!(node.hidden_inputs()[0].get_attr("value"), Some(""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_is_debounced_and_narrows_dropdown() {
        let catalogue = Catalogue::new();
        let descriptor = FieldDescriptor::new("tag", "multi_term").with_extra("taxonomy", "post_tag");
        let (mut field, _) = mount(&RemoteSelectField::new("terms", true), &descriptor, catalogue.clone());

        for search in ["g", "ga", "gam"] {
            field.handle(FieldEvent::Search(search.into()));
            tokio::time::advance(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;

        let searches: Vec<_> = catalogue.calls.lock().unwrap().iter().map(|q| q.search.clone()).collect();
        assert_eq!(searches, vec!["gam"]);
        let node = field.render(&descriptor);
        assert_eq!(dropdown(&node), vec!["3"]);
        assert_eq!(catalogue.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_nested_remote_select_has_no_persistence_entry() {
        let descriptor = FieldDescriptor::new("related", "multi_post")
            .with_value(json!(["1"]))
            .at_level(2);
        let (mut field, _) = mount(&RemoteSelectField::new("posts", true), &descriptor, Catalogue::new());
        let node = field.render(&descriptor);
        assert!(node.hidden_inputs().is_empty());
        assert!(node.form_entries().is_empty());
    }
}
