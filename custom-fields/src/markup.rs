//! Virtual markup tree produced by field renderers.
//!
//! Renderers build [`Node`] trees instead of strings. Plain text and attribute
//! values are escaped on serialization; [`TrustedMarkup`] is emitted verbatim.
//!
//! # Trust boundary
//!
//! Titles, descriptions and option labels arrive from the form schema as
//! markup and are rendered without escaping. Whoever produces the schema is
//! responsible for sanitizing it. Never wrap user input in `TrustedMarkup`.

use serde::{Deserialize, Serialize};

/// Markup that is emitted as-is, without escaping.
///
/// Plain text never becomes trusted and schema markup never gets escaped
/// without going through this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustedMarkup(String);

impl TrustedMarkup {
    /// Wrap markup that the caller vouches for.
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for TrustedMarkup {
    fn from(markup: &str) -> Self {
        Self::new(markup)
    }
}

impl From<String> for TrustedMarkup {
    fn from(markup: String) -> Self {
        Self(markup)
    }
}

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link"];

/// A single element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Set an attribute, replacing an earlier value of the same name.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.attrs.push((name, value)),
        }
        self
    }

    /// Set an attribute only when a value is present.
    pub fn attr_opt(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.attr(name, value),
            None => self,
        }
    }

    pub fn attrs<I, K, V>(self, attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        attrs
            .into_iter()
            .fold(self, |element, (name, value)| element.attr(name, value))
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(nodes);
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&html_escape::encode_double_quoted_attribute(value));
            out.push('"');
        }
        out.push('>');
        if VOID_ELEMENTS.contains(&self.tag.as_str()) {
            return;
        }
        for child in &self.children {
            child.write_html(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

/// A node in the rendered tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Plain text, escaped on output
    Text(String),
    /// Schema markup, emitted verbatim
    Raw(TrustedMarkup),
    Fragment(Vec<Node>),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn raw(markup: TrustedMarkup) -> Self {
        Node::Raw(markup)
    }

    pub fn empty() -> Self {
        Node::Fragment(Vec::new())
    }

    /// Serialize the tree to an HTML string.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Element(element) => element.write_html(out),
            Node::Text(text) => out.push_str(&html_escape::encode_text(text)),
            Node::Raw(markup) => out.push_str(markup.as_str()),
            Node::Fragment(nodes) => nodes.iter().for_each(|node| node.write_html(out)),
        }
    }

    /// All elements in the tree, depth-first in document order.
    pub fn elements(&self) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_elements(&mut found);
        found
    }

    fn collect_elements<'a>(&'a self, found: &mut Vec<&'a Element>) {
        match self {
            Node::Element(element) => {
                found.push(element);
                for child in &element.children {
                    child.collect_elements(found);
                }
            }
            Node::Fragment(nodes) => nodes.iter().for_each(|n| n.collect_elements(found)),
            Node::Text(_) | Node::Raw(_) => {}
        }
    }

    /// Hidden `<input>` elements, i.e. the form-serializable entries.
    pub fn hidden_inputs(&self) -> Vec<&Element> {
        self.elements()
            .into_iter()
            .filter(|e| e.tag == "input" && e.get_attr("type") == Some("hidden"))
            .collect()
    }

    /// Elements that submit with the surrounding form (carry a `name`).
    pub fn form_entries(&self) -> Vec<&Element> {
        self.elements()
            .into_iter()
            .filter(|e| e.get_attr("name").is_some())
            .collect()
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<TrustedMarkup> for Node {
    fn from(markup: TrustedMarkup) -> Self {
        Node::Raw(markup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_escaped_markup_is_not() {
        let node = Element::new("p")
            .child(Node::text("<b>plain</b>"))
            .child(TrustedMarkup::new("<em>trusted</em>"));
        assert_eq!(
            Node::from(node).to_html(),
            "<p>&lt;b&gt;plain&lt;/b&gt;<em>trusted</em></p>"
        );
    }

    #[test]
    fn test_attributes_are_escaped_and_replaced() {
        let node: Node = Element::new("input")
            .attr("value", "a\"b")
            .attr("name", "first")
            .attr("name", "second")
            .into();
        assert_eq!(node.to_html(), "<input value=\"a&quot;b\" name=\"second\">");
    }

    #[test]
    fn test_hidden_inputs_are_found_in_nested_fragments() {
        let node = Node::Fragment(vec![
            Element::new("div")
                .child(Element::new("input").attr("type", "hidden").attr("name", "a"))
                .into(),
            Element::new("input").attr("type", "text").into(),
        ]);
        let hidden = node.hidden_inputs();
        assert_eq!(hidden.len(), 1);
        assert_eq!(hidden[0].get_attr("name"), Some("a"));
    }
}
