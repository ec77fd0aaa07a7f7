//! Parsed metadata document tree
//!
//! Metadata descriptors are stored as XML or JSON. Both are converted into the same
//! owned element tree so the extractor and reference expressions work on one shape.

use serde_json::Value;

use crate::error::RepositoryError;

/// One element of a metadata document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Concatenated direct text content
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A parsed metadata file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDocument {
    pub root: Element,
}

impl MetadataDocument {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parse a document, choosing the format from the path extension.
    /// `.json` is parsed as JSON, everything else as XML.
    pub fn parse(path: &str, bytes: &[u8]) -> Result<Self, RepositoryError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| RepositoryError::invalid_document(path, e))?;

        if path.to_lowercase().ends_with(".json") {
            Self::parse_json(path, text)
        } else {
            Self::parse_xml(path, text)
        }
    }

    pub fn parse_xml(path: &str, text: &str) -> Result<Self, RepositoryError> {
        let doc = roxmltree::Document::parse(text)
            .map_err(|e| RepositoryError::invalid_document(path, e))?;
        Ok(Self::new(element_from_xml(doc.root_element())))
    }

    pub fn parse_json(path: &str, text: &str) -> Result<Self, RepositoryError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| RepositoryError::invalid_document(path, e))?;

        match value {
            Value::Object(map) => {
                let mut root = Element::new("root");
                root.children = json_children(&map);
                Ok(Self::new(root))
            }
            _ => Err(RepositoryError::invalid_document(
                path,
                "top-level JSON value must be an object",
            )),
        }
    }
}

fn element_from_xml(node: roxmltree::Node) -> Element {
    let mut element = Element::new(node.tag_name().name());

    for attribute in node.attributes() {
        element
            .attributes
            .push((attribute.name().to_string(), attribute.value().to_string()));
    }

    for child in node.children() {
        if child.is_element() {
            element.children.push(element_from_xml(child));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                element.text.push_str(text);
            }
        }
    }

    element
}

fn json_children(map: &serde_json::Map<String, Value>) -> Vec<Element> {
    let mut children = Vec::new();
    for (key, value) in map {
        push_json(&mut children, key, value);
    }
    children
}

/// Objects become child elements, arrays become repeated elements named after their key
fn push_json(out: &mut Vec<Element>, name: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut element = Element::new(name);
            element.children = json_children(map);
            out.push(element);
        }
        Value::Array(items) => {
            for item in items {
                push_json(out, name, item);
            }
        }
        Value::Null => out.push(Element::new(name)),
        Value::String(s) => out.push(Element::new(name).with_text(s.clone())),
        Value::Bool(b) => out.push(Element::new(name).with_text(b.to_string())),
        Value::Number(n) => out.push(Element::new(name).with_text(n.to_string())),
    }
}
