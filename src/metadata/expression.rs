//! Reference expressions
//!
//! A small path language for locating binary references inside a metadata document:
//!
//! - `/page/attachment/url` selects by absolute path
//! - `//url` selects at any depth
//! - `*` matches any element name
//! - a final `@href` selects an attribute instead of element text
//! - a final `text()` is accepted and selects element text
//!
//! Predicates and other axes are rejected when the expression is compiled.

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::metadata::document::{Element, MetadataDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Named(String),
}

impl NameTest {
    fn matches(&self, element: &Element) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Named(name) => element.name == *name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NameTest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selection {
    Text,
    Attribute(String),
}

/// Compiled reference expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceExpression {
    source: String,
    steps: Vec<Step>,
    selection: Selection,
}

impl ReferenceExpression {
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidExpression {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = expression.trim();
        if !trimmed.starts_with('/') {
            return Err(invalid("expression must start with '/' or '//'"));
        }
        if trimmed.contains(['[', ']', '(', ')', ':', '|']) && !trimmed.ends_with("/text()") {
            return Err(invalid("predicates, functions and axes are not supported"));
        }

        let mut steps = Vec::new();
        let mut selection = Selection::Text;
        let mut rest = trimmed;

        while !rest.is_empty() {
            let axis = if let Some(r) = rest.strip_prefix("//") {
                rest = r;
                Axis::Descendant
            } else if let Some(r) = rest.strip_prefix('/') {
                rest = r;
                Axis::Child
            } else {
                return Err(invalid("expected '/' between steps"));
            };

            let end = rest.find('/').unwrap_or(rest.len());
            let token = &rest[..end];
            rest = &rest[end..];

            if token.is_empty() {
                return Err(invalid("empty step"));
            }

            let is_last = rest.is_empty();
            if let Some(attribute) = token.strip_prefix('@') {
                if !is_last || axis != Axis::Child || attribute.is_empty() {
                    return Err(invalid("'@attribute' must be the final child step"));
                }
                selection = Selection::Attribute(attribute.to_string());
            } else if token == "text()" {
                if !is_last || axis != Axis::Child {
                    return Err(invalid("'text()' must be the final child step"));
                }
            } else if token.contains(['(', ')', '[', ']', ':', '|']) {
                return Err(invalid("predicates, functions and axes are not supported"));
            } else if token == "*" {
                steps.push(Step {
                    axis,
                    test: NameTest::Any,
                });
            } else {
                steps.push(Step {
                    axis,
                    test: NameTest::Named(token.to_string()),
                });
            }
        }

        if steps.is_empty() {
            return Err(invalid("expression selects no elements"));
        }

        Ok(Self {
            source: trimmed.to_string(),
            steps,
            selection,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate against a document, returning trimmed non-blank values in document order
    pub fn evaluate(&self, document: &MetadataDocument) -> Vec<String> {
        let positions = preorder_positions(&document.root);
        let mut context: Vec<&Element> = Vec::new();

        for (index, step) in self.steps.iter().enumerate() {
            let mut next: Vec<&Element> = Vec::new();

            if index == 0 {
                // The first step starts from the document node, whose only child is the root
                let root = &document.root;
                if step.test.matches(root) {
                    next.push(root);
                }
                if step.axis == Axis::Descendant {
                    collect_descendants(root, &step.test, &mut next);
                }
            } else {
                for element in &context {
                    match step.axis {
                        Axis::Child => next.extend(
                            element
                                .children
                                .iter()
                                .filter(|child| step.test.matches(child)),
                        ),
                        Axis::Descendant => collect_descendants(element, &step.test, &mut next),
                    }
                }
            }

            context = in_document_order(next, &positions);
            if context.is_empty() {
                return Vec::new();
            }
        }

        context
            .into_iter()
            .filter_map(|element| match &self.selection {
                Selection::Text => Some(element.text.trim()),
                Selection::Attribute(name) => element.attribute(name).map(str::trim),
            })
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn collect_descendants<'a>(element: &'a Element, test: &NameTest, out: &mut Vec<&'a Element>) {
    for child in &element.children {
        if test.matches(child) {
            out.push(child);
        }
        collect_descendants(child, test, out);
    }
}

/// Pre-order position of every element, keyed by address
fn preorder_positions(root: &Element) -> HashMap<*const Element, usize> {
    fn walk(element: &Element, positions: &mut HashMap<*const Element, usize>) {
        let next = positions.len();
        positions.insert(element as *const Element, next);
        for child in &element.children {
            walk(child, positions);
        }
    }

    let mut positions = HashMap::new();
    walk(root, &mut positions);
    positions
}

fn in_document_order<'a>(
    mut elements: Vec<&'a Element>,
    positions: &HashMap<*const Element, usize>,
) -> Vec<&'a Element> {
    let position = |element: &Element| {
        positions
            .get(&(element as *const Element))
            .copied()
            .unwrap_or(usize::MAX)
    };
    elements.sort_by_key(|element| position(*element));
    elements.dedup_by(|a, b| std::ptr::eq(*a, *b));
    elements
}
