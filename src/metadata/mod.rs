//! Metadata descriptors: parsing, flattening into index fields, and reference extraction

pub mod document;
pub mod expression;
pub mod extractor;

pub use document::{Element, MetadataDocument};
pub use expression::ReferenceExpression;
pub use extractor::MetadataExtractor;
