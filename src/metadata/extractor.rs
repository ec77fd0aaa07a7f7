use indexmap::IndexSet;
use std::collections::HashSet;

use crate::classify::{MimeTypeFilter, PatternList};
use crate::config::ResolvedSyncConfig;
use crate::error::ConfigError;
use crate::metadata::document::{Element, MetadataDocument};
use crate::metadata::expression::ReferenceExpression;
use crate::models::FieldMap;

/// Flattens metadata documents into field maps and finds the binaries they reference
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    reference_expressions: Vec<ReferenceExpression>,
    include_properties: PatternList,
    exclude_properties: PatternList,
    excluded_metadata_properties: HashSet<String>,
    metadata_path_field: String,
    mime_types: MimeTypeFilter,
}

impl MetadataExtractor {
    pub fn from_config(config: &ResolvedSyncConfig) -> Result<Self, ConfigError> {
        let reference_expressions = config
            .reference_expressions
            .iter()
            .map(|e| ReferenceExpression::parse(e))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            reference_expressions,
            include_properties: PatternList::new("include property", &config.include_properties)?,
            exclude_properties: PatternList::new("exclude property", &config.exclude_properties)?,
            excluded_metadata_properties: config
                .excluded_metadata_properties
                .iter()
                .cloned()
                .collect(),
            metadata_path_field: config.metadata_path_field.clone(),
            mime_types: MimeTypeFilter::new(&config.supported_mime_types),
        })
    }

    pub fn metadata_path_field(&self) -> &str {
        &self.metadata_path_field
    }

    /// Flatten `document` depth-first into dotted keys. The root element itself does not
    /// contribute to keys, so `<page><title>` becomes `title`. The owning metadata path is
    /// bound under the metadata path field last.
    pub fn extract(&self, metadata_path: &str, document: &MetadataDocument) -> FieldMap {
        let mut fields = FieldMap::new();
        self.walk(&document.root, "", &mut fields);
        fields.set(self.metadata_path_field.as_str(), metadata_path);
        fields
    }

    fn walk(&self, element: &Element, prefix: &str, fields: &mut FieldMap) {
        for child in &element.children {
            let key = if prefix.is_empty() {
                child.name.clone()
            } else {
                format!("{}.{}", prefix, child.name)
            };

            if self.is_legacy_excluded(&child.name, &key) || self.exclude_properties.matches_any(&key)
            {
                continue;
            }

            if child.is_leaf() {
                let value = child.text.trim();
                if !value.is_empty() && self.is_property_included(&key) {
                    fields.add(key, value);
                }
            } else {
                self.walk(child, &key, fields);
            }
        }
    }

    fn is_legacy_excluded(&self, name: &str, key: &str) -> bool {
        self.excluded_metadata_properties.contains(key)
            || self.excluded_metadata_properties.contains(name)
    }

    fn is_property_included(&self, key: &str) -> bool {
        self.include_properties.is_empty() || self.include_properties.matches_any(key)
    }

    /// Binaries referenced by `document`. The first expression yielding at least one
    /// supported path wins; results keep document order without duplicates.
    pub fn referenced_binaries(&self, document: &MetadataDocument) -> IndexSet<String> {
        for expression in &self.reference_expressions {
            let references: IndexSet<String> = expression
                .evaluate(document)
                .into_iter()
                .filter(|path| self.mime_types.is_supported(path))
                .collect();

            if !references.is_empty() {
                return references;
            }
        }

        IndexSet::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(configure: impl FnOnce(&mut ResolvedSyncConfig)) -> MetadataExtractor {
        let mut config = ResolvedSyncConfig::default();
        configure(&mut config);
        config.extractor().unwrap()
    }

    fn parse(xml: &str) -> MetadataDocument {
        MetadataDocument::parse("/site/item.xml", xml.as_bytes()).unwrap()
    }

    const ITEM: &str = r#"<item>
        <objectId>abc-123</objectId>
        <title>  Brochure  </title>
        <summary>   </summary>
        <author><name>Ana</name><email>ana@example.com</email></author>
        <tags><tag>sales</tag><tag>print</tag></tags>
        <attachment><url>/static-assets/brochure.pdf</url></attachment>
    </item>"#;

    #[test]
    fn test_extract_flattens_with_dotted_keys() {
        let fields = extractor(|_| {}).extract("/site/item.xml", &parse(ITEM));

        let keys: Vec<&str> = fields.keys().collect();
        assert_eq!(
            keys,
            vec![
                "title",
                "author.name",
                "author.email",
                "tags.tag",
                "attachment.url",
                "metadataPath"
            ]
        );
        assert_eq!(fields.first("title"), Some("Brochure"));
        assert_eq!(
            fields.get("tags.tag").unwrap(),
            &["sales".to_string(), "print".to_string()]
        );
        assert_eq!(fields.first("metadataPath"), Some("/site/item.xml"));
        // blank and legacy-excluded values are never emitted
        assert!(!fields.contains_key("summary"));
        assert!(!fields.contains_key("objectId"));
    }

    #[test]
    fn test_extract_is_deterministic() {
        let e = extractor(|_| {});
        let doc = parse(ITEM);
        let first = e.extract("/site/item.xml", &doc);
        for _ in 0..5 {
            assert_eq!(e.extract("/site/item.xml", &doc), first);
        }
    }

    #[test]
    fn test_property_filters() {
        let e = extractor(|config| {
            config.include_properties = vec!["title".to_string(), "author\\..*".to_string()];
            config.exclude_properties = vec!["author\\.email".to_string()];
        });
        let fields = e.extract("/site/item.xml", &parse(ITEM));

        let keys: Vec<&str> = fields.keys().collect();
        assert_eq!(keys, vec!["title", "author.name", "metadataPath"]);
    }

    #[test]
    fn test_exclude_property_prunes_subtree() {
        let e = extractor(|config| {
            config.exclude_properties = vec!["author".to_string()];
        });
        let fields = e.extract("/site/item.xml", &parse(ITEM));
        assert!(!fields.contains_key("author.name"));
        assert!(!fields.contains_key("author.email"));
    }

    #[test]
    fn test_legacy_excluded_property_prunes_subtree() {
        let e = extractor(|config| {
            config.excluded_metadata_properties = vec!["tags".to_string()];
        });
        let fields = e.extract("/site/item.xml", &parse(ITEM));
        assert!(!fields.contains_key("tags.tag"));
        assert!(fields.contains_key("objectId"));
    }

    #[test]
    fn test_metadata_path_field_overrides_document_property() {
        let doc = parse("<item><metadataPath>/forged.xml</metadataPath></item>");
        let fields = extractor(|_| {}).extract("/site/item.xml", &doc);
        assert_eq!(
            fields.get("metadataPath").unwrap(),
            &["/site/item.xml".to_string()]
        );
    }

    #[test]
    fn test_first_matching_expression_wins() {
        let e = extractor(|config| {
            config.reference_expressions =
                vec!["//missing".to_string(), "//attachment/url".to_string(), "//file".to_string()];
        });
        let doc = parse(
            "<item><attachment><url>/static-assets/a.pdf</url></attachment><file>/static-assets/b.pdf</file></item>",
        );
        let refs: Vec<String> = e.referenced_binaries(&doc).into_iter().collect();
        assert_eq!(refs, vec!["/static-assets/a.pdf"]);
    }

    #[test]
    fn test_references_are_deduplicated_in_document_order() {
        let e = extractor(|_| {});
        let doc = parse(
            "<item>\
               <attachment><url>/static-assets/b.pdf</url></attachment>\
               <attachment><url>/static-assets/a.pdf</url></attachment>\
               <attachment><url>/static-assets/b.pdf</url></attachment>\
             </item>",
        );
        let refs: Vec<String> = e.referenced_binaries(&doc).into_iter().collect();
        assert_eq!(refs, vec!["/static-assets/b.pdf", "/static-assets/a.pdf"]);
    }

    #[test]
    fn test_unsupported_references_are_excluded() {
        let e = extractor(|config| {
            config.supported_mime_types = vec!["application/pdf".to_string()];
            config.reference_expressions = vec!["//file".to_string(), "//attachment/url".to_string()];
        });
        // `//file` only yields an unsupported type, so the next expression is used
        let doc = parse(
            "<item><file>/static-assets/movie.mp4</file><attachment><url>/static-assets/a.pdf</url></attachment></item>",
        );
        let refs: Vec<String> = e.referenced_binaries(&doc).into_iter().collect();
        assert_eq!(refs, vec!["/static-assets/a.pdf"]);
    }

    #[test]
    fn test_no_references_is_empty_set() {
        let e = extractor(|_| {});
        assert!(e.referenced_binaries(&parse("<item><title>x</title></item>")).is_empty());
    }
}
