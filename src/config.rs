use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::classify::PathClassifier;
use crate::error::ConfigError;
use crate::metadata::MetadataExtractor;

/// Default maximum binary size: 100 MiB
pub const DEFAULT_MAX_BINARY_SIZE_BYTES: u64 = 100 * 1024 * 1024;

/// Layered configuration for index-sync
/// All fields are optional to support partial configurations and merging
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<PathsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<BinaryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Pattern lists used to classify repository paths. Patterns are regular
/// expressions matched against the whole path.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_patterns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_patterns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_binary_patterns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_binary_patterns: Option<Vec<String>>,
    /// Allowed media types (`application/pdf`, `image/*`). Empty allows every type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_mime_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_patterns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetadataConfig {
    /// Ordered reference expressions; the first one with results wins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_expressions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_properties: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_properties: Option<Vec<String>>,
    /// Legacy list of property names never traversed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_metadata_properties: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FieldsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BinaryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size_bytes: Option<u64>,
}

/// Configuration with resolved values (no Options)
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSyncConfig {
    pub log_level: String,
    pub format: String,
    pub metadata_patterns: Vec<String>,
    pub binary_patterns: Vec<String>,
    pub remote_binary_patterns: Vec<String>,
    pub child_binary_patterns: Vec<String>,
    pub supported_mime_types: Vec<String>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub reference_expressions: Vec<String>,
    pub include_properties: Vec<String>,
    pub exclude_properties: Vec<String>,
    pub excluded_metadata_properties: Vec<String>,
    pub metadata_path_field: String,
    pub local_id_field: String,
    pub max_binary_size_bytes: u64,
}

impl Default for ResolvedSyncConfig {
    fn default() -> Self {
        SyncConfig::default().resolve_with_defaults()
    }
}

fn default_metadata_patterns() -> Vec<String> {
    vec![r"/site/.+\.(xml|json)".to_string()]
}

fn default_binary_patterns() -> Vec<String> {
    vec!["/static-assets/.+".to_string()]
}

fn default_reference_expressions() -> Vec<String> {
    vec!["//attachment/url".to_string(), "//file".to_string()]
}

fn default_excluded_metadata_properties() -> Vec<String> {
    [
        "objectId",
        "file-name",
        "folder-name",
        "content-type",
        "display-template",
        "merge-strategy",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl SyncConfig {
    /// Load configuration from every level, merge, apply environment overrides
    pub fn load() -> Result<ResolvedSyncConfig> {
        let mut merged = SyncConfig::default();
        for config in Self::load_all_configs()? {
            merged = Self::merge_configs(merged, config);
        }

        merged.apply_env_overrides();

        let resolved = merged.resolve_with_defaults();
        resolved.validate()?;
        Ok(resolved)
    }

    /// Load an explicit configuration file on top of the layered configuration
    pub fn load_with_file(path: &Path) -> Result<ResolvedSyncConfig> {
        let mut merged = SyncConfig::default();
        for config in Self::load_all_configs()? {
            merged = Self::merge_configs(merged, config);
        }
        merged = Self::merge_configs(merged, Self::load_from_file(path)?);

        merged.apply_env_overrides();

        let resolved = merged.resolve_with_defaults();
        resolved.validate()?;
        Ok(resolved)
    }

    /// Get all configuration file paths in priority order
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. Global config: ~/.index-sync/settings.json
        if let Ok(home) = env::var("HOME") {
            paths.push(PathBuf::from(home).join(".index-sync").join("settings.json"));
        } else if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".index-sync").join("settings.json"));
        }

        // 2. Project config
        paths.push(PathBuf::from(".index-sync").join("settings.json"));
        paths.push(PathBuf::from(".index-sync").join("settings.local.json"));

        // 3. Custom path via environment variable (last wins)
        if let Ok(custom_path) = env::var("INDEX_SYNC_CONFIG_PATH") {
            let looks_like_dir = custom_path.ends_with('/') || custom_path.ends_with('\\');
            let p = if looks_like_dir {
                PathBuf::from(&custom_path).join("settings.json")
            } else {
                PathBuf::from(&custom_path)
            };
            paths.push(p);
        }

        paths
    }

    /// Load all configuration files that exist
    fn load_all_configs() -> Result<Vec<SyncConfig>> {
        let mut configs = Vec::new();

        for path in Self::get_config_paths() {
            match fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => {
                    configs.push(Self::load_from_file(&path)?);
                }
                _ => continue,
            }
        }

        Ok(configs)
    }

    /// Load a single configuration file
    pub fn load_from_file(path: &Path) -> Result<SyncConfig> {
        let bytes = fs::read(path).context(format!("Failed to read config file: {path:?}"))?;

        // Strip UTF-8 BOM if present
        let content_bytes = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
            &bytes[3..]
        } else {
            &bytes[..]
        };

        let config: SyncConfig = serde_json::from_slice(content_bytes)
            .context(format!("Failed to parse config file: {path:?}"))?;

        Ok(config)
    }

    /// Deep merge two configurations, with `other` taking precedence
    pub fn merge_configs(mut base: SyncConfig, other: SyncConfig) -> SyncConfig {
        fn take<T>(target: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *target = value;
            }
        }

        if let Some(o) = other.defaults {
            let b = base.defaults.get_or_insert_with(DefaultsConfig::default);
            take(&mut b.log_level, o.log_level);
            take(&mut b.format, o.format);
        }

        if let Some(o) = other.paths {
            let b = base.paths.get_or_insert_with(PathsConfig::default);
            take(&mut b.metadata_patterns, o.metadata_patterns);
            take(&mut b.binary_patterns, o.binary_patterns);
            take(&mut b.remote_binary_patterns, o.remote_binary_patterns);
            take(&mut b.child_binary_patterns, o.child_binary_patterns);
            take(&mut b.supported_mime_types, o.supported_mime_types);
            take(&mut b.include_patterns, o.include_patterns);
            take(&mut b.exclude_patterns, o.exclude_patterns);
        }

        if let Some(o) = other.metadata {
            let b = base.metadata.get_or_insert_with(MetadataConfig::default);
            take(&mut b.reference_expressions, o.reference_expressions);
            take(&mut b.include_properties, o.include_properties);
            take(&mut b.exclude_properties, o.exclude_properties);
            take(
                &mut b.excluded_metadata_properties,
                o.excluded_metadata_properties,
            );
        }

        if let Some(o) = other.fields {
            let b = base.fields.get_or_insert_with(FieldsConfig::default);
            take(&mut b.metadata_path, o.metadata_path);
            take(&mut b.local_id, o.local_id);
        }

        if let Some(o) = other.binary {
            let b = base.binary.get_or_insert_with(BinaryConfig::default);
            take(&mut b.max_size_bytes, o.max_size_bytes);
        }

        base
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        let defaults = self.defaults.get_or_insert_with(DefaultsConfig::default);
        if let Ok(val) = env::var("INDEX_SYNC_LOG_LEVEL") {
            defaults.log_level = Some(val);
        }
        if let Ok(val) = env::var("INDEX_SYNC_FORMAT") {
            defaults.format = Some(val);
        }

        let paths = self.paths.get_or_insert_with(PathsConfig::default);
        if let Ok(val) = env::var("INDEX_SYNC_METADATA_PATTERNS") {
            paths.metadata_patterns = Some(split_list(&val));
        }
        if let Ok(val) = env::var("INDEX_SYNC_BINARY_PATTERNS") {
            paths.binary_patterns = Some(split_list(&val));
        }

        let binary = self.binary.get_or_insert_with(BinaryConfig::default);
        if let Ok(val) = env::var("INDEX_SYNC_MAX_BINARY_SIZE_MB") {
            match val.parse::<u64>().ok().and_then(|mb| mb.checked_mul(1024 * 1024)) {
                Some(size) => binary.max_size_bytes = Some(size),
                None => warn!("Ignoring invalid INDEX_SYNC_MAX_BINARY_SIZE_MB: {}", val),
            }
        }
    }

    /// Convert to resolved config with all defaults applied
    pub fn resolve_with_defaults(self) -> ResolvedSyncConfig {
        let defaults = self.defaults.unwrap_or_default();
        let paths = self.paths.unwrap_or_default();
        let metadata = self.metadata.unwrap_or_default();
        let fields = self.fields.unwrap_or_default();
        let binary = self.binary.unwrap_or_default();

        ResolvedSyncConfig {
            log_level: defaults.log_level.unwrap_or_else(|| "info".to_string()),
            format: defaults.format.unwrap_or_else(|| "text".to_string()),
            metadata_patterns: paths
                .metadata_patterns
                .unwrap_or_else(default_metadata_patterns),
            binary_patterns: paths.binary_patterns.unwrap_or_else(default_binary_patterns),
            remote_binary_patterns: paths.remote_binary_patterns.unwrap_or_default(),
            child_binary_patterns: paths.child_binary_patterns.unwrap_or_default(),
            supported_mime_types: paths.supported_mime_types.unwrap_or_default(),
            include_patterns: paths.include_patterns.unwrap_or_default(),
            exclude_patterns: paths.exclude_patterns.unwrap_or_default(),
            reference_expressions: metadata
                .reference_expressions
                .unwrap_or_else(default_reference_expressions),
            include_properties: metadata.include_properties.unwrap_or_default(),
            exclude_properties: metadata.exclude_properties.unwrap_or_default(),
            excluded_metadata_properties: metadata
                .excluded_metadata_properties
                .unwrap_or_else(default_excluded_metadata_properties),
            metadata_path_field: fields
                .metadata_path
                .unwrap_or_else(|| "metadataPath".to_string()),
            local_id_field: fields.local_id.unwrap_or_else(|| "localId".to_string()),
            max_binary_size_bytes: binary
                .max_size_bytes
                .unwrap_or(DEFAULT_MAX_BINARY_SIZE_BYTES),
        }
    }
}

impl ResolvedSyncConfig {
    /// Validate values and make sure every pattern and expression compiles
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}",
                self.log_level
            )));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid format: {}",
                self.format
            )));
        }

        if self.metadata_path_field.trim().is_empty() || self.local_id_field.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "metadata path and local id field names must not be empty".to_string(),
            ));
        }

        if self.metadata_path_field == self.local_id_field {
            return Err(ConfigError::Invalid(format!(
                "metadata path and local id fields must differ, both are '{}'",
                self.metadata_path_field
            )));
        }

        if self.max_binary_size_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max binary size must be greater than zero".to_string(),
            ));
        }

        self.classifier()?;
        self.extractor()?;
        Ok(())
    }

    /// Compile the path classifier
    pub fn classifier(&self) -> Result<PathClassifier, ConfigError> {
        PathClassifier::from_config(self)
    }

    /// Compile the metadata extractor
    pub fn extractor(&self) -> Result<MetadataExtractor, ConfigError> {
        MetadataExtractor::from_config(self)
    }

    /// Convert back to SyncConfig for serialization
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig {
            defaults: Some(DefaultsConfig {
                log_level: Some(self.log_level.clone()),
                format: Some(self.format.clone()),
            }),
            paths: Some(PathsConfig {
                metadata_patterns: Some(self.metadata_patterns.clone()),
                binary_patterns: Some(self.binary_patterns.clone()),
                remote_binary_patterns: Some(self.remote_binary_patterns.clone()),
                child_binary_patterns: Some(self.child_binary_patterns.clone()),
                supported_mime_types: Some(self.supported_mime_types.clone()),
                include_patterns: Some(self.include_patterns.clone()),
                exclude_patterns: Some(self.exclude_patterns.clone()),
            }),
            metadata: Some(MetadataConfig {
                reference_expressions: Some(self.reference_expressions.clone()),
                include_properties: Some(self.include_properties.clone()),
                exclude_properties: Some(self.exclude_properties.clone()),
                excluded_metadata_properties: Some(self.excluded_metadata_properties.clone()),
            }),
            fields: Some(FieldsConfig {
                metadata_path: Some(self.metadata_path_field.clone()),
                local_id: Some(self.local_id_field.clone()),
            }),
            binary: Some(BinaryConfig {
                max_size_bytes: Some(self.max_binary_size_bytes),
            }),
        }
    }

    /// Get a pretty-printed JSON representation
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_sync_config())
            .context("Failed to serialize configuration to JSON")
    }
}
