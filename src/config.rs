//! Runtime configuration
//!
//! Everything has a default matching the reference deployment, so an empty
//! JSON object is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::FormError;
use crate::patterns::PatternTable;
use crate::schema::{FeatureSchema, SchemaKind};
use crate::upload::DEFAULT_MAX_UPLOAD_BYTES;

/// Form and transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    /// Addressing scheme of the feature slots
    pub schema: SchemaKind,
    /// Prediction endpoint; single records are posted here as form fields.
    /// JSON answers and the server's rendered HTML page are both understood.
    pub endpoint: String,
    /// Path, relative to `endpoint`, that accepts CSV batches
    pub batch_path: String,
    pub max_upload_bytes: u64,
    pub notify_duration_ms: u64,
    pub request_timeout_secs: u64,
    /// Overrides the built-in range table for `schema`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<PatternTable>,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            schema: SchemaKind::Positional,
            endpoint: "http://localhost:8000/".to_string(),
            batch_path: "upload".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            notify_duration_ms: 3000,
            request_timeout_secs: 30,
            patterns: None,
        }
    }
}

impl FormConfig {
    pub fn from_json(json: &str) -> Result<Self, FormError> {
        let config: FormConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, FormError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            FormError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, FormError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), FormError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(FormError::Config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.max_upload_bytes == 0 {
            return Err(FormError::Config("max_upload_bytes must be positive".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(FormError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn feature_schema(&self) -> FeatureSchema {
        FeatureSchema::for_kind(self.schema)
    }

    pub fn pattern_table(&self) -> PatternTable {
        self.patterns
            .clone()
            .unwrap_or_else(|| PatternTable::for_kind(self.schema))
    }

    pub fn notify_duration(&self) -> Duration {
        Duration::from_millis(self.notify_duration_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_object_is_default() {
        let config = FormConfig::from_json("{}").unwrap();
        assert_eq!(config, FormConfig::default());
        assert_eq!(config.max_upload_bytes, 60 * 1024 * 1024);
        assert_eq!(config.feature_schema().len(), 45);
    }

    #[test]
    fn test_named_schema_selects_named_table() {
        let config = FormConfig::from_json(r#"{"schema": "named"}"#).unwrap();
        assert_eq!(config.feature_schema().kind(), SchemaKind::Named);
        assert_eq!(config.pattern_table(), PatternTable::named());
    }

    #[test]
    fn test_pattern_override() {
        let json = r#"{
            "patterns": {
                "default": {
                    "positive": {"min": -2, "max": -1},
                    "negative": {"min": -10, "max": -5, "jitter": 1},
                    "neutral_zero": {"min": -1, "max": 1},
                    "neutral_high": {"min": 5, "max": 10}
                }
            }
        }"#;
        let config = FormConfig::from_json(json).unwrap();
        let table = config.pattern_table();
        assert_eq!(table.default.negative.jitter(), Some(1.0));
        assert!(table.rules.is_empty());
        assert_eq!(table.anchors.negative, -50000.0);
    }

    #[test]
    fn test_inverted_range_in_config_is_rejected() {
        let json = r#"{
            "patterns": {
                "default": {
                    "positive": {"min": 1, "max": -1},
                    "negative": {"min": -10, "max": -5},
                    "neutral_zero": {"min": -1, "max": 1},
                    "neutral_high": {"min": 5, "max": 10}
                }
            }
        }"#;
        assert!(FormConfig::from_json(json).is_err());
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = FormConfig::from_json(r#"{"endpoint": "localhost:8000"}"#);
        assert!(matches!(result, Err(FormError::Config(_))));
    }

    #[test]
    fn test_round_trip_preserves_values() {
        let mut config = FormConfig::default();
        config.endpoint = "https://emotion.example.org/".to_string();
        config.request_timeout_secs = 5;

        let parsed = FormConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.request_timeout(), Duration::from_secs(5));
    }
}
