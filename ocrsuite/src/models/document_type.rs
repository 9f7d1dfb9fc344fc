use serde::{Deserialize, Serialize};

use super::OcrMode;

/// A class of document the service knows how to read (e.g. a national ID card).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentType {
    #[serde(default)]
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub preferred_mode: OcrMode,
    /// Free-form JSON surfaced as result metadata.
    #[serde(default)]
    pub ocr_config_json: Option<String>,
    #[serde(default)]
    pub templates: Vec<Template>,
}

impl DocumentType {
    pub fn new(code: impl Into<String>, name: impl Into<String>, preferred_mode: OcrMode) -> Self {
        Self {
            id: 0,
            code: code.into(),
            name: name.into(),
            preferred_mode,
            ocr_config_json: None,
            templates: Vec::new(),
        }
    }

    /// The template used for extraction: the first one flagged active.
    pub fn active_template(&self) -> Option<&Template> {
        self.templates.iter().find(|t| t.active)
    }
}

/// Versioned set of field-extraction rules belonging to one document type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default)]
    pub id: i64,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "empty_object")]
    pub anchors_json: String,
    /// `{ "fieldName": { "regex": "pattern" }, ... }`
    #[serde(default = "empty_object")]
    pub fields_json: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_version() -> String {
    "v1".to_string()
}

fn empty_object() -> String {
    "{}".to_string()
}

fn default_active() -> bool {
    true
}

impl Template {
    pub fn new(fields_json: impl Into<String>) -> Self {
        Self {
            id: 0,
            version: default_version(),
            anchors_json: empty_object(),
            fields_json: fields_json.into(),
            active: default_active(),
        }
    }
}
