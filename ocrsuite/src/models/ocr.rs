use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::AsyncRead;

use super::{FieldMap, OcrMode, Template};

/// Document type code reported when no document type was resolved.
pub const UNKNOWN_DOCUMENT_TYPE: &str = "UNKNOWN";

/// A single recognition request. The content stream belongs to the caller and is
/// read to the end by the coordinator before recognition starts.
pub struct OcrRequest {
    pub content: Box<dyn AsyncRead + Send + Unpin>,
    pub file_name: String,
    pub document_type_code: Option<String>,
    pub mode: OcrMode,
    pub sampler_code: Option<String>,
}

impl OcrRequest {
    pub fn new(content: impl AsyncRead + Send + Unpin + 'static, file_name: impl Into<String>) -> Self {
        Self {
            content: Box::new(content),
            file_name: file_name.into(),
            document_type_code: None,
            mode: OcrMode::Auto,
            sampler_code: None,
        }
    }

    /// Convenience constructor for already-buffered uploads.
    pub fn from_bytes(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self::new(std::io::Cursor::new(bytes), file_name)
    }

    pub fn with_document_type(mut self, code: impl Into<String>) -> Self {
        self.document_type_code = Some(code.into());
        self
    }

    pub fn with_mode(mut self, mode: OcrMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_sampler(mut self, code: impl Into<String>) -> Self {
        self.sampler_code = Some(code.into());
        self
    }
}

impl std::fmt::Debug for OcrRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrRequest")
            .field("file_name", &self.file_name)
            .field("document_type_code", &self.document_type_code)
            .field("mode", &self.mode)
            .field("sampler_code", &self.sampler_code)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    pub document_type_code: String,
    /// Name of the engine that actually produced `full_text`.
    pub engine_name: String,
    pub full_text: String,
    #[schema(value_type = std::collections::HashMap<String, String>)]
    pub fields: FieldMap,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Map<String, Value>>,
    pub template_used: Option<TemplateInfo>,
}

/// Description of the template that drove extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfo {
    pub id: i64,
    pub version: String,
    #[schema(value_type = Object)]
    pub anchors: Value,
    #[schema(value_type = Object)]
    pub rules: Value,
}

impl From<&Template> for TemplateInfo {
    fn from(template: &Template) -> Self {
        Self {
            id: template.id,
            version: template.version.clone(),
            anchors: json_or_raw(&template.anchors_json),
            rules: json_or_raw(&template.fields_json),
        }
    }
}

/// Parsed JSON when the text is valid, otherwise the raw text as a JSON string.
fn json_or_raw(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
