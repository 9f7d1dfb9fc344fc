use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::traits::DocumentTypeStore;
use crate::error::{OcrError, Result};
use crate::models::{DocumentType, OcrMode, Template};

/// Document-type catalog held in memory, keyed by case-insensitive code.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentTypeStore {
    by_code: HashMap<String, DocumentType>,
}

impl InMemoryDocumentTypeStore {
    pub fn new(document_types: impl IntoIterator<Item = DocumentType>) -> Self {
        let by_code = document_types
            .into_iter()
            .map(|dt| (dt.code.trim().to_lowercase(), dt))
            .collect();
        Self { by_code }
    }

    /// Catalog containing only the built-in citizen ID card type.
    pub fn seeded() -> Self {
        let mut template = Template::new(r#"{"id":{"regex":"[0-9]{12}"}}"#);
        template.id = 1;

        let mut cccd = DocumentType::new("CCCD_FULL", "Căn Cước Công Dân (Full)", OcrMode::Fast);
        cccd.id = 1;
        cccd.ocr_config_json = Some(r#"{"psm":6}"#.to_string());
        cccd.templates.push(template);

        Self::new([cccd])
    }

    /// Reads a JSON array of document types.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OcrError::Storage(format!(
                "Failed to read document types from {}: {e}",
                path.display()
            ))
        })?;
        let document_types: Vec<DocumentType> = serde_json::from_str(&raw)?;

        info!(
            path = %path.display(),
            count = document_types.len(),
            "Document types loaded"
        );
        Ok(Self::new(document_types))
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

#[async_trait]
impl DocumentTypeStore for InMemoryDocumentTypeStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<DocumentType>> {
        Ok(self.by_code.get(&code.trim().to_lowercase()).cloned())
    }
}
