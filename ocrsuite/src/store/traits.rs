use async_trait::async_trait;

use crate::error::Result;
use crate::models::DocumentType;

/// Read access to the document-type catalog, templates included.
#[async_trait]
pub trait DocumentTypeStore: Send + Sync {
    /// `Ok(None)` when no document type carries `code`.
    async fn find_by_code(&self, code: &str) -> Result<Option<DocumentType>>;
}
