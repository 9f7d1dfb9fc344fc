use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{OcrError, Result};
use crate::extraction::{SamplerProvider, TemplateExtractor};
use crate::models::{
    DocumentType, FieldMap, OcrRequest, OcrResult, TemplateInfo, UNKNOWN_DOCUMENT_TYPE,
};
use crate::ocr::EngineFactory;
use crate::store::DocumentTypeStore;

/// Runs one request through the pipeline: document type, engine, buffering,
/// preprocessing and recognition, extraction, sampling, result assembly.
#[derive(Clone)]
pub struct OcrCoordinator {
    factory: Arc<EngineFactory>,
    extractor: TemplateExtractor,
    samplers: Arc<SamplerProvider>,
    document_types: Arc<dyn DocumentTypeStore>,
    max_upload_bytes: usize,
    max_image_dimension: u32,
}

impl OcrCoordinator {
    pub fn new(
        factory: Arc<EngineFactory>,
        samplers: Arc<SamplerProvider>,
        document_types: Arc<dyn DocumentTypeStore>,
        max_upload_bytes: usize,
        max_image_dimension: u32,
    ) -> Self {
        Self {
            factory,
            extractor: TemplateExtractor::new(),
            samplers,
            document_types,
            max_upload_bytes,
            max_image_dimension,
        }
    }

    pub async fn process(
        &self,
        mut request: OcrRequest,
        cancel: &CancellationToken,
    ) -> Result<OcrResult> {
        let document_type = self
            .resolve_document_type(request.document_type_code.as_deref(), cancel)
            .await?;

        let engine = self
            .factory
            .engine_for(request.mode, document_type.as_ref())
            .await?;

        let buffer = cancellable(cancel, self.buffer(&mut request)).await?;
        drop(request.content);
        debug!(file = %request.file_name, bytes = buffer.len(), "Input buffered");

        let profile = engine.profile();
        let max_dimension = self.max_image_dimension;
        let image = cancellable(cancel, async move {
            tokio::task::spawn_blocking(move || profile.apply(&buffer, max_dimension))
                .await
                .map_err(|e| OcrError::Internal(format!("Preprocessing task failed: {e}")))?
        })
        .await?;

        let full_text = cancellable(cancel, async { Ok(engine.recognize_text(image).await) }).await?;

        let template = document_type.as_ref().and_then(DocumentType::active_template);
        let extracted = match template {
            Some(template) => self.extractor.extract(&full_text, template),
            None => FieldMap::new(),
        };
        let fields = self
            .samplers
            .apply(&extracted, request.sampler_code.as_deref());

        let result = OcrResult {
            document_type_code: document_type
                .as_ref()
                .map(|dt| dt.code.clone())
                .unwrap_or_else(|| UNKNOWN_DOCUMENT_TYPE.to_string()),
            engine_name: engine.name().to_string(),
            full_text,
            fields,
            metadata: document_type
                .as_ref()
                .and_then(|dt| parse_metadata(dt.ocr_config_json.as_deref())),
            template_used: template.map(TemplateInfo::from),
        };

        info!(
            file = %request.file_name,
            document_type = %result.document_type_code,
            engine = %result.engine_name,
            fields = result.fields.len(),
            "OCR request completed"
        );
        Ok(result)
    }

    async fn resolve_document_type(
        &self,
        code: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Option<DocumentType>> {
        let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(None);
        };

        let found = cancellable(cancel, self.document_types.find_by_code(code)).await?;
        if found.is_none() {
            warn!(document_type = %code, "Document type not found; continuing without template");
        }
        Ok(found)
    }

    /// Reads the request stream to the end, refusing inputs over the upload limit.
    async fn buffer(&self, request: &mut OcrRequest) -> Result<Vec<u8>> {
        let limit = self.max_upload_bytes as u64;
        let mut buffer = Vec::new();
        (&mut request.content)
            .take(limit + 1)
            .read_to_end(&mut buffer)
            .await?;

        if buffer.len() as u64 > limit {
            return Err(OcrError::Validation(format!(
                "Upload exceeds the {} byte limit",
                self.max_upload_bytes
            )));
        }
        Ok(buffer)
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    stage: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OcrError::Cancelled),
        out = stage => out,
    }
}

/// Document-type metadata: a JSON object, anything else means none.
fn parse_metadata(raw: Option<&str>) -> Option<Map<String, Value>> {
    let raw = raw.filter(|r| !r.trim().is_empty())?;
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Invalid document type OCR config; metadata omitted");
            None
        }
    }
}
