use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use super::engine::OcrEngine;
use super::ppocr::PpOcrEngine;
use super::tesseract::TesseractEngine;
use crate::config::{OcrConfig, OnnxConfig, TesseractConfig};
use crate::error::{OcrError, Result};
use crate::models::{DocumentType, OcrMode};

/// Constructs engine instances. Called at most once per slot initialisation,
/// always on the blocking pool.
pub trait EngineBuilder: Send + Sync + 'static {
    fn build_fast(&self) -> Result<Arc<dyn OcrEngine>>;
    fn build_enhanced(&self) -> Result<Arc<dyn OcrEngine>>;
}

/// Builds Tesseract and PP-OCR engines from configuration.
pub struct ConfiguredEngineBuilder {
    tesseract: TesseractConfig,
    onnx: OnnxConfig,
}

impl ConfiguredEngineBuilder {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            tesseract: config.tesseract.clone(),
            onnx: config.onnx.clone(),
        }
    }
}

impl EngineBuilder for ConfiguredEngineBuilder {
    fn build_fast(&self) -> Result<Arc<dyn OcrEngine>> {
        Ok(Arc::new(TesseractEngine::new(&self.tesseract)?))
    }

    fn build_enhanced(&self) -> Result<Arc<dyn OcrEngine>> {
        Ok(Arc::new(PpOcrEngine::new(&self.onnx)?))
    }
}

enum EnhancedSlot {
    Ready(Arc<dyn OcrEngine>),
    /// Construction failed; enhanced requests are served by the fast engine.
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    NotLoaded,
    Ready,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct EngineSlots {
    pub fast: SlotState,
    pub enhanced: SlotState,
}

/// Resolves the effective mode for a request and hands out lazily built,
/// shared engine instances.
///
/// Each slot is initialised exactly once: concurrent first callers wait for a
/// single construction and all observe the same instance. A failed enhanced
/// construction is recorded and every later enhanced request uses the fast
/// engine until [`EngineFactory::reset_enhanced`] is called.
pub struct EngineFactory {
    default_mode: OcrMode,
    builder: Arc<dyn EngineBuilder>,
    fast: OnceCell<Arc<dyn OcrEngine>>,
    enhanced: RwLock<Arc<OnceCell<EnhancedSlot>>>,
}

impl EngineFactory {
    pub fn new(default_mode: OcrMode, builder: Arc<dyn EngineBuilder>) -> Self {
        Self {
            default_mode,
            builder,
            fast: OnceCell::new(),
            enhanced: RwLock::new(Arc::new(OnceCell::new())),
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(
            config.default_mode,
            Arc::new(ConfiguredEngineBuilder::new(config)),
        )
    }

    /// `auto` defers to the document type's preference, then to the configured
    /// default. Explicit modes are returned unchanged.
    pub fn resolve_mode(&self, requested: OcrMode, document_type: Option<&DocumentType>) -> OcrMode {
        match requested {
            OcrMode::Auto => document_type
                .map(|dt| dt.preferred_mode)
                .unwrap_or(self.default_mode),
            explicit => explicit,
        }
    }

    /// Resolves the mode and returns the engine serving it.
    pub async fn engine_for(
        &self,
        requested: OcrMode,
        document_type: Option<&DocumentType>,
    ) -> Result<Arc<dyn OcrEngine>> {
        let mode = self.resolve_mode(requested, document_type);
        debug!(requested = %requested, resolved = %mode, "Resolved OCR mode");

        match mode {
            OcrMode::Enhanced => self.enhanced().await,
            OcrMode::Fast | OcrMode::Auto => self.fast().await,
        }
    }

    async fn fast(&self) -> Result<Arc<dyn OcrEngine>> {
        self.fast
            .get_or_try_init(|| async {
                let builder = Arc::clone(&self.builder);
                let engine = build_blocking(move || builder.build_fast()).await?;
                info!(engine = engine.name(), "Fast OCR engine initialized");
                Ok::<_, OcrError>(engine)
            })
            .await
            .map(Arc::clone)
            .map_err(|e| {
                error!(error = %e, "Failed to initialize fast OCR engine");
                match e {
                    OcrError::EngineUnavailable(_) => e,
                    other => OcrError::EngineUnavailable(other.to_string()),
                }
            })
    }

    async fn enhanced(&self) -> Result<Arc<dyn OcrEngine>> {
        let cell = self.enhanced_cell();
        let slot = cell
            .get_or_init(|| async {
                let builder = Arc::clone(&self.builder);
                match build_blocking(move || builder.build_enhanced()).await {
                    Ok(engine) => {
                        info!(engine = engine.name(), "Enhanced OCR engine initialized");
                        EnhancedSlot::Ready(engine)
                    }
                    Err(e) => {
                        error!(
                            error = %e,
                            "Failed to initialize enhanced OCR engine; falling back to fast engine"
                        );
                        EnhancedSlot::Unavailable(e.to_string())
                    }
                }
            })
            .await;

        match slot {
            EnhancedSlot::Ready(engine) => Ok(Arc::clone(engine)),
            EnhancedSlot::Unavailable(reason) => {
                warn!(reason = %reason, "Enhanced OCR engine unavailable; using fast engine");
                self.fast().await
            }
        }
    }

    fn enhanced_cell(&self) -> Arc<OnceCell<EnhancedSlot>> {
        let guard = self
            .enhanced
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Discards the enhanced slot so the next enhanced request attempts
    /// construction again. In-flight users keep their instance until they finish.
    pub fn reset_enhanced(&self) {
        let mut guard = self
            .enhanced
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(OnceCell::new());
        info!("Enhanced OCR engine slot reset");
    }

    /// Builds both engines ahead of the first request, fast first.
    pub async fn warm_up(&self) {
        match self.fast().await {
            Ok(engine) => info!(engine = engine.name(), "Fast engine warmed up"),
            Err(e) => warn!(error = %e, "Fast engine warm-up failed"),
        }
        match self.enhanced().await {
            Ok(engine) => info!(engine = engine.name(), "Enhanced engine warmed up"),
            Err(e) => warn!(error = %e, "Enhanced engine warm-up failed"),
        }
    }

    pub fn slot_states(&self) -> EngineSlots {
        let fast = if self.fast.initialized() {
            SlotState::Ready
        } else {
            SlotState::NotLoaded
        };
        let enhanced = match self.enhanced_cell().get() {
            None => SlotState::NotLoaded,
            Some(EnhancedSlot::Ready(_)) => SlotState::Ready,
            Some(EnhancedSlot::Unavailable(_)) => SlotState::Unavailable,
        };
        EngineSlots { fast, enhanced }
    }
}

impl Drop for EngineFactory {
    fn drop(&mut self) {
        let slots = self.slot_states();
        if slots.fast == SlotState::Ready || slots.enhanced == SlotState::Ready {
            info!("Releasing OCR engines");
        }
    }
}

async fn build_blocking<F>(build: F) -> Result<Arc<dyn OcrEngine>>
where
    F: FnOnce() -> Result<Arc<dyn OcrEngine>> + Send + 'static,
{
    tokio::task::spawn_blocking(build)
        .await
        .map_err(|e| OcrError::EngineUnavailable(format!("Engine construction panicked: {e}")))?
}
