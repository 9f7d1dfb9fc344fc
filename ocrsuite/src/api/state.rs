use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::coordinator::OcrCoordinator;
use crate::extraction::SamplerProvider;
use crate::ocr::EngineFactory;
use crate::store::DocumentTypeStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub factory: Arc<EngineFactory>,
    pub samplers: Arc<SamplerProvider>,
    pub coordinator: OcrCoordinator,
    /// Parent of every per-request cancellation token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Config,
        factory: Arc<EngineFactory>,
        samplers: Arc<SamplerProvider>,
        document_types: Arc<dyn DocumentTypeStore>,
        shutdown: CancellationToken,
    ) -> Self {
        let config = Arc::new(config);
        let coordinator = OcrCoordinator::new(
            factory.clone(),
            samplers.clone(),
            document_types,
            config.ocr.max_upload_bytes,
            config.ocr.max_image_dimension,
        );

        Self {
            config,
            factory,
            samplers,
            coordinator,
            shutdown,
        }
    }
}
