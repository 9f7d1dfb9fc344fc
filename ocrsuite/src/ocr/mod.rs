//! Image normalisation, recognition engines and the factory that selects them.

mod engine;
mod factory;
mod ppocr;
mod preprocessing;
mod tesseract;

pub use engine::{DegradedReason, OcrEngine};
pub use factory::{ConfiguredEngineBuilder, EngineBuilder, EngineFactory, EngineSlots, SlotState};
pub use ppocr::{PpOcrEngine, PPOCR_ENGINE_NAME};
pub use preprocessing::PreprocessProfile;
pub use tesseract::{TesseractEngine, TESSERACT_ENGINE_NAME};
