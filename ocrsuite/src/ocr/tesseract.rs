use std::ffi::{CStr, CString};
use std::sync::Arc;

use async_trait::async_trait;
use leptess::capi::{
    TessOcrEngineMode, TessOcrEngineMode_OEM_DEFAULT, TessOcrEngineMode_OEM_LSTM_ONLY,
    TessOcrEngineMode_OEM_TESSERACT_LSTM_COMBINED, TessOcrEngineMode_OEM_TESSERACT_ONLY,
};
use leptess::leptonica;
use leptess::tesseract::TessApi;
use leptess::Variable;
use tesseract_plumbing::TessBaseApi;
use tracing::error;

use super::engine::{run_blocking, DegradedReason, OcrEngine};
use super::preprocessing::PreprocessProfile;
use crate::config::TesseractConfig;
use crate::error::{OcrError, Result};

pub const TESSERACT_ENGINE_NAME: &str = "FAST/TESSERACT";
const FALLBACK_TAG: &str = "[TESSERACT_ERROR]";

/// Map the configured `oem` number onto Tesseract's engine modes.
fn engine_mode(oem: u32) -> Option<TessOcrEngineMode> {
    match oem {
        0 => Some(TessOcrEngineMode_OEM_TESSERACT_ONLY),
        1 => Some(TessOcrEngineMode_OEM_LSTM_ONLY),
        2 => Some(TessOcrEngineMode_OEM_TESSERACT_LSTM_COMBINED),
        3 => Some(TessOcrEngineMode_OEM_DEFAULT),
        _ => None,
    }
}

fn c_string(value: &str, what: &str) -> std::result::Result<CString, DegradedReason> {
    CString::new(value).map_err(|_| DegradedReason::Init(format!("{what} contains a NUL byte")))
}

/// Classical OCR over a Tesseract language pack.
///
/// A Tesseract handle is created per call on the blocking pool, so concurrent
/// requests never share mutable engine state.
pub struct TesseractEngine {
    settings: Arc<TesseractConfig>,
    mode: TessOcrEngineMode,
}

impl TesseractEngine {
    pub fn new(config: &TesseractConfig) -> Result<Self> {
        if config.languages.trim().is_empty() {
            return Err(OcrError::Config(
                "Tesseract languages must not be empty".to_string(),
            ));
        }
        if config.psm > 13 {
            return Err(OcrError::Config(format!(
                "Tesseract page segmentation mode {} is out of range 0-13",
                config.psm
            )));
        }
        let mode = engine_mode(config.oem).ok_or_else(|| {
            OcrError::Config(format!(
                "Tesseract engine mode {} is out of range 0-3",
                config.oem
            ))
        })?;

        Ok(Self {
            settings: Arc::new(config.clone()),
            mode,
        })
    }

    fn recognize_blocking(
        settings: &TesseractConfig,
        mode: TessOcrEngineMode,
        image: &[u8],
    ) -> std::result::Result<String, DegradedReason> {
        let datapath = c_string(&settings.tessdata_path, "tessdata path")?;
        let languages = c_string(&settings.languages, "language list")?;

        let mut api = TessApi {
            raw: TessBaseApi::create(),
        };
        api.raw
            .init_4(Some(datapath.as_c_str()), Some(languages.as_c_str()), mode)
            .map_err(|e| DegradedReason::Init(e.to_string()))?;

        let psm = c_string(&settings.psm.to_string(), "page segmentation mode")?;
        api.raw
            .set_variable(Variable::TesseditPagesegMode.as_cstr(), &psm)
            .map_err(|e| DegradedReason::Init(format!("Failed to set page segmentation: {e}")))?;

        if let Some(whitelist) = settings.whitelist.as_deref() {
            let whitelist = c_string(whitelist, "whitelist")?;
            api.raw
                .set_variable(Variable::TesseditCharWhitelist.as_cstr(), &whitelist)
                .map_err(|e| DegradedReason::Init(format!("Failed to set whitelist: {e}")))?;
        }

        let pix = leptonica::pix_read_mem(image)
            .map_err(|e| DegradedReason::Image(format!("Failed to set image: {e}")))?;
        api.set_image(&pix);

        let text = api
            .raw
            .get_utf8_text()
            .map_err(|e| DegradedReason::Output(format!("Failed to extract text: {e}")))?;
        let text: &CStr = text.as_ref();
        text.to_str()
            .map(str::to_string)
            .map_err(|e| DegradedReason::Output(format!("Failed to extract text: {e}")))
    }
}

/// Fallback text: the error tag followed by whatever of the image decodes as text.
fn degraded_text(image: &[u8]) -> String {
    format!("{FALLBACK_TAG}{}", String::from_utf8_lossy(image))
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        TESSERACT_ENGINE_NAME
    }

    fn profile(&self) -> PreprocessProfile {
        PreprocessProfile::Fast
    }

    async fn recognize_text(&self, image: Vec<u8>) -> String {
        let settings = Arc::clone(&self.settings);
        let mode = self.mode;
        let image = Arc::new(image);
        let job_image = Arc::clone(&image);

        match run_blocking(move || Self::recognize_blocking(&settings, mode, &job_image)).await {
            Ok(text) => text,
            Err(reason) => {
                error!(error = %reason, "Tesseract OCR failed; returning fallback text");
                degraded_text(&image)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(tessdata_path: &str) -> TesseractConfig {
        TesseractConfig {
            tessdata_path: tessdata_path.to_string(),
            languages: "eng".to_string(),
            oem: 1,
            psm: 6,
            whitelist: None,
        }
    }

    #[test]
    fn test_rejects_empty_languages() {
        let config = TesseractConfig {
            languages: "  ".to_string(),
            ..make_config("models/tessdata")
        };
        assert!(matches!(
            TesseractEngine::new(&config),
            Err(OcrError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_psm() {
        let config = TesseractConfig {
            psm: 42,
            ..make_config("models/tessdata")
        };
        assert!(TesseractEngine::new(&config).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_engine_mode() {
        let config = TesseractConfig {
            oem: 4,
            ..make_config("models/tessdata")
        };
        assert!(matches!(
            TesseractEngine::new(&config),
            Err(OcrError::Config(msg)) if msg.contains("engine mode 4")
        ));
    }

    #[test]
    fn test_engine_modes_map_to_tesseract() {
        assert_eq!(engine_mode(0), Some(TessOcrEngineMode_OEM_TESSERACT_ONLY));
        assert_eq!(engine_mode(1), Some(TessOcrEngineMode_OEM_LSTM_ONLY));
        assert_eq!(engine_mode(3), Some(TessOcrEngineMode_OEM_DEFAULT));
        assert_eq!(engine_mode(7), None);

        let engine = TesseractEngine::new(&make_config("models/tessdata")).unwrap();
        assert_eq!(engine.mode, TessOcrEngineMode_OEM_LSTM_ONLY);
    }

    #[test]
    fn test_engine_metadata() {
        let engine = TesseractEngine::new(&make_config("models/tessdata")).unwrap();
        assert_eq!(engine.name(), "FAST/TESSERACT");
        assert_eq!(engine.profile(), PreprocessProfile::Fast);
    }

    #[tokio::test]
    async fn test_missing_language_pack_degrades_instead_of_failing() {
        let engine =
            TesseractEngine::new(&make_config("/nonexistent/ocrsuite/tessdata")).unwrap();
        let text = engine.recognize_text(b"raw bytes".to_vec()).await;
        assert_eq!(text, "[TESSERACT_ERROR]raw bytes");
    }

    #[test]
    fn test_degraded_text_is_never_empty() {
        assert_eq!(degraded_text(&[]), "[TESSERACT_ERROR]");
    }
}
