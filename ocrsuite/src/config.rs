use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::models::OcrMode;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn env_non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    /// Mode used when a request asks for `auto` and no document type was resolved.
    pub default_mode: OcrMode,
    pub max_upload_bytes: usize,
    pub max_image_dimension: u32,
    /// Construct both engines in the background at startup.
    pub warmup: bool,
    pub tesseract: TesseractConfig,
    pub onnx: OnnxConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TesseractConfig {
    pub tessdata_path: String,
    pub languages: String,
    /// Tesseract OCR engine mode, 0-3. 1 selects the LSTM recognizer.
    pub oem: u32,
    pub psm: u32,
    pub whitelist: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnnxConfig {
    pub det_model: PathBuf,
    pub rec_model: PathBuf,
    pub dict_path: PathBuf,
    pub provider: String,
    pub use_gpu: bool,
    pub thread_count: usize,
    pub pool_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub samplers_path: PathBuf,
    /// JSON array of document types. The built-in seed catalog is used when unset.
    pub document_types_path: Option<PathBuf>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            tessdata_path: "models/tessdata".to_string(),
            languages: "vie+eng".to_string(),
            oem: 1,
            psm: 6,
            whitelist: None,
        }
    }
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            det_model: PathBuf::from("models/onnx/ppocrv3_det.onnx"),
            rec_model: PathBuf::from("models/onnx/ppocrv3_rec.onnx"),
            dict_path: PathBuf::from("models/onnx/ppocr_keys.txt"),
            provider: "CPU".to_string(),
            use_gpu: false,
            thread_count: 4,
            pool_size: 2,
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            default_mode: OcrMode::Auto,
            max_upload_bytes: 25 * 1024 * 1024,
            max_image_dimension: 4096,
            warmup: true,
            tesseract: TesseractConfig::default(),
            onnx: OnnxConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let tess_defaults = TesseractConfig::default();
        let onnx_defaults = OnnxConfig::default();
        let ocr_defaults = OcrConfig::default();

        Self {
            server: ServerConfig {
                host: env::var("OCRSUITE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("OCRSUITE_PORT", 5080),
            },
            ocr: OcrConfig {
                default_mode: parse_env_or("OCR_DEFAULT_MODE", ocr_defaults.default_mode),
                max_upload_bytes: parse_env_or("OCR_MAX_UPLOAD_BYTES", ocr_defaults.max_upload_bytes),
                max_image_dimension: parse_env_or(
                    "OCR_MAX_DIMENSION",
                    ocr_defaults.max_image_dimension,
                ),
                warmup: parse_env_or("OCR_WARMUP", ocr_defaults.warmup),
                tesseract: TesseractConfig {
                    tessdata_path: env::var("OCR_TESSDATA_PATH")
                        .unwrap_or(tess_defaults.tessdata_path),
                    languages: env::var("OCR_TESS_LANGUAGES").unwrap_or(tess_defaults.languages),
                    oem: parse_env_or("OCR_TESS_OEM", tess_defaults.oem),
                    psm: parse_env_or("OCR_TESS_PSM", tess_defaults.psm),
                    whitelist: env_non_empty("OCR_TESS_WHITELIST"),
                },
                onnx: OnnxConfig {
                    det_model: env_non_empty("OCR_ONNX_DET_MODEL")
                        .map(PathBuf::from)
                        .unwrap_or(onnx_defaults.det_model),
                    rec_model: env_non_empty("OCR_ONNX_REC_MODEL")
                        .map(PathBuf::from)
                        .unwrap_or(onnx_defaults.rec_model),
                    dict_path: env_non_empty("OCR_ONNX_DICT")
                        .map(PathBuf::from)
                        .unwrap_or(onnx_defaults.dict_path),
                    provider: env::var("OCR_ONNX_PROVIDER").unwrap_or(onnx_defaults.provider),
                    use_gpu: parse_env_or("OCR_ONNX_USE_GPU", onnx_defaults.use_gpu),
                    thread_count: parse_env_or("OCR_ONNX_THREADS", onnx_defaults.thread_count),
                    pool_size: parse_env_or("OCR_ONNX_POOL_SIZE", onnx_defaults.pool_size),
                },
            },
            catalog: CatalogConfig {
                samplers_path: env_non_empty("OCR_SAMPLERS_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("templates/samplers.json")),
                document_types_path: env_non_empty("OCR_DOCUMENT_TYPES_PATH").map(PathBuf::from),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
