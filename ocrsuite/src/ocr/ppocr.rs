//! PP-OCR style recognizer over two ONNX Runtime sessions.
//!
//! Detection produces a text-probability map for the whole page; text lines are
//! taken from horizontal bands of that map, cropped from the page and decoded by
//! the recognition model with greedy CTC against a character dictionary.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{imageops::FilterType, RgbImage};
use ort::session::builder::SessionBuilder;
use ort::session::Session;
use ort::value::TensorRef;
use tracing::{error, info, warn};

use super::engine::{run_blocking, DegradedReason, OcrEngine};
use super::preprocessing::PreprocessProfile;
use crate::config::OnnxConfig;
use crate::error::{OcrError, Result};

pub const PPOCR_ENGINE_NAME: &str = "ENHANCED/PP-OCR";
const FALLBACK_TEXT: &str = "[PP-OCR-ERROR]";

const DET_LIMIT_SIDE: u32 = 960;
const DET_STRIDE: u32 = 32;
const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];
const DET_THRESHOLD: f32 = 0.3;
const MIN_BAND_HEIGHT: usize = 3;
const BAND_PADDING_RATIO: f32 = 0.3;

const REC_HEIGHT: u32 = 48;
const REC_MAX_WIDTH: u32 = 3200;

struct SessionPair {
    detector: Session,
    recognizer: Session,
}

struct PpOcrModels {
    pairs: Vec<Mutex<SessionPair>>,
    next_idx: AtomicUsize,
    /// Index 0 is the CTC blank; the final entry is the space character.
    characters: Vec<char>,
}

pub struct PpOcrEngine {
    models: Arc<PpOcrModels>,
}

impl PpOcrEngine {
    /// Opens the detection/recognition models and the character dictionary.
    ///
    /// `pool_size` session pairs are created so concurrent requests can run
    /// inference side by side.
    pub fn new(config: &OnnxConfig) -> Result<Self> {
        let characters = load_dictionary(&config.dict_path)?;

        let pool_size = config.pool_size.max(1);
        let mut pairs = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            pairs.push(Mutex::new(SessionPair {
                detector: build_session(&config.det_model, config)?,
                recognizer: build_session(&config.rec_model, config)?,
            }));
        }

        info!(
            det_model = %config.det_model.display(),
            rec_model = %config.rec_model.display(),
            pool_size,
            dictionary_size = characters.len() - 2,
            "PP-OCR sessions initialized"
        );

        Ok(Self {
            models: Arc::new(PpOcrModels {
                pairs,
                next_idx: AtomicUsize::new(0),
                characters,
            }),
        })
    }
}

fn build_session(model_path: &Path, config: &OnnxConfig) -> Result<Session> {
    let mut builder = Session::builder()
        .and_then(|b| b.with_intra_threads(config.thread_count.max(1)))
        .map_err(|e| model_error(model_path, e))?;

    if config.use_gpu {
        builder = with_gpu_provider(builder, &config.provider)
            .map_err(|e| model_error(model_path, e))?;
    }

    builder
        .commit_from_file(model_path)
        .map_err(|e| model_error(model_path, e))
}

fn model_error(model_path: &Path, e: impl std::fmt::Display) -> OcrError {
    OcrError::EngineUnavailable(format!(
        "Failed to load ONNX model {}: {e}",
        model_path.display()
    ))
}

#[cfg(feature = "cuda")]
fn with_gpu_provider(builder: SessionBuilder, provider: &str) -> ort::Result<SessionBuilder> {
    if !provider.eq_ignore_ascii_case("cuda") {
        warn!(provider = %provider, "Unsupported execution provider; using CPU");
        return Ok(builder);
    }
    // Registration failures are non-fatal in ort; the session stays on CPU.
    Ok(builder.with_execution_providers([
        ort::execution_providers::CUDAExecutionProvider::default().build(),
    ])?)
}

#[cfg(not(feature = "cuda"))]
fn with_gpu_provider(builder: SessionBuilder, provider: &str) -> ort::Result<SessionBuilder> {
    warn!(provider = %provider, "Built without GPU support; using CPU");
    Ok(builder)
}

/// Reads one character per line, wrapping the list with the CTC blank and a
/// trailing space.
fn load_dictionary(path: &Path) -> Result<Vec<char>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        OcrError::EngineUnavailable(format!(
            "Failed to read character dictionary {}: {e}",
            path.display()
        ))
    })?;
    parse_dictionary(&raw)
}

fn parse_dictionary(raw: &str) -> Result<Vec<char>> {
    let mut characters = vec!['\0'];
    characters.extend(raw.lines().filter_map(|line| line.chars().next()));
    if characters.len() == 1 {
        return Err(OcrError::EngineUnavailable(
            "Character dictionary is empty".to_string(),
        ));
    }
    characters.push(' ');
    Ok(characters)
}

/// A horizontal strip of the page believed to hold one line of text, in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TextBand {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl PpOcrModels {
    fn recognize(&self, image: &[u8]) -> std::result::Result<String, DegradedReason> {
        let page = image::load_from_memory(image)
            .map_err(|e| DegradedReason::Image(e.to_string()))?
            .to_rgb8();

        let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.pairs.len();
        let mut pair = self.pairs[idx]
            .lock()
            .map_err(|_| DegradedReason::Inference(format!("Session {idx} lock poisoned")))?;

        let (det_w, det_h) = detection_size(page.width(), page.height());
        let det_input = normalize_detection(&page, det_w, det_h);
        let (shape, prob) = run_session(
            &mut pair.detector,
            vec![1, 3, det_h as i64, det_w as i64],
            &det_input,
        )?;
        let (map_h, map_w) = match shape.as_slice() {
            [.., h, w] => (*h as usize, *w as usize),
            _ => {
                return Err(DegradedReason::Output(format!(
                    "Unexpected detection output shape {shape:?}"
                )))
            }
        };

        let bands = text_bands(&prob, map_w, map_h, DET_THRESHOLD);
        let scale_x = page.width() as f32 / map_w as f32;
        let scale_y = page.height() as f32 / map_h as f32;

        let mut lines = Vec::with_capacity(bands.len());
        for band in bands {
            let band = scale_band(band, scale_x, scale_y, page.width(), page.height());
            let crop = image::imageops::crop_imm(&page, band.x, band.y, band.width, band.height)
                .to_image();
            let (rec_w, rec_input) = normalize_recognition(&crop);
            let (shape, logits) = run_session(
                &mut pair.recognizer,
                vec![1, 3, REC_HEIGHT as i64, rec_w as i64],
                &rec_input,
            )?;
            let (steps, classes) = match shape.as_slice() {
                [_, t, c] => (*t as usize, *c as usize),
                _ => {
                    return Err(DegradedReason::Output(format!(
                        "Unexpected recognition output shape {shape:?}"
                    )))
                }
            };
            let line = ctc_greedy_decode(&logits, steps, classes, &self.characters);
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }

        Ok(lines.join("\n"))
    }
}

fn run_session(
    session: &mut Session,
    dims: Vec<i64>,
    data: &[f32],
) -> std::result::Result<(Vec<i64>, Vec<f32>), DegradedReason> {
    let (input_name, output_name) = match (session.inputs.first(), session.outputs.first()) {
        (Some(input), Some(output)) => (input.name.clone(), output.name.clone()),
        _ => {
            return Err(DegradedReason::Inference(
                "Model has no inputs or outputs".to_string(),
            ))
        }
    };

    let tensor = TensorRef::from_array_view((dims, data))
        .map_err(|e| DegradedReason::Inference(format!("Failed to build input tensor: {e}")))?;
    let outputs = session
        .run(ort::inputs![input_name.as_str() => tensor])
        .map_err(|e| DegradedReason::Inference(e.to_string()))?;
    let (shape, values) = outputs[output_name.as_str()]
        .try_extract_tensor::<f32>()
        .map_err(|e| DegradedReason::Output(e.to_string()))?;
    Ok((shape.iter().copied().collect(), values.to_vec()))
}

/// Detection input size: longest side capped, both sides rounded to the stride.
fn detection_size(width: u32, height: u32) -> (u32, u32) {
    let longest = width.max(height).max(1);
    let ratio = if longest > DET_LIMIT_SIDE {
        DET_LIMIT_SIDE as f32 / longest as f32
    } else {
        1.0
    };
    let round = |v: u32| {
        let scaled = (v as f32 * ratio).round() as u32;
        (((scaled + DET_STRIDE / 2) / DET_STRIDE) * DET_STRIDE).max(DET_STRIDE)
    };
    (round(width), round(height))
}

fn normalize_detection(page: &RgbImage, width: u32, height: u32) -> Vec<f32> {
    let resized = image::imageops::resize(page, width, height, FilterType::Triangle);
    to_chw(&resized, |c, v| (v / 255.0 - DET_MEAN[c]) / DET_STD[c])
}

fn normalize_recognition(line: &RgbImage) -> (u32, Vec<f32>) {
    let (w, h) = line.dimensions();
    let width = ((REC_HEIGHT as f32 * w as f32 / h.max(1) as f32).ceil() as u32)
        .clamp(REC_HEIGHT / 4, REC_MAX_WIDTH);
    let resized = image::imageops::resize(line, width, REC_HEIGHT, FilterType::Triangle);
    (width, to_chw(&resized, |_, v| (v / 255.0 - 0.5) / 0.5))
}

fn to_chw(img: &RgbImage, normalize: impl Fn(usize, f32) -> f32) -> Vec<f32> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut out = vec![0.0f32; 3 * w * h];
    for (x, y, pixel) in img.enumerate_pixels() {
        let offset = y as usize * w + x as usize;
        for c in 0..3 {
            out[c * w * h + offset] = normalize(c, pixel[c] as f32);
        }
    }
    out
}

/// Groups consecutive rows containing text pixels into bands, top to bottom.
fn text_bands(prob: &[f32], width: usize, height: usize, threshold: f32) -> Vec<TextBand> {
    let mut bands = Vec::new();
    let mut start: Option<usize> = None;

    for y in 0..=height {
        let active = y < height
            && prob[y * width..(y + 1) * width]
                .iter()
                .filter(|&&p| p > threshold)
                .count()
                >= 2;

        match (active, start) {
            (true, None) => start = Some(y),
            (false, Some(y0)) => {
                if y - y0 >= MIN_BAND_HEIGHT {
                    if let Some(band) = band_extent(prob, width, y0, y, threshold) {
                        bands.push(band);
                    }
                }
                start = None;
            }
            _ => {}
        }
    }

    bands
}

fn band_extent(prob: &[f32], width: usize, y0: usize, y1: usize, threshold: f32) -> Option<TextBand> {
    let columns = (0..width).filter(|&x| (y0..y1).any(|y| prob[y * width + x] > threshold));
    let (min_x, max_x) = columns.fold(None, |acc: Option<(usize, usize)>, x| match acc {
        None => Some((x, x)),
        Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
    })?;

    Some(TextBand {
        x: min_x as u32,
        y: y0 as u32,
        width: (max_x - min_x + 1) as u32,
        height: (y1 - y0) as u32,
    })
}

/// Maps a band from probability-map space to page space, padding it vertically
/// since the detector's text kernels are shrunk relative to the glyphs.
fn scale_band(band: TextBand, scale_x: f32, scale_y: f32, page_w: u32, page_h: u32) -> TextBand {
    let pad = (band.height as f32 * scale_y * BAND_PADDING_RATIO).round() as u32;
    let x0 = ((band.x as f32 * scale_x).floor() as u32).min(page_w.saturating_sub(1));
    let y0 = ((band.y as f32 * scale_y).floor() as u32)
        .saturating_sub(pad)
        .min(page_h.saturating_sub(1));
    let x1 = (((band.x + band.width) as f32 * scale_x).ceil() as u32).min(page_w);
    let y1 = (((band.y + band.height) as f32 * scale_y).ceil() as u32 + pad).min(page_h);

    TextBand {
        x: x0,
        y: y0,
        width: x1.saturating_sub(x0).max(1),
        height: y1.saturating_sub(y0).max(1),
    }
}

/// Best-path CTC decoding: argmax per step, collapse repeats, drop blanks.
fn ctc_greedy_decode(logits: &[f32], steps: usize, classes: usize, characters: &[char]) -> String {
    let mut text = String::new();
    let mut previous = 0usize;

    for step in logits.chunks(classes).take(steps) {
        let best = step
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(idx, _)| idx)
            .unwrap_or(0);

        if best != 0 && best != previous {
            if let Some(&ch) = characters.get(best) {
                text.push(ch);
            }
        }
        previous = best;
    }

    text
}

#[async_trait]
impl OcrEngine for PpOcrEngine {
    fn name(&self) -> &str {
        PPOCR_ENGINE_NAME
    }

    fn profile(&self) -> PreprocessProfile {
        PreprocessProfile::Enhanced
    }

    async fn recognize_text(&self, image: Vec<u8>) -> String {
        let models = Arc::clone(&self.models);
        match run_blocking(move || models.recognize(&image)).await {
            Ok(text) => text,
            Err(reason) => {
                error!(error = %reason, "ONNX OCR failed; returning fallback text");
                FALLBACK_TEXT.to_string()
            }
        }
    }
}

impl Drop for PpOcrEngine {
    fn drop(&mut self) {
        if Arc::strong_count(&self.models) == 1 {
            info!("Releasing PP-OCR sessions");
        }
    }
}
