#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};

use ocrsuite::error::{OcrError, Result};
use ocrsuite::ocr::{EngineBuilder, OcrEngine, PreprocessProfile};

/// Engine returning fixed text while recording what it was given.
pub struct RecordingEngine {
    name: &'static str,
    profile: PreprocessProfile,
    text: String,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_image: Mutex<Option<Vec<u8>>>,
}

impl RecordingEngine {
    pub fn new(name: &'static str, profile: PreprocessProfile, text: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            profile,
            text: text.to_string(),
            delay: None,
            calls: AtomicUsize::new(0),
            last_image: Mutex::new(None),
        })
    }

    pub fn slow(name: &'static str, text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            profile: PreprocessProfile::Fast,
            text: text.to_string(),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            last_image: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_image(&self) -> Option<Vec<u8>> {
        self.last_image.lock().unwrap().clone()
    }
}

#[async_trait]
impl OcrEngine for RecordingEngine {
    fn name(&self) -> &str {
        self.name
    }

    fn profile(&self) -> PreprocessProfile {
        self.profile
    }

    async fn recognize_text(&self, image: Vec<u8>) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_image.lock().unwrap() = Some(image);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.text.clone()
    }
}

/// Hands out prepared engines; `enhanced: None` simulates missing models.
pub struct FixedBuilder {
    pub fast: Arc<RecordingEngine>,
    pub enhanced: Option<Arc<RecordingEngine>>,
}

impl EngineBuilder for FixedBuilder {
    fn build_fast(&self) -> Result<Arc<dyn OcrEngine>> {
        Ok(self.fast.clone())
    }

    fn build_enhanced(&self) -> Result<Arc<dyn OcrEngine>> {
        match &self.enhanced {
            Some(engine) => Ok(engine.clone()),
            None => Err(OcrError::EngineUnavailable(
                "ppocrv3_det.onnx not found".to_string(),
            )),
        }
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::new_rgb8(width, height);
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("encode test png");
    out
}
