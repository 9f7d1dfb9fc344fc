use std::io::Cursor;

use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, ImageReader, Luma, RgbImage};

use crate::error::{OcrError, Result};

/// Normalization applied to an uploaded image before it reaches an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessProfile {
    /// Grayscale plus mild contrast boost, tuned for Tesseract.
    Fast,
    /// Contrast/saturation boost, sharpening and binarization, tuned for PP-OCR.
    Enhanced,
}

const FAST_CONTRAST: f32 = 1.1;
const ENHANCED_CONTRAST: f32 = 1.2;
const ENHANCED_SATURATION: f32 = 1.05;
const SHARPEN_SIGMA: f32 = 3.0;
const BINARY_THRESHOLD: u8 = 128;

impl PreprocessProfile {
    /// Decode `bytes`, apply this profile and re-encode as PNG.
    ///
    /// Works on the caller's buffered copy; never touches the original stream.
    pub fn apply(self, bytes: &[u8], max_dimension: u32) -> Result<Vec<u8>> {
        let img = decode(bytes)?;
        let img = apply_orientation(img, read_exif_orientation(bytes));
        let img = resize_if_needed(img, max_dimension);

        let processed = match self {
            PreprocessProfile::Fast => {
                DynamicImage::ImageLuma8(scale_contrast(img.to_luma8(), FAST_CONTRAST))
            }
            PreprocessProfile::Enhanced => {
                let rgb = adjust_rgb(img.to_rgb8(), ENHANCED_CONTRAST, ENHANCED_SATURATION);
                let sharpened = DynamicImage::ImageRgb8(rgb).unsharpen(SHARPEN_SIGMA, 0);
                DynamicImage::ImageLuma8(binarize(sharpened.to_luma8(), BINARY_THRESHOLD))
            }
        };

        encode_png(&processed)
    }
}

fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| OcrError::ImageDecode(format!("Failed to read image: {e}")))?;

    reader
        .decode()
        .map_err(|e| OcrError::ImageDecode(format!("Failed to decode image: {e}")))
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    img.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| OcrError::Internal(format!("Failed to encode image: {e}")))?;
    Ok(output)
}

/// EXIF orientation tag (0x0112), `1` when absent or unreadable.
fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let exif = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(_) => return 1,
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(1)
}

fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Downscale (Lanczos3) so neither side exceeds `max_dim`, keeping aspect ratio.
fn resize_if_needed(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_dim && height <= max_dim {
        return img;
    }

    let ratio = if width > height {
        max_dim as f32 / width as f32
    } else {
        max_dim as f32 / height as f32
    };

    let new_width = ((width as f32 * ratio) as u32).max(1);
    let new_height = ((height as f32 * ratio) as u32).max(1);

    img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
}

fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Linear contrast around mid-grey: `(v - 128) * factor + 128`.
fn scale_contrast(mut gray: GrayImage, factor: f32) -> GrayImage {
    for pixel in gray.pixels_mut() {
        pixel[0] = clamp_channel((pixel[0] as f32 - 128.0) * factor + 128.0);
    }
    gray
}

fn adjust_rgb(mut rgb: RgbImage, contrast: f32, saturation: f32) -> RgbImage {
    for pixel in rgb.pixels_mut() {
        let [r, g, b] = pixel.0.map(|c| (c as f32 - 128.0) * contrast + 128.0);
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        pixel.0 = [r, g, b].map(|c| clamp_channel(luma + (c - luma) * saturation));
    }
    rgb
}

fn binarize(mut gray: GrayImage, threshold: u8) -> GrayImage {
    for pixel in gray.pixels_mut() {
        *pixel = if pixel[0] >= threshold {
            Luma([255])
        } else {
            Luma([0])
        };
    }
    gray
}
