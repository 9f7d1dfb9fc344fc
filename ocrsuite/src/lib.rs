//! Document OCR service.
//!
//! Uploaded images are preprocessed and read by a fast (Tesseract) or enhanced
//! (PP-OCR over ONNX Runtime) engine, then named fields are pulled out of the
//! recognised text with per-document-type regex templates and narrowed by
//! sampler allow-lists.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod extraction;
pub mod models;
pub mod ocr;
pub mod store;
