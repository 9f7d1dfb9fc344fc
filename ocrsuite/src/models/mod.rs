mod common;
mod document_type;
mod fields;
mod ocr;

pub use common::*;
pub use document_type::*;
pub use fields::*;
pub use ocr::*;
