pub mod engines;
pub(crate) mod health;
pub mod ocr;
pub mod samplers;

pub use health::health_check;
