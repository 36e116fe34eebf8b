// Library exports for the handwriting recognition demo

pub mod core;
pub mod dispatch;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{ConfigError, DecodeError, EngineError, InferenceError, RecognitionError},
    types::{RecognitionMode, RecognitionResponse},
};

pub use dispatch::{dispatch, recognize_upload, TextRecognizer};

pub use services::{TesseractService, TrocrHandle, TrocrService};

pub use utils::decode_upload;
